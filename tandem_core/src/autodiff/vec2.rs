// tandem_core/src/autodiff/vec2.rs

use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::Vector2;
use num_dual::{Dual64, DualNum};

use super::dual::{constant, max_f64};

/// A planar vector with dual-number coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: Dual64,
    pub y: Dual64,
}

impl Vec2 {
    pub fn new(x: Dual64, y: Dual64) -> Self {
        Self { x, y }
    }

    pub fn constant(v: &Vector2<f64>) -> Self {
        Self::new(constant(v.x), constant(v.y))
    }

    pub fn value(&self) -> Vector2<f64> {
        Vector2::new(self.x.re, self.y.re)
    }

    /// Derivative part along the seeded direction.
    pub fn tangent(&self) -> Vector2<f64> {
        Vector2::new(self.x.eps, self.y.eps)
    }

    pub fn dot(&self, other: &Vec2) -> Dual64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm_squared(&self) -> Dual64 {
        self.dot(self)
    }

    /// Euclidean norm, with the squared norm clamped to `eps²` so the derivative stays finite.
    pub fn norm(&self, eps: f64) -> Dual64 {
        max_f64(self.norm_squared(), eps * eps).sqrt()
    }

    /// Smooth norm `sqrt(|v|² + eps²)`, differentiable everywhere.
    pub fn smooth_norm(&self, eps: f64) -> Dual64 {
        (self.norm_squared() + eps * eps).sqrt()
    }

    pub fn scale(&self, s: Dual64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn div(&self, s: Dual64) -> Self {
        Self::new(self.x / s, self.y / s)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Sub<&Vector2<f64>> for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: &Vector2<f64>) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_norm_derivative_is_unit_direction() {
        let along_x = Vec2::new(Dual64::new(3.0, 1.0), constant(4.0));
        let along_y = Vec2::new(constant(3.0), Dual64::new(4.0, 1.0));
        assert_abs_diff_eq!(along_x.norm(1e-6).re, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(along_x.norm(1e-6).eps, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(along_y.norm(1e-6).eps, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_norm_at_origin_is_clamped() {
        let v = Vec2::new(Dual64::new(0.0, 1.0), constant(0.0));
        let n = v.norm(1e-3);
        assert_abs_diff_eq!(n.re, 1e-3, epsilon = 1e-15);
        assert!(n.eps.is_finite());
    }
}
