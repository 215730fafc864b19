// tandem_core/src/solver/nlp/lbfgs.rs

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};

/// Limited-memory, Powell-damped BFGS approximation of the Lagrangian Hessian.
///
/// Only the last `memory` curvature pairs are kept. The dense matrix is rebuilt from them on
/// request, starting from a scaled identity. Damping keeps every update positive definite even
/// when `sᵀy` is small or negative, as happens on the Lagrangian of a constrained problem.
#[derive(Debug, Clone)]
pub struct DampedLbfgs {
    memory: usize,
    pairs: VecDeque<(DVector<f64>, DVector<f64>)>,
}

impl DampedLbfgs {
    pub fn new(memory: usize) -> Self {
        Self {
            memory: memory.max(1),
            pairs: VecDeque::with_capacity(memory.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Stores the pair `s = z' - z`, `y = ∇L(z') - ∇L(z)`. Negligible steps are ignored.
    pub fn push(&mut self, s: DVector<f64>, y: DVector<f64>) {
        if s.norm_squared() < 1e-20 {
            return;
        }
        if self.pairs.len() == self.memory {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y));
    }

    /// Forgets all curvature information.
    pub fn reset(&mut self) {
        self.pairs.clear();
    }

    /// Dense `n x n` approximation, symmetric positive definite.
    pub fn hessian(&self, n: usize) -> DMatrix<f64> {
        let scale = self
            .pairs
            .back()
            .map(|(s, y)| {
                let sy = s.dot(y);
                if sy > 1e-12 {
                    (y.norm_squared() / sy).clamp(1e-4, 1e4)
                } else {
                    1.0
                }
            })
            .unwrap_or(1.0);
        let mut b = DMatrix::identity(n, n) * scale;

        for (s, y) in &self.pairs {
            let bs = &b * s;
            let sbs = s.dot(&bs);
            if sbs <= 1e-16 {
                continue;
            }
            let sy = s.dot(y);
            let r = if sy >= 0.2 * sbs {
                y.clone()
            } else {
                let theta = 0.8 * sbs / (sbs - sy);
                y * theta + &bs * (1.0 - theta)
            };
            let sr = s.dot(&r);
            if sr <= 1e-16 {
                continue;
            }
            b -= &bs * bs.transpose() / sbs;
            b += &r * r.transpose() / sr;
        }
        (&b + b.transpose()) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_quadratic_curvature() {
        // f(z) = ½ zᵀ Q z with Q = diag(2, 8): y = Q s exactly.
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 8.0]));
        let mut lbfgs = DampedLbfgs::new(4);
        for s in [DVector::from_vec(vec![1.0, 0.0]), DVector::from_vec(vec![0.0, 1.0])] {
            let y = &q * &s;
            lbfgs.push(s, y);
        }
        let b = lbfgs.hessian(2);
        assert_relative_eq!(b, q, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_curvature_stays_positive_definite() {
        let mut lbfgs = DampedLbfgs::new(2);
        lbfgs.push(DVector::from_vec(vec![1.0, 1.0]), DVector::from_vec(vec![-3.0, 0.5]));
        lbfgs.push(DVector::from_vec(vec![0.5, -1.0]), DVector::from_vec(vec![0.1, -0.2]));
        lbfgs.push(DVector::from_vec(vec![0.0, 2.0]), DVector::from_vec(vec![0.0, 1.0]));
        assert_eq!(lbfgs.len(), 2);
        let b = lbfgs.hessian(2);
        let eigen = b.symmetric_eigen();
        assert!(eigen.eigenvalues.iter().all(|l| *l > 0.0));
        lbfgs.reset();
        assert!(lbfgs.is_empty());
    }
}
