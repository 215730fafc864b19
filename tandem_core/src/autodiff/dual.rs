// tandem_core/src/autodiff/dual.rs

use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, DualNum};

/// A value without derivative part.
pub fn constant(value: f64) -> Dual64 {
    Dual64::from(value)
}

/// Lifts `z` to dual numbers, with a unit derivative on entry `direction` only.
pub fn seed(z: &DVector<f64>, direction: Option<usize>) -> Vec<Dual64> {
    z.iter()
        .enumerate()
        .map(|(i, value)| {
            let eps = if direction == Some(i) { 1.0 } else { 0.0 };
            Dual64::new(*value, eps)
        })
        .collect()
}

/// Sums a sequence of dual numbers. Returns `None` for an empty sequence.
pub fn sum(mut values: impl Iterator<Item = Dual64>) -> Option<Dual64> {
    let first = values.next()?;
    Some(values.fold(first, |acc, v| acc + v))
}

/// Clamps from below. Below the floor the result is a constant and carries no derivative.
pub fn max_f64(x: Dual64, floor: f64) -> Dual64 {
    if x.re >= floor {
        x
    } else {
        constant(floor)
    }
}

/// `ln Σ exp(x_i)`, shifted by the largest real part so that no term overflows.
pub fn log_sum_exp(values: &[Dual64]) -> Option<Dual64> {
    let peak = values.iter().map(|v| v.re).fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return None;
    }
    let total = sum(values.iter().map(|v| (*v - peak).exp()))?;
    Some(total.ln() + peak)
}

/// Gradient of a scalar function given as one forward pass per direction.
///
/// `pass(j)` evaluates the function with the `j`-th input seeded; `None` counts as a constant.
pub fn forward_gradient<F>(n: usize, mut pass: F) -> DVector<f64>
where
    F: FnMut(usize) -> Option<Dual64>,
{
    let mut gradient = DVector::zeros(n);
    for j in 0..n {
        if let Some(value) = pass(j) {
            gradient[j] = value.eps;
        }
    }
    gradient
}

/// `m x n` Jacobian of a vector function, one forward pass (one column) per direction.
pub fn forward_jacobian<F>(m: usize, n: usize, mut pass: F) -> DMatrix<f64>
where
    F: FnMut(usize) -> Option<Vec<Dual64>>,
{
    let mut jacobian = DMatrix::zeros(m, n);
    for j in 0..n {
        if let Some(outputs) = pass(j) {
            debug_assert_eq!(outputs.len(), m, "forward pass changed its output count");
            for (row, output) in outputs.iter().enumerate().take(m) {
                jacobian[(row, j)] = output.eps;
            }
        }
    }
    jacobian
}
