// tandem_core/src/autodiff/finite_diff.rs

use nalgebra::{DMatrix, DVector};

use crate::constants::FINITE_DIFFERENCE_STEP;

/// Forward-difference Jacobian of `f` at `z`, given the already evaluated `f(z)`.
///
/// The step is scaled with the magnitude of each coordinate. Rows follow the outputs of `f`,
/// columns the entries of `z`.
pub fn jacobian<F>(mut f: F, z: &DVector<f64>, f0: &DVector<f64>) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    let mut jac = DMatrix::zeros(f0.len(), z.len());
    let mut shifted = z.clone();
    for j in 0..z.len() {
        let h = FINITE_DIFFERENCE_STEP * (1.0 + z[j].abs());
        shifted[j] = z[j] + h;
        let f1 = f(&shifted);
        shifted[j] = z[j];
        jac.set_column(j, &((f1 - f0) / h));
    }
    jac
}

/// Central-difference gradient of a scalar function. Used to cross-check analytic gradients.
pub fn gradient<F>(mut f: F, z: &DVector<f64>) -> DVector<f64>
where
    F: FnMut(&DVector<f64>) -> f64,
{
    let mut grad = DVector::zeros(z.len());
    let mut shifted = z.clone();
    for j in 0..z.len() {
        let h = FINITE_DIFFERENCE_STEP * (1.0 + z[j].abs());
        shifted[j] = z[j] + h;
        let forward = f(&shifted);
        shifted[j] = z[j] - h;
        let backward = f(&shifted);
        shifted[j] = z[j];
        grad[j] = (forward - backward) / (2.0 * h);
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_jacobian_of_linear_map() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 0.0, 0.0, -1.0, 3.0]);
        let z = DVector::from_vec(vec![0.3, -0.2, 1.0]);
        let f0 = &a * &z;
        let jac = jacobian(|x| &a * x, &z, &f0);
        assert_abs_diff_eq!(jac, a, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_of_quadratic() {
        let z = DVector::from_vec(vec![1.0, -2.0]);
        let grad = gradient(|x| x.norm_squared(), &z);
        assert_abs_diff_eq!(grad, z * 2.0, epsilon = 1e-6);
    }
}
