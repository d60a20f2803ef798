//! Symmetric successive over-relaxation (SSOR) preconditioner
//!
//! One application is a forward Gauss-Seidel sweep followed by a backward
//! sweep on `A z = r` from a zero initial guess. With `omega = 1` this is
//! symmetric Gauss-Seidel; for SPD `A` and `0 < omega < 2` the resulting
//! operator is SPD, which is what a Chebyshev smoother needs.

use crate::sparse::CsrMatrix;
use crate::traits::{ComplexField, Preconditioner};
use ndarray::Array1;
use num_traits::FromPrimitive;

/// SSOR preconditioner over a copy of the level operator
#[derive(Debug, Clone)]
pub struct SsorPreconditioner<T: ComplexField> {
    matrix: CsrMatrix<T>,
    inv_diag: Array1<T>,
    omega: T,
}

impl<T: ComplexField> SsorPreconditioner<T> {
    /// Build from a matrix with nonzero diagonal
    ///
    /// Returns the index of the first zero diagonal entry on failure.
    pub fn try_from_csr(matrix: &CsrMatrix<T>, omega: f64) -> Result<Self, usize> {
        let tol = T::Real::from_f64(1e-30).unwrap();
        let diag = matrix.diagonal();
        if let Some(row) = diag.iter().position(|d| d.norm() <= tol) {
            return Err(row);
        }
        Ok(Self {
            matrix: matrix.clone(),
            inv_diag: diag.mapv(|d| d.inv()),
            omega: T::from_real_f64(omega),
        })
    }

    fn sweep(&self, r: &Array1<T>, z: &mut Array1<T>, row: usize) {
        let mut sum = r[row];
        for (j, a_ij) in self.matrix.row_entries(row) {
            if j != row {
                sum -= a_ij * z[j];
            }
        }
        let gs = sum * self.inv_diag[row];
        z[row] = z[row] + self.omega * (gs - z[row]);
    }
}

impl<T: ComplexField> Preconditioner<T> for SsorPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let n = self.matrix.num_rows;
        let mut z = Array1::from_elem(n, T::zero());
        for i in 0..n {
            self.sweep(r, &mut z, i);
        }
        for i in (0..n).rev() {
            self.sweep(r, &mut z, i);
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_ssor_exact_for_diagonal() {
        let matrix = CsrMatrix::from_dense(&array![[2.0_f64, 0.0], [0.0, 4.0]], 0.0);
        let ssor = SsorPreconditioner::try_from_csr(&matrix, 1.0).expect("nonzero diagonal");
        let z = ssor.apply(&array![2.0, 2.0]);
        assert_relative_eq!(z[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(z[1], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_ssor_exact_for_lower_triangular_forward_sweep() {
        // forward sweep solves a lower triangular system exactly, the
        // backward sweep then leaves the solution unchanged
        let matrix = CsrMatrix::from_dense(&array![[2.0_f64, 0.0], [1.0, 1.0]], 0.0);
        let ssor = SsorPreconditioner::try_from_csr(&matrix, 1.0).expect("nonzero diagonal");
        let z = ssor.apply(&array![2.0, 3.0]);
        assert_relative_eq!(z[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(z[1], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_ssor_rejects_zero_diagonal() {
        let matrix = CsrMatrix::from_dense(&array![[0.0_f64, 1.0], [1.0, 1.0]], 0.0);
        assert_eq!(SsorPreconditioner::try_from_csr(&matrix, 1.0).unwrap_err(), 0);
    }
}
