//! Point Jacobi: `M⁻¹ = diag(A)⁻¹`, the cheapest relaxation preconditioner

use crate::sparse::CsrMatrix;
use crate::traits::{ComplexField, Preconditioner};
use ndarray::Array1;
use num_traits::FromPrimitive;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
const PARALLEL_MIN_LEN: usize = 1000;

/// Inverse diagonal of a level operator
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<T: ComplexField> {
    /// Inverse diagonal elements
    inv_diag: Array1<T>,
}

impl<T: ComplexField> DiagonalPreconditioner<T> {
    /// Inverse diagonal of `matrix`, or the first row whose diagonal vanishes
    pub fn try_from_csr(matrix: &CsrMatrix<T>) -> Result<Self, usize> {
        let tol = T::Real::from_f64(1e-30).unwrap();
        let diag = matrix.diagonal();
        if let Some(row) = diag.iter().position(|d| d.norm() <= tol) {
            return Err(row);
        }
        Ok(Self {
            inv_diag: diag.mapv(|d| d.inv()),
        })
    }

    /// Create from a diagonal vector, substituting 1 for zero entries
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let tol = T::Real::from_f64(1e-30).unwrap();
        let inv_diag = diag.mapv(|d| if d.norm() > tol { d.inv() } else { T::one() });
        Self { inv_diag }
    }

    /// Inverse diagonal entries
    pub fn inverse_diagonal(&self) -> &Array1<T> {
        &self.inv_diag
    }
}

impl<T: ComplexField> Preconditioner<T> for DiagonalPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        #[cfg(feature = "rayon")]
        {
            let slices = (r.as_slice(), self.inv_diag.as_slice());
            if let (Some(rs), Some(ds)) = slices {
                if rs.len() >= PARALLEL_MIN_LEN {
                    return Array1::from_vec(rs.par_iter().zip(ds).map(|(&ri, &di)| ri * di).collect());
                }
            }
        }

        let mut y = r.clone();
        y.zip_mut_with(&self.inv_diag, |yi, &di| *yi *= di);
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    #[test]
    fn test_zero_entries_pass_through() {
        let diag = array![Complex64::new(0.0, 2.0), Complex64::new(0.0, 0.0)];
        let precond = DiagonalPreconditioner::from_diagonal(&diag);
        assert_eq!(precond.inverse_diagonal()[1], Complex64::new(1.0, 0.0));

        let result = precond.apply(&array![Complex64::new(4.0, 0.0), Complex64::new(-3.0, 1.0)]);
        assert_relative_eq!(result[0].re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result[0].im, -2.0, epsilon = 1e-12);
        assert_eq!(result[1], Complex64::new(-3.0, 1.0));
    }

    #[test]
    fn test_diagonal_from_csr() {
        let dense = array![[4.0_f64, 1.0], [1.0, 2.0]];
        let matrix = CsrMatrix::from_dense(&dense, 0.0);
        let precond = DiagonalPreconditioner::try_from_csr(&matrix).expect("nonzero diagonal");

        let result = precond.apply(&array![4.0, 4.0]);
        assert_relative_eq!(result[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(result[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_diagonal_reported() {
        let dense = array![[1.0_f64, 1.0], [1.0, 0.0]];
        let matrix = CsrMatrix::from_dense(&dense, 0.0);
        assert_eq!(DiagonalPreconditioner::try_from_csr(&matrix).unwrap_err(), 1);
    }
}
