//! LU decomposition solver
//!
//! Dense LU factorization with partial pivoting. Coarse multigrid levels are
//! small, so the coarse operator is densified and factored once per setup.
//!
//! A [`PivotShift`] lets the factorization survive a (numerically) zero pivot
//! by shifting it, which is what a coarse solve of a singular Neumann-type
//! operator needs.

use crate::sparse::CsrMatrix;
use crate::traits::ComplexField;
use ndarray::{Array1, Array2};
use num_traits::{Float, FromPrimitive, One, ToPrimitive};
use thiserror::Error;

/// Errors that can occur during LU factorization
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LuError {
    #[error("Matrix is singular or nearly singular (zero pivot in column {column})")]
    SingularMatrix { column: usize },
    #[error("Matrix dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Treatment of a zero pivot during factorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotShift {
    /// Fail on a zero pivot
    None,
    /// Replace a zero pivot by a small multiple of the matrix scale
    #[default]
    InBlocks,
}

/// LU factorization result
///
/// Stores L and U factors along with the row permutation
#[derive(Debug, Clone)]
pub struct LuFactorization<T: ComplexField> {
    /// Combined L and U matrices (L is unit lower triangular, stored below diagonal)
    pub lu: Array2<T>,
    /// `perm[i]` is the original row placed at position i
    pub perm: Vec<usize>,
    /// Matrix dimension
    pub n: usize,
    /// Number of pivots replaced by [`PivotShift::InBlocks`]
    pub shifted_pivots: usize,
}

impl<T: ComplexField> LuFactorization<T> {
    /// Solve Ax = b using the pre-computed LU factorization
    pub fn solve(&self, b: &Array1<T>) -> Result<Array1<T>, LuError> {
        let mut x = Array1::from_elem(self.n, T::zero());
        self.solve_into(b, &mut x)?;
        Ok(x)
    }

    /// Solve Ax = b writing into `x`
    pub fn solve_into(&self, b: &Array1<T>, x: &mut Array1<T>) -> Result<(), LuError> {
        if b.len() != self.n {
            return Err(LuError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }
        if x.len() != self.n {
            return Err(LuError::DimensionMismatch {
                expected: self.n,
                got: x.len(),
            });
        }

        for (i, &p) in self.perm.iter().enumerate() {
            x[i] = b[p];
        }

        // Forward substitution: Ly = Pb
        for i in 0..self.n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }

        // Backward substitution: Ux = y
        for i in (0..self.n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..self.n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum * self.lu[[i, i]].inv();
        }

        Ok(())
    }
}

/// Compute LU factorization with partial pivoting
pub fn lu_factorize<T: ComplexField>(
    a: &Array2<T>,
    shift: PivotShift,
) -> Result<LuFactorization<T>, LuError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LuError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }

    let tiny = T::Real::from_f64(1e-30).unwrap_or_else(T::Real::min_positive_value);
    let scale = a.iter().fold(T::Real::one(), |acc, v| acc.max(v.norm()));
    let shift_amount = scale * T::Real::from_f64(1e-10).unwrap_or_else(T::Real::epsilon);

    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut shifted_pivots = 0;

    for k in 0..n {
        let mut max_val = lu[[k, k]].norm();
        let mut max_row = k;
        for i in (k + 1)..n {
            let val = lu[[i, k]].norm();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_row != k {
            for j in 0..n {
                lu.swap([k, j], [max_row, j]);
            }
            perm.swap(k, max_row);
        }

        if max_val < tiny {
            match shift {
                PivotShift::None => return Err(LuError::SingularMatrix { column: k }),
                PivotShift::InBlocks => {
                    lu[[k, k]] += T::from_real(shift_amount);
                    shifted_pivots += 1;
                }
            }
        }

        let pivot_inv = lu[[k, k]].inv();
        for i in (k + 1)..n {
            let mult = lu[[i, k]] * pivot_inv;
            lu[[i, k]] = mult;
            for j in (k + 1)..n {
                let update = mult * lu[[k, j]];
                lu[[i, j]] -= update;
            }
        }
    }

    if shifted_pivots > 0 {
        log::debug!(
            "LU: shifted {} zero pivot(s) by {:.3e}",
            shifted_pivots,
            shift_amount.to_f64().unwrap_or(f64::NAN)
        );
    }

    Ok(LuFactorization {
        lu,
        perm,
        n,
        shifted_pivots,
    })
}

/// Densify a sparse matrix and factor it
pub fn lu_factorize_csr<T: ComplexField>(
    a: &CsrMatrix<T>,
    shift: PivotShift,
) -> Result<LuFactorization<T>, LuError> {
    lu_factorize(&a.to_dense(), shift)
}

/// Solve Ax = b using LU decomposition
pub fn lu_solve<T: ComplexField>(a: &Array2<T>, b: &Array1<T>) -> Result<Array1<T>, LuError> {
    lu_factorize(a, PivotShift::None)?.solve(b)
}
