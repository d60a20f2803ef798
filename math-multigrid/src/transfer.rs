//! Transfer operators between adjacent levels
//!
//! A single matrix serves both directions. A matrix is *restriction-shaped*
//! when it is `n_coarse × n_fine` with `n_coarse != n_fine`; every other
//! admissible shape (`n_fine × n_coarse`, including square) is
//! *interpolation-shaped*. Restriction applies a restriction-shaped matrix
//! directly and transposes anything else; interpolation does the opposite.
//!
//! The 1-D builders below assume a uniform grid with homogeneous Dirichlet
//! ends: `n_fine = 2 n_coarse + 1` interior unknowns, fine point `2j + 1`
//! coinciding with coarse point `j`.

use crate::error::{MgError, Result};
use math_linalg::vector::pointwise_mult;
use math_linalg::{ComplexField, CsrBuilder, CsrMatrix, LeftFactor};
use ndarray::Array1;
use std::borrow::Cow;
use std::sync::Arc;

/// Whether restriction and interpolation are one matrix or two
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSharing {
    /// One matrix applied in both directions (restriction is its transpose)
    Shared,
    /// Separately supplied restriction and interpolation
    Distinct,
}

/// Transfer operators of one level, as bound at setup
#[derive(Debug, Clone)]
pub struct TransferPair<T: ComplexField> {
    /// Used for fine → coarse
    pub restriction: Arc<CsrMatrix<T>>,
    /// Used for coarse → fine
    pub interpolation: Arc<CsrMatrix<T>>,
    /// How the pair was supplied
    pub sharing: TransferSharing,
}

impl<T: ComplexField> TransferPair<T> {
    /// Check that both matrices connect spaces of size `fine` and `coarse`
    pub fn validate(&self, level: usize, fine: usize, coarse: usize) -> Result<()> {
        for m in [&self.restriction, &self.interpolation] {
            let ok = (m.num_rows == fine && m.num_cols == coarse)
                || (m.num_rows == coarse && m.num_cols == fine);
            if !ok {
                return Err(MgError::TransferShape {
                    level,
                    rows: m.num_rows,
                    cols: m.num_cols,
                    fine,
                    coarse,
                });
            }
        }
        Ok(())
    }

    /// Restriction as the left factor of `R A P`, read in place
    pub fn restriction_factor(&self, fine: usize, coarse: usize) -> LeftFactor<'_, T> {
        if is_restriction_shaped(&self.restriction, fine, coarse) {
            LeftFactor::Rows(&*self.restriction)
        } else {
            LeftFactor::Transposed(&*self.restriction)
        }
    }

    /// Interpolation as an `n_fine × n_coarse` matrix, borrowed when stored that way
    pub fn interpolation_matrix(&self, fine: usize, coarse: usize) -> Cow<'_, CsrMatrix<T>> {
        if is_restriction_shaped(&self.interpolation, fine, coarse) {
            Cow::Owned(self.interpolation.transpose())
        } else {
            Cow::Borrowed(&*self.interpolation)
        }
    }
}

fn is_restriction_shaped<T: ComplexField>(m: &CsrMatrix<T>, fine: usize, coarse: usize) -> bool {
    fine != coarse && m.num_rows == coarse && m.num_cols == fine
}

/// `coarse ← R fine` (then `∘ rscale`)
pub fn restrict<T: ComplexField>(
    m: &CsrMatrix<T>,
    fine: &Array1<T>,
    coarse: &mut Array1<T>,
    rscale: Option<&Array1<T>>,
) {
    if is_restriction_shaped(m, fine.len(), coarse.len()) {
        m.matvec_into(fine, coarse);
    } else {
        m.matvec_transpose_into(fine, coarse);
    }
    if let Some(scale) = rscale {
        pointwise_mult(coarse, scale);
    }
}

/// `fine ← fine + P coarse`
pub fn interpolate_add<T: ComplexField>(m: &CsrMatrix<T>, coarse: &Array1<T>, fine: &mut Array1<T>) {
    if is_restriction_shaped(m, fine.len(), coarse.len()) {
        m.matvec_transpose_add(coarse, fine);
    } else {
        m.matvec_add(coarse, fine);
    }
}

/// `fine ← P coarse`
pub fn interpolate<T: ComplexField>(m: &CsrMatrix<T>, coarse: &Array1<T>, fine: &mut Array1<T>) {
    if is_restriction_shaped(m, fine.len(), coarse.len()) {
        m.matvec_transpose_into(coarse, fine);
    } else {
        m.matvec_into(coarse, fine);
    }
}

/// Number of interior coarse unknowns for `n_fine` interior fine unknowns
pub fn coarse_size_1d(n_fine: usize) -> Result<usize> {
    if n_fine < 3 || n_fine % 2 == 0 {
        return Err(MgError::CannotCoarsen { dofs: n_fine });
    }
    Ok((n_fine - 1) / 2)
}

/// Linear interpolation, `n_fine × n_coarse`
///
/// Fine point `2j + 1` takes coarse value `j`; even fine points average their
/// two coarse neighbours (a missing neighbour is the Dirichlet zero).
pub fn linear_interpolation_1d<T: ComplexField>(n_fine: usize) -> Result<CsrMatrix<T>> {
    let n_coarse = coarse_size_1d(n_fine)?;
    let half = T::from_real_f64(0.5);
    let mut builder = CsrBuilder::with_capacity(n_fine, n_coarse, 2 * n_fine);

    for i in 0..n_fine {
        if i % 2 == 1 {
            builder.add_row_entries(std::iter::once(((i - 1) / 2, T::one())));
        } else {
            let left = (i / 2).checked_sub(1);
            let right = (i / 2 < n_coarse).then_some(i / 2);
            builder.add_row_entries(left.into_iter().chain(right).map(|j| (j, half)));
        }
    }

    Ok(builder.finish())
}

/// Full weighting `[1/4, 1/2, 1/4]`, `n_coarse × n_fine`, equal to `½ Pᵀ`
pub fn full_weighting_1d<T: ComplexField>(n_fine: usize) -> Result<CsrMatrix<T>> {
    let n_coarse = coarse_size_1d(n_fine)?;
    let quarter = T::from_real_f64(0.25);
    let half = T::from_real_f64(0.5);
    let mut builder = CsrBuilder::with_capacity(n_coarse, n_fine, 3 * n_coarse);

    for j in 0..n_coarse {
        let c = 2 * j + 1;
        builder.add_row_entries([(c - 1, quarter), (c, half), (c + 1, quarter)].into_iter());
    }

    Ok(builder.finish())
}

/// Injection, `n_coarse × n_fine`
pub fn injection_1d<T: ComplexField>(n_fine: usize) -> Result<CsrMatrix<T>> {
    let n_coarse = coarse_size_1d(n_fine)?;
    let mut builder = CsrBuilder::with_capacity(n_coarse, n_fine, n_coarse);
    for j in 0..n_coarse {
        builder.add_row_entries(std::iter::once((2 * j + 1, T::one())));
    }
    Ok(builder.finish())
}

/// Row-sum reciprocal of `Pᵀ`: the weights that turn `Pᵀ` into an averaging operator
pub fn restriction_scale<T: ComplexField>(interpolation: &CsrMatrix<T>) -> Array1<T> {
    let ones = Array1::from_elem(interpolation.num_rows, T::one());
    interpolation.matvec_transpose(&ones).mapv(|s| s.inv())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_interpolation_structure() {
        let p: CsrMatrix<f64> = linear_interpolation_1d(7).expect("odd size");
        assert_eq!((p.num_rows, p.num_cols), (7, 3));
        assert_relative_eq!(p.get(0, 0), 0.5);
        assert_relative_eq!(p.get(1, 0), 1.0);
        assert_relative_eq!(p.get(2, 0), 0.5);
        assert_relative_eq!(p.get(2, 1), 0.5);
        assert_relative_eq!(p.get(6, 2), 0.5);
        assert_eq!(p.nnz(), 9);
    }

    #[test]
    fn test_full_weighting_is_half_transpose() {
        let p: CsrMatrix<f64> = linear_interpolation_1d(15).expect("odd size");
        let r: CsrMatrix<f64> = full_weighting_1d(15).expect("odd size");
        let pt = p.transpose();
        for i in 0..r.num_rows {
            for j in 0..r.num_cols {
                assert_relative_eq!(r.get(i, j), 0.5 * pt.get(i, j));
            }
        }
    }

    #[test]
    fn test_rscale_turns_transpose_into_full_weighting() {
        let p: CsrMatrix<f64> = linear_interpolation_1d(7).expect("odd size");
        let scale = restriction_scale(&p);
        for s in scale.iter() {
            assert_relative_eq!(*s, 0.5);
        }
    }

    #[test]
    fn test_even_or_tiny_grids_cannot_coarsen() {
        assert!(coarse_size_1d(8).is_err());
        assert!(coarse_size_1d(1).is_err());
        assert_eq!(coarse_size_1d(3).expect("coarsenable"), 1);
    }

    #[test]
    fn test_shape_rule_auto_transposes() {
        let p: CsrMatrix<f64> = linear_interpolation_1d(7).expect("odd size");
        let r: CsrMatrix<f64> = p.transpose();
        let fine = Array1::from_iter((0..7).map(|i| i as f64));

        let mut via_p = Array1::zeros(3);
        let mut via_r = Array1::zeros(3);
        restrict(&p, &fine, &mut via_p, None);
        restrict(&r, &fine, &mut via_r, None);
        assert_eq!(via_p, via_r);

        let coarse = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let mut up_p = Array1::zeros(7);
        let mut up_r = Array1::zeros(7);
        interpolate_add(&p, &coarse, &mut up_p);
        interpolate_add(&r, &coarse, &mut up_r);
        assert_eq!(up_p, up_r);
        assert_relative_eq!(up_p[3], 2.0);
        assert_relative_eq!(up_p[4], 2.5);
    }

    #[test]
    fn test_injection_samples_coincident_points() {
        let inj: CsrMatrix<f64> = injection_1d(7).expect("odd size");
        let fine = Array1::from_iter((0..7).map(|i| i as f64));
        let mut coarse = Array1::zeros(3);
        restrict(&inj, &fine, &mut coarse, None);
        assert_eq!(coarse.to_vec(), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_validate_rejects_wrong_shape() {
        let p: Arc<CsrMatrix<f64>> = Arc::new(linear_interpolation_1d(7).expect("odd size"));
        let pair = TransferPair {
            restriction: p.clone(),
            interpolation: p,
            sharing: TransferSharing::Shared,
        };
        assert!(pair.validate(1, 7, 3).is_ok());
        assert!(matches!(
            pair.validate(1, 9, 4),
            Err(MgError::TransferShape { level: 1, .. })
        ));
    }
}
