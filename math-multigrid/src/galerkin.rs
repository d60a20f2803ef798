//! Galerkin coarse operators
//!
//! `A_c = R A P`. With a shared transfer the restriction is the transpose of
//! the interpolation and the product is `Pᵀ A P`; with a restriction scale
//! `S = diag(rscale)` the effective restriction is `S R`, the same operator
//! the cycle applies to residuals.
//!
//! The restriction is read where it is stored. Repeated setups over an
//! unchanged pattern write the new values into the previous coarse operator.

use crate::transfer::TransferPair;
use math_linalg::{ComplexField, CsrMatrix};
use ndarray::Array1;

/// Coarse operator for a fine operator `a` and the level's transfers
pub fn galerkin_product<T: ComplexField>(
    a: &CsrMatrix<T>,
    transfer: &TransferPair<T>,
    rscale: Option<&Array1<T>>,
    n_coarse: usize,
) -> CsrMatrix<T> {
    let n_fine = a.num_rows;
    let ap = a.matmul(&transfer.interpolation_matrix(n_fine, n_coarse));
    let left = transfer.restriction_factor(n_fine, n_coarse);

    let mut ac = CsrMatrix::product_pattern(left, &ap);
    let filled = ac.product_values_into(left, rscale, &ap);
    debug_assert!(filled, "product pattern must hold every entry");
    ac
}

/// Recompute a coarse operator into existing storage
///
/// The values of `out` are overwritten in place when its pattern holds the
/// new product. Otherwise `out` is rebuilt. Returns `true` when the previous
/// allocation was reused.
pub fn galerkin_product_reuse<T: ComplexField>(
    a: &CsrMatrix<T>,
    transfer: &TransferPair<T>,
    rscale: Option<&Array1<T>>,
    out: &mut CsrMatrix<T>,
) -> bool {
    let n_fine = a.num_rows;
    let n_coarse = out.num_rows;
    let ap = a.matmul(&transfer.interpolation_matrix(n_fine, n_coarse));
    let left = transfer.restriction_factor(n_fine, n_coarse);

    if out.product_values_into(left, rscale, &ap) {
        return true;
    }
    *out = CsrMatrix::product_pattern(left, &ap);
    out.product_values_into(left, rscale, &ap);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::Grid1d;
    use crate::transfer::{TransferSharing, full_weighting_1d, linear_interpolation_1d};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn shared(p: CsrMatrix<f64>) -> TransferPair<f64> {
        let p = Arc::new(p);
        TransferPair {
            restriction: p.clone(),
            interpolation: p,
            sharing: TransferSharing::Shared,
        }
    }

    #[test]
    fn test_full_weighting_galerkin_equals_rediscretization() {
        let fine = Grid1d::<f64>::dyadic(4).expect("grid");
        let coarse = Grid1d::<f64>::dyadic(3).expect("grid");
        let a = fine.laplacian();

        let pair = TransferPair {
            restriction: Arc::new(full_weighting_1d(15).expect("odd")),
            interpolation: Arc::new(linear_interpolation_1d(15).expect("odd")),
            sharing: TransferSharing::Distinct,
        };
        let ac = galerkin_product(&a, &pair, None, 7);
        let expected = coarse.laplacian().to_dense();
        let got = ac.to_dense();
        for i in 0..7 {
            for j in 0..7 {
                assert_relative_eq!(got[[i, j]], expected[[i, j]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_shared_transfer_with_rscale_equals_full_weighting() {
        let a = Grid1d::<f64>::dyadic(4).expect("grid").laplacian();
        let pair = shared(linear_interpolation_1d(15).expect("odd"));
        let scale = Array1::from_elem(7, 0.5);

        let with_scale = galerkin_product(&a, &pair, Some(&scale), 7).to_dense();
        let expected = Grid1d::<f64>::dyadic(3).expect("grid").laplacian().to_dense();
        for i in 0..7 {
            for j in 0..7 {
                assert_relative_eq!(with_scale[[i, j]], expected[[i, j]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_shared_transfer_is_ptap_on_nonsymmetric_operator() {
        // convection-diffusion stencil, not symmetric
        let n = 7;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.5));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -0.5));
            }
        }
        let a = CsrMatrix::from_triplets(n, n, triplets);
        let p = linear_interpolation_1d::<f64>(n).expect("odd");

        let ac = galerkin_product(&a, &shared(p.clone()), None, 3).to_dense();
        let explicit = p.transpose().to_dense().dot(&a.to_dense()).dot(&p.to_dense());
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(ac[[i, j]], explicit[[i, j]], epsilon = 1e-12);
            }
        }
        assert!((ac[[0, 1]] - ac[[1, 0]]).abs() > 1e-3);
    }

    #[test]
    fn test_reuse_is_bit_identical() {
        let a = Grid1d::<f64>::dyadic(5).expect("grid").laplacian();
        let pair = shared(linear_interpolation_1d(31).expect("odd"));
        let mut out = galerkin_product(&a, &pair, None, 15);
        let first = out.clone();

        assert!(galerkin_product_reuse(&a, &pair, None, &mut out));
        assert_eq!(out, first);
    }

    #[test]
    fn test_reuse_writes_new_values_in_place() {
        let mut a = Grid1d::<f64>::dyadic(5).expect("grid").laplacian();
        let pair = shared(linear_interpolation_1d(31).expect("odd"));
        let scale = Array1::from_elem(15, 0.5);
        let mut out = galerkin_product(&a, &pair, Some(&scale), 15);
        let first = out.clone();
        let values = out.values.as_ptr();
        let columns = out.col_indices.as_ptr();

        a.scale(3.0);
        assert!(galerkin_product_reuse(&a, &pair, Some(&scale), &mut out));
        assert_eq!(out.values.as_ptr(), values);
        assert_eq!(out.col_indices.as_ptr(), columns);
        assert!(out.same_pattern(&first));
        for (new, old) in out.values.iter().zip(&first.values) {
            assert_relative_eq!(*new, 3.0 * old, epsilon = 1e-9, max_relative = 1e-12);
        }
        assert_eq!(out, galerkin_product(&a, &pair, Some(&scale), 15));
    }

    #[test]
    fn test_reuse_rebuilds_a_foreign_pattern() {
        let a = Grid1d::<f64>::dyadic(4).expect("grid").laplacian();
        let pair = TransferPair {
            restriction: Arc::new(full_weighting_1d(15).expect("odd")),
            interpolation: Arc::new(linear_interpolation_1d(15).expect("odd")),
            sharing: TransferSharing::Distinct,
        };
        let mut out = CsrMatrix::identity(7);
        assert!(!galerkin_product_reuse(&a, &pair, None, &mut out));
        assert_eq!(out, galerkin_product(&a, &pair, None, 7));
        assert_eq!(out.nnz(), 19);
    }
}
