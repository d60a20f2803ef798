//! Discretization managers
//!
//! A [`Discretization`] knows a grid: how many unknowns it has, how to coarsen
//! it, how to build transfer operators to its coarsening and (optionally) how
//! to rediscretize the operator on it. When one is attached to a hierarchy,
//! setup asks it for every transfer operator the user did not supply.

use crate::error::{MgError, Result};
use crate::transfer::{coarse_size_1d, linear_interpolation_1d, restriction_scale};
use math_linalg::{ComplexField, CsrBuilder, CsrMatrix};
use ndarray::Array1;

/// Transfer operators produced by a discretization
#[derive(Debug, Clone)]
pub struct TransferSet<T: ComplexField> {
    /// `n_fine × n_coarse` interpolation
    pub interpolation: CsrMatrix<T>,
    /// Optional separate restriction (either orientation)
    pub restriction: Option<CsrMatrix<T>>,
    /// Optional weights applied after restriction
    pub rscale: Option<Array1<T>>,
}

/// Grid-aware provider of coarse grids, transfers and operators.
pub trait Discretization<T: ComplexField>: Send + Sync {
    /// Unknowns on this grid
    fn num_dofs(&self) -> usize;

    /// How many times this grid can still be coarsened
    fn refine_level(&self) -> usize;

    /// Next coarser grid
    fn coarsen(&self) -> Result<Box<dyn Discretization<T>>>;

    /// Transfers between this grid and `coarse`
    fn create_transfer(&self, coarse: &dyn Discretization<T>) -> Result<TransferSet<T>>;

    /// Rediscretized operator, if this grid can assemble one
    fn compute_operator(&self) -> Option<CsrMatrix<T>> {
        None
    }

    /// Auxiliary state vector carried on the grid
    fn location(&self) -> Option<&Array1<T>> {
        None
    }

    /// Replace the auxiliary state vector
    fn set_location(&mut self, _location: Array1<T>) {}

    /// Notification that the hierarchy restricted state from `fine` onto this grid
    fn on_restrict(
        &mut self,
        _fine: &dyn Discretization<T>,
        _restriction: &CsrMatrix<T>,
        _rscale: Option<&Array1<T>>,
    ) {
    }

    /// Short description for diagnostics
    fn describe(&self) -> String;
}

/// Uniform grid on `[0, 1]` with homogeneous Dirichlet ends
///
/// Unknowns are the `intervals - 1` interior points. The operator is the
/// second-order Laplacian `(1/h²) tridiag(-1, 2, -1)`.
#[derive(Debug, Clone)]
pub struct Grid1d<T: ComplexField> {
    intervals: usize,
    location: Option<Array1<T>>,
    restrict_events: usize,
}

impl<T: ComplexField> Grid1d<T> {
    /// Grid with `intervals` cells (at least 2)
    pub fn new(intervals: usize) -> Result<Self> {
        if intervals < 2 {
            return Err(MgError::CannotCoarsen {
                dofs: intervals.saturating_sub(1),
            });
        }
        Ok(Self {
            intervals,
            location: None,
            restrict_events: 0,
        })
    }

    /// Grid with `2^k` cells
    pub fn dyadic(k: u32) -> Result<Self> {
        Self::new(1usize << k)
    }

    /// Attach an auxiliary state vector
    pub fn with_location(mut self, location: Array1<T>) -> Result<Self> {
        if location.len() != self.intervals - 1 {
            return Err(MgError::DimensionMismatch {
                what: "grid location",
                expected: self.intervals - 1,
                got: location.len(),
            });
        }
        self.location = Some(location);
        Ok(self)
    }

    /// Number of cells
    pub fn intervals(&self) -> usize {
        self.intervals
    }

    /// Mesh width
    pub fn h(&self) -> f64 {
        1.0 / self.intervals as f64
    }

    /// Interior node coordinates
    pub fn nodes(&self) -> Vec<f64> {
        (1..self.intervals).map(|i| i as f64 * self.h()).collect()
    }

    /// Number of restriction notifications received
    pub fn restrict_events(&self) -> usize {
        self.restrict_events
    }

    /// `(1/h²) tridiag(-1, 2, -1)` on the interior unknowns
    pub fn laplacian(&self) -> CsrMatrix<T> {
        let n = self.intervals - 1;
        let inv_h2 = (self.intervals * self.intervals) as f64;
        let diag = T::from_real_f64(2.0 * inv_h2);
        let off = T::from_real_f64(-inv_h2);
        let mut builder = CsrBuilder::with_capacity(n, n, 3 * n);
        for i in 0..n {
            let left = i.checked_sub(1).map(|j| (j, off));
            let right = (i + 1 < n).then_some((i + 1, off));
            builder.add_row_entries(left.into_iter().chain(std::iter::once((i, diag))).chain(right));
        }
        builder.finish()
    }
}

impl<T: ComplexField> Discretization<T> for Grid1d<T> {
    fn num_dofs(&self) -> usize {
        self.intervals - 1
    }

    fn refine_level(&self) -> usize {
        let mut intervals = self.intervals;
        let mut level = 0;
        while intervals >= 4 && intervals % 2 == 0 {
            intervals /= 2;
            level += 1;
        }
        level
    }

    fn coarsen(&self) -> Result<Box<dyn Discretization<T>>> {
        if self.refine_level() == 0 {
            return Err(MgError::CannotCoarsen {
                dofs: self.num_dofs(),
            });
        }
        Ok(Box::new(Grid1d::new(self.intervals / 2)?))
    }

    fn create_transfer(&self, coarse: &dyn Discretization<T>) -> Result<TransferSet<T>> {
        let expected = coarse_size_1d(self.num_dofs())?;
        if coarse.num_dofs() != expected {
            return Err(MgError::DimensionMismatch {
                what: "coarse grid",
                expected,
                got: coarse.num_dofs(),
            });
        }
        let interpolation = linear_interpolation_1d(self.num_dofs())?;
        let rscale = restriction_scale(&interpolation);
        Ok(TransferSet {
            interpolation,
            restriction: None,
            rscale: Some(rscale),
        })
    }

    fn compute_operator(&self) -> Option<CsrMatrix<T>> {
        Some(self.laplacian())
    }

    fn location(&self) -> Option<&Array1<T>> {
        self.location.as_ref()
    }

    fn set_location(&mut self, location: Array1<T>) {
        self.location = Some(location);
    }

    fn on_restrict(
        &mut self,
        fine: &dyn Discretization<T>,
        _restriction: &CsrMatrix<T>,
        _rscale: Option<&Array1<T>>,
    ) {
        self.restrict_events += 1;
        log::debug!(
            "grid with {} unknowns restricted from {} unknowns",
            self.num_dofs(),
            fine.num_dofs()
        );
    }

    fn describe(&self) -> String {
        format!("1-D Dirichlet grid, {} cells", self.intervals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_laplacian_stencil() {
        let grid = Grid1d::<f64>::new(4).expect("grid");
        let a = grid.laplacian();
        assert_eq!(a.num_rows, 3);
        assert_relative_eq!(a.get(0, 0), 32.0);
        assert_relative_eq!(a.get(1, 0), -16.0);
        assert_relative_eq!(a.get(1, 2), -16.0);
        assert_relative_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.nnz(), 7);
    }

    #[test]
    fn test_dyadic_refine_level_and_coarsening() {
        let grid = Grid1d::<f64>::dyadic(5).expect("grid");
        assert_eq!(grid.num_dofs(), 31);
        assert_eq!(grid.refine_level(), 4);

        let coarse = grid.coarsen().expect("coarsenable");
        assert_eq!(coarse.num_dofs(), 15);
        assert_eq!(coarse.refine_level(), 3);

        let coarsest = Grid1d::<f64>::new(2).expect("grid");
        assert!(coarsest.coarsen().is_err());
    }

    #[test]
    fn test_transfer_to_coarsened_grid() {
        let grid = Grid1d::<f64>::dyadic(3).expect("grid");
        let coarse = grid.coarsen().expect("coarsenable");
        let set = grid.create_transfer(coarse.as_ref()).expect("transfer");
        assert_eq!((set.interpolation.num_rows, set.interpolation.num_cols), (7, 3));
        let rscale = set.rscale.expect("rscale");
        assert!(rscale.iter().all(|&s| (s - 0.5).abs() < 1e-15));
    }

    #[test]
    fn test_transfer_rejects_unrelated_grid() {
        let grid = Grid1d::<f64>::dyadic(3).expect("grid");
        let other = Grid1d::<f64>::dyadic(1).expect("grid");
        assert!(grid.create_transfer(&other).is_err());
    }

    #[test]
    fn test_location_size_checked() {
        let grid = Grid1d::<f64>::new(4).expect("grid");
        assert!(grid.clone().with_location(Array1::zeros(2)).is_err());
        let grid = grid.with_location(Array1::ones(3)).expect("sized");
        assert_eq!(grid.location().map(|l| l.len()), Some(3));
        assert_eq!(grid.nodes(), vec![0.25, 0.5, 0.75]);
    }
}
