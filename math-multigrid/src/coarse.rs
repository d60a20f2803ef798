//! Coarsest-level solvers
//!
//! The coarse problem is small, so it is densified and LU-factored once per
//! setup. Each solve is a single forward/backward substitution; the incoming
//! `x` is ignored and the iteration count is fixed at one.

use crate::error::SmootherError;
use crate::smoother::Smoother;
use math_linalg::{ComplexField, CsrMatrix, LuFactorization, PivotShift, lu_factorize_csr};
use ndarray::Array1;

/// Direct LU solve of the coarse operator
#[derive(Debug, Clone)]
pub struct DirectSolver<T: ComplexField> {
    shift: PivotShift,
    factorization: Option<LuFactorization<T>>,
}

impl<T: ComplexField> Default for DirectSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ComplexField> DirectSolver<T> {
    /// LU with zero pivots shifted in place
    pub fn new() -> Self {
        Self::with_shift(PivotShift::InBlocks)
    }

    /// LU with an explicit pivot treatment
    pub fn with_shift(shift: PivotShift) -> Self {
        Self {
            shift,
            factorization: None,
        }
    }

    /// Factorization from the last successful setup
    pub fn factorization(&self) -> Option<&LuFactorization<T>> {
        self.factorization.as_ref()
    }
}

impl<T: ComplexField> Smoother<T> for DirectSolver<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), SmootherError> {
        self.factorization = None;
        self.factorization = Some(lu_factorize_csr(a, self.shift)?);
        Ok(())
    }

    fn solve(&mut self, _a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>) -> Result<(), SmootherError> {
        let lu = self.factorization.as_ref().ok_or(SmootherError::NotSetUp)?;
        lu.solve_into(b, x)?;
        Ok(())
    }

    fn iterations(&self) -> usize {
        1
    }

    fn set_iterations(&mut self, _iterations: usize) {}

    fn duplicate(&self) -> Box<dyn Smoother<T>> {
        Box::new(DirectSolver::with_shift(self.shift))
    }

    fn describe(&self) -> String {
        match self.shift {
            PivotShift::None => "lu, preonly".to_string(),
            PivotShift::InBlocks => "lu (shift in blocks), preonly".to_string(),
        }
    }
}

/// Coarse solve replicated across rank groups
///
/// Each of `groups` rank groups would gather and factor the whole coarse
/// operator. In a single address space the replication is nominal: one
/// [`DirectSolver`] does the work and `groups` only labels the solver.
#[derive(Debug, Clone)]
pub struct RedundantSolver<T: ComplexField> {
    groups: usize,
    inner: DirectSolver<T>,
}

impl<T: ComplexField> RedundantSolver<T> {
    /// Replicate over `groups` rank groups
    pub fn new(groups: usize) -> Self {
        Self {
            groups: groups.max(1),
            inner: DirectSolver::new(),
        }
    }

    /// Number of replicas
    pub fn groups(&self) -> usize {
        self.groups
    }
}

impl<T: ComplexField> Smoother<T> for RedundantSolver<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), SmootherError> {
        self.inner.setup(a)?;
        log::debug!(
            "redundant coarse solve: {} unknowns, {} group(s)",
            a.num_rows,
            self.groups
        );
        Ok(())
    }

    fn solve(&mut self, a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>) -> Result<(), SmootherError> {
        self.inner.solve(a, b, x)
    }

    fn iterations(&self) -> usize {
        1
    }

    fn set_iterations(&mut self, _iterations: usize) {}

    fn duplicate(&self) -> Box<dyn Smoother<T>> {
        Box::new(RedundantSolver::new(self.groups))
    }

    fn describe(&self) -> String {
        format!("redundant on {} group(s): {}", self.groups, self.inner.describe())
    }
}
