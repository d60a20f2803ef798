//! One level of the hierarchy
//!
//! A [`Level`] owns everything the cycle engine touches on one grid: the
//! operator, the smoother pair, the work vectors and the transfer operators
//! to the next coarser level. The primitives here (smooth, residual,
//! restrict, interpolate) are the only operations the cycle variants use.

use crate::discretization::Discretization;
use crate::error::{FailurePhase, FailureReason, MgError, Result, SmootherError};
use crate::smoother::Smoother;
use crate::transfer::{self, TransferPair};
use math_linalg::vector::vector_norm_f64;
use math_linalg::{ComplexField, CsrMatrix};
use ndarray::Array1;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Residual evaluation `r = b - A x` (or any user replacement)
pub type ResidualFn<T> =
    Arc<dyn Fn(&CsrMatrix<T>, &Array1<T>, &Array1<T>, &mut Array1<T>) + Send + Sync>;

/// The true residual `r = b - A x`
pub fn default_residual<T: ComplexField>() -> ResidualFn<T> {
    Arc::new(|a: &CsrMatrix<T>, b: &Array1<T>, x: &Array1<T>, r: &mut Array1<T>| {
        a.residual_into(b, x, r)
    })
}

/// Level operator, computed by the hierarchy or supplied from outside
#[derive(Debug, Clone)]
pub enum Operator<T: ComplexField> {
    /// Built during setup (Galerkin product or rediscretization)
    Owned(CsrMatrix<T>),
    /// Supplied by the caller and shared with it
    Shared(Arc<CsrMatrix<T>>),
}

impl<T: ComplexField> Deref for Operator<T> {
    type Target = CsrMatrix<T>;

    fn deref(&self) -> &CsrMatrix<T> {
        match self {
            Operator::Owned(m) => m,
            Operator::Shared(m) => m,
        }
    }
}

/// Pre- and post-smoother of a level
pub enum SmootherPair<T: ComplexField> {
    /// One smoother used in both directions
    Shared(Box<dyn Smoother<T>>),
    /// Independent pre-smoother (`down`) and post-smoother (`up`)
    Distinct {
        /// Pre-smoother
        down: Box<dyn Smoother<T>>,
        /// Post-smoother
        up: Box<dyn Smoother<T>>,
    },
}

impl<T: ComplexField> SmootherPair<T> {
    /// Pre-smoother
    pub fn down(&self) -> &dyn Smoother<T> {
        match self {
            SmootherPair::Shared(s) => s.as_ref(),
            SmootherPair::Distinct { down, .. } => down.as_ref(),
        }
    }

    /// Post-smoother
    pub fn up(&self) -> &dyn Smoother<T> {
        match self {
            SmootherPair::Shared(s) => s.as_ref(),
            SmootherPair::Distinct { up, .. } => up.as_ref(),
        }
    }

    /// Mutable pre-smoother (the shared smoother when shared)
    pub fn down_mut(&mut self) -> &mut dyn Smoother<T> {
        match self {
            SmootherPair::Shared(s) => s.as_mut(),
            SmootherPair::Distinct { down, .. } => down.as_mut(),
        }
    }

    /// Mutable post-smoother (the shared smoother when shared)
    pub fn up_mut(&mut self) -> &mut dyn Smoother<T> {
        match self {
            SmootherPair::Shared(s) => s.as_mut(),
            SmootherPair::Distinct { up, .. } => up.as_mut(),
        }
    }

    /// True when one smoother serves both directions
    pub fn is_shared(&self) -> bool {
        matches!(self, SmootherPair::Shared(_))
    }

    /// Install a new pre-smoother; a shared smoother stays on as post-smoother
    pub fn replace_down(&mut self, smoother: Box<dyn Smoother<T>>) {
        match self {
            SmootherPair::Distinct { down, .. } => *down = smoother,
            SmootherPair::Shared(s) => {
                let up = std::mem::replace(s, smoother.duplicate());
                *self = SmootherPair::Distinct { down: smoother, up };
            }
        }
    }

    /// Install a new post-smoother; a shared smoother stays on as pre-smoother
    pub fn replace_up(&mut self, smoother: Box<dyn Smoother<T>>) {
        match self {
            SmootherPair::Distinct { up, .. } => *up = smoother,
            SmootherPair::Shared(s) => {
                let down = std::mem::replace(s, smoother.duplicate());
                *self = SmootherPair::Distinct { down, up: smoother };
            }
        }
    }

    /// Give the post-smoother its own copy of the shared smoother
    pub fn split(&mut self) {
        if let SmootherPair::Shared(s) = self {
            let up = s.duplicate();
            let placeholder = s.duplicate();
            let down = std::mem::replace(s, placeholder);
            *self = SmootherPair::Distinct { down, up };
        }
    }
}

/// Events timed per level when level logging is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEvent {
    /// Smoother setup
    Setup,
    /// Pre-smoothing
    SmoothDown,
    /// Post-smoothing
    SmoothUp,
    /// Residual evaluation
    Residual,
    /// Restriction and interpolation
    Transfer,
}

/// Accumulated wall time and call counts of one level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelTimings {
    /// Smoother setup time
    pub setup: Duration,
    /// Pre-smoothing time
    pub smooth_down: Duration,
    /// Post-smoothing time
    pub smooth_up: Duration,
    /// Residual time
    pub residual: Duration,
    /// Restriction/interpolation time
    pub transfer: Duration,
    /// Pre-smoother calls
    pub smooth_down_calls: usize,
    /// Post-smoother calls
    pub smooth_up_calls: usize,
    /// Residual evaluations
    pub residual_calls: usize,
    /// Restrictions plus interpolations
    pub transfer_calls: usize,
}

impl LevelTimings {
    fn record(&mut self, event: LevelEvent, elapsed: Duration) {
        match event {
            LevelEvent::Setup => self.setup += elapsed,
            LevelEvent::SmoothDown => {
                self.smooth_down += elapsed;
                self.smooth_down_calls += 1;
            }
            LevelEvent::SmoothUp => {
                self.smooth_up += elapsed;
                self.smooth_up_calls += 1;
            }
            LevelEvent::Residual => {
                self.residual += elapsed;
                self.residual_calls += 1;
            }
            LevelEvent::Transfer => {
                self.transfer += elapsed;
                self.transfer_calls += 1;
            }
        }
    }

    /// Total time over all events
    pub fn total(&self) -> Duration {
        self.setup + self.smooth_down + self.smooth_up + self.residual + self.transfer
    }
}

/// Level 1 always recurses once into the coarse solve
fn clamp_cycles(level: usize, cycles: usize) -> usize {
    if level == 1 { 1 } else { cycles.max(1) }
}

/// One grid of the hierarchy; index 0 is the coarsest
pub struct Level<T: ComplexField> {
    pub(crate) level: usize,
    pub(crate) levels: usize,
    pub(crate) operator: Option<Operator<T>>,
    pub(crate) user_operator: Option<Arc<CsrMatrix<T>>>,
    pub(crate) smoothers: SmootherPair<T>,
    pub(crate) b: Option<Array1<T>>,
    pub(crate) x: Option<Array1<T>>,
    pub(crate) r: Option<Array1<T>>,
    pub(crate) restriction: Option<Arc<CsrMatrix<T>>>,
    pub(crate) interpolation: Option<Arc<CsrMatrix<T>>>,
    pub(crate) transfer: Option<TransferPair<T>>,
    pub(crate) rscale: Option<Array1<T>>,
    pub(crate) cycles: usize,
    pub(crate) residual: ResidualFn<T>,
    pub(crate) failure: Option<FailureReason>,
    pub(crate) timings: Option<LevelTimings>,
    pub(crate) discretization: Option<Box<dyn Discretization<T>>>,
}

impl<T: ComplexField> Level<T> {
    pub(crate) fn new(level: usize, levels: usize, smoother: Box<dyn Smoother<T>>, cycles: usize) -> Self {
        Self {
            level,
            levels,
            operator: None,
            user_operator: None,
            smoothers: SmootherPair::Shared(smoother),
            b: None,
            x: None,
            r: None,
            restriction: None,
            interpolation: None,
            transfer: None,
            rscale: None,
            cycles: clamp_cycles(level, cycles),
            residual: default_residual(),
            failure: None,
            timings: None,
            discretization: None,
        }
    }

    /// Index of this level, 0 = coarsest
    pub fn index(&self) -> usize {
        self.level
    }

    /// Number of levels in the owning hierarchy
    pub fn num_levels(&self) -> usize {
        self.levels
    }

    /// Bound operator, if set up
    pub fn operator(&self) -> Option<&CsrMatrix<T>> {
        self.operator.as_deref()
    }

    /// True when the bound operator was computed by the hierarchy
    pub fn owns_operator(&self) -> bool {
        matches!(self.operator, Some(Operator::Owned(_)))
    }

    /// Unknowns on this level (0 before setup)
    pub fn num_dofs(&self) -> usize {
        self.operator.as_ref().map_or(0, |a| a.num_rows)
    }

    /// Smoother pair
    pub fn smoothers(&self) -> &SmootherPair<T> {
        &self.smoothers
    }

    /// Transfer operators to level - 1, as bound at setup
    pub fn transfer(&self) -> Option<&TransferPair<T>> {
        self.transfer.as_ref()
    }

    /// Restriction weights
    pub fn rscale(&self) -> Option<&Array1<T>> {
        self.rscale.as_ref()
    }

    /// Recursion multiplicity (1 = V, 2 = W); always 1 on level 1
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub(crate) fn set_cycles(&mut self, cycles: usize) {
        self.cycles = clamp_cycles(self.level, cycles);
    }

    /// Failure recorded on this level
    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// Accumulated timings, when level logging is on
    pub fn timings(&self) -> Option<&LevelTimings> {
        self.timings.as_ref()
    }

    /// Coarse discretization generated for this level
    pub fn discretization(&self) -> Option<&dyn Discretization<T>> {
        self.discretization.as_deref()
    }

    /// Last computed residual
    pub fn residual_vector(&self) -> Option<&Array1<T>> {
        self.r.as_ref()
    }

    pub(crate) fn operator_ref(&self) -> Result<&CsrMatrix<T>> {
        self.operator
            .as_deref()
            .ok_or(MgError::MissingOperator { level: self.level })
    }

    fn transfer_ref(&self) -> Result<&TransferPair<T>> {
        self.transfer
            .as_ref()
            .ok_or(MgError::MissingTransfer { level: self.level })
    }

    pub(crate) fn record_failure(&mut self, phase: FailurePhase, error: SmootherError) {
        log::warn!("level {}: {:?} failure: {}", self.level, phase, error);
        if self.failure.is_none() {
            self.failure = Some(FailureReason::SubSolver {
                level: self.level,
                phase,
                error,
            });
        }
    }

    pub(crate) fn clear_apply_failure(&mut self) {
        if matches!(
            self.failure,
            Some(FailureReason::SubSolver {
                phase: FailurePhase::Apply,
                ..
            })
        ) {
            self.failure = None;
        }
    }

    fn start_event(&self) -> Option<Instant> {
        self.timings.is_some().then(Instant::now)
    }

    fn end_event(&mut self, event: LevelEvent, start: Option<Instant>) {
        if let (Some(timings), Some(start)) = (self.timings.as_mut(), start) {
            timings.record(event, start.elapsed());
        }
    }

    /// Set up both smoothers against the bound operator; failures are recorded
    pub(crate) fn setup_smoothers(&mut self) -> Result<()> {
        let start = self.start_event();
        let a = self
            .operator
            .as_deref()
            .ok_or(MgError::MissingOperator { level: self.level })?;
        let result = match &mut self.smoothers {
            SmootherPair::Shared(s) => s.setup(a),
            SmootherPair::Distinct { down, up } => down.setup(a).and_then(|_| up.setup(a)),
        };
        if let Err(err) = result {
            self.record_failure(FailurePhase::Setup, err);
        }
        self.end_event(LevelEvent::Setup, start);
        Ok(())
    }

    /// `x ← smoothDown.solve(A, b, x)`
    pub(crate) fn smooth_down(&mut self, b: &Array1<T>, x: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let a = self
            .operator
            .as_deref()
            .ok_or(MgError::MissingOperator { level: self.level })?;
        if let Err(err) = self.smoothers.down_mut().solve(a, b, x) {
            self.record_failure(FailurePhase::Apply, err);
        }
        self.end_event(LevelEvent::SmoothDown, start);
        Ok(())
    }

    /// `x ← smoothUp.solve(A, b, x)`
    pub(crate) fn smooth_up(&mut self, b: &Array1<T>, x: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let a = self
            .operator
            .as_deref()
            .ok_or(MgError::MissingOperator { level: self.level })?;
        if let Err(err) = self.smoothers.up_mut().solve(a, b, x) {
            self.record_failure(FailurePhase::Apply, err);
        }
        self.end_event(LevelEvent::SmoothUp, start);
        Ok(())
    }

    /// `r ← residual(A, b, x)`
    pub(crate) fn compute_residual(&mut self, b: &Array1<T>, x: &Array1<T>) -> Result<()> {
        let start = self.start_event();
        let a = self
            .operator
            .as_deref()
            .ok_or(MgError::MissingOperator { level: self.level })?;
        let r = self.r.get_or_insert_with(|| Array1::from_elem(a.num_rows, T::zero()));
        (self.residual)(a, b, x, r);
        self.end_event(LevelEvent::Residual, start);
        Ok(())
    }

    /// 2-norm of the last residual
    pub(crate) fn residual_norm(&self) -> f64 {
        self.r.as_ref().map_or(f64::NAN, vector_norm_f64)
    }

    /// `coarse_b ← R r` (then `∘ rscale`)
    pub(crate) fn restrict_residual(&mut self, coarse_b: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let pair = self.transfer_ref()?;
        let r = self.r.as_ref().ok_or(MgError::DimensionMismatch {
            what: "residual work vector",
            expected: self.num_dofs(),
            got: 0,
        })?;
        transfer::restrict(&pair.restriction, r, coarse_b, self.rscale.as_ref());
        self.end_event(LevelEvent::Transfer, start);
        Ok(())
    }

    /// `coarse_b ← R fine` (then `∘ rscale`)
    pub(crate) fn restrict_vector(&mut self, fine: &Array1<T>, coarse_b: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let pair = self.transfer_ref()?;
        transfer::restrict(&pair.restriction, fine, coarse_b, self.rscale.as_ref());
        self.end_event(LevelEvent::Transfer, start);
        Ok(())
    }

    /// `x ← x + P coarse_x`
    pub(crate) fn interpolate_add(&mut self, coarse_x: &Array1<T>, x: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let pair = self.transfer_ref()?;
        transfer::interpolate_add(&pair.interpolation, coarse_x, x);
        self.end_event(LevelEvent::Transfer, start);
        Ok(())
    }

    /// `x ← P coarse_x`
    pub(crate) fn interpolate(&mut self, coarse_x: &Array1<T>, x: &mut Array1<T>) -> Result<()> {
        let start = self.start_event();
        let pair = self.transfer_ref()?;
        transfer::interpolate(&pair.interpolation, coarse_x, x);
        self.end_event(LevelEvent::Transfer, start);
        Ok(())
    }

    /// Move the level's `b` and `x` out for a recursive call
    pub(crate) fn take_work(&mut self) -> Result<(Array1<T>, Array1<T>)> {
        match (self.b.take(), self.x.take()) {
            (Some(b), Some(x)) => Ok((b, x)),
            (b, x) => {
                self.b = b;
                self.x = x;
                Err(MgError::DimensionMismatch {
                    what: "level work vectors",
                    expected: self.num_dofs(),
                    got: 0,
                })
            }
        }
    }

    /// Put the vectors taken by [`Level::take_work`] back
    pub(crate) fn restore_work(&mut self, b: Array1<T>, x: Array1<T>) {
        self.b = Some(b);
        self.x = Some(x);
    }

    /// Make `b`, `x` (non-finest levels) and `r` (levels above the coarsest)
    /// match the operator size
    pub(crate) fn ensure_work_vectors(&mut self) -> Result<()> {
        let n = self.operator_ref()?.num_rows;
        let fit = |v: &mut Option<Array1<T>>| {
            if v.as_ref().is_none_or(|v| v.len() != n) {
                *v = Some(Array1::from_elem(n, T::zero()));
            }
        };
        if self.level + 1 < self.levels {
            fit(&mut self.b);
            fit(&mut self.x);
        } else {
            self.b = None;
            self.x = None;
        }
        if self.level > 0 {
            fit(&mut self.r);
        } else {
            self.r = None;
        }
        Ok(())
    }

    /// Drop everything owned by the level except smoother configuration,
    /// user-registered operator, residual function and cycle shape
    pub(crate) fn reset(&mut self) {
        self.operator = None;
        self.b = None;
        self.x = None;
        self.r = None;
        self.restriction = None;
        self.interpolation = None;
        self.transfer = None;
        self.rscale = None;
        self.failure = None;
        self.discretization = None;
        if let Some(t) = self.timings.as_mut() {
            *t = LevelTimings::default();
        }
    }
}
