//! Convergence testing for the Richardson wrapper
//!
//! A [`ConvergenceContext`] is created per solve and threaded into the cycle
//! engine. At the entry level the engine evaluates the residual norm, hands
//! it to the [`ConvergenceTest`] and stops the cycle early once a reason other
//! than [`ConvergedReason::Iterating`] is recorded.

use std::fmt;

/// Why an iteration stopped (or that it has not)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergedReason {
    /// Still iterating
    Iterating,
    /// Residual norm below `rtol · ‖r₀‖`
    ConvergedRtol,
    /// Residual norm below `atol`
    ConvergedAtol,
    /// Iteration budget exhausted
    ConvergedIterations,
    /// Residual norm grew beyond `dtol · ‖r₀‖`
    DivergedDtol,
    /// Residual norm is NaN or infinite
    DivergedNan,
}

impl ConvergedReason {
    /// True for every reason other than `Iterating`
    pub fn is_stopped(self) -> bool {
        self != ConvergedReason::Iterating
    }

    /// True for the converged reasons
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            ConvergedReason::ConvergedRtol
                | ConvergedReason::ConvergedAtol
                | ConvergedReason::ConvergedIterations
        )
    }

    /// True for the diverged reasons
    pub fn is_diverged(self) -> bool {
        matches!(self, ConvergedReason::DivergedDtol | ConvergedReason::DivergedNan)
    }
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvergedReason::Iterating => "CONVERGED_ITERATING",
            ConvergedReason::ConvergedRtol => "CONVERGED_RTOL",
            ConvergedReason::ConvergedAtol => "CONVERGED_ATOL",
            ConvergedReason::ConvergedIterations => "CONVERGED_ITS",
            ConvergedReason::DivergedDtol => "DIVERGED_DTOL",
            ConvergedReason::DivergedNan => "DIVERGED_NANORINF",
        };
        write!(f, "{}", name)
    }
}

/// Per-solve scratch state
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceContext {
    /// Outer iteration currently running (0-based)
    pub iteration: usize,
    /// Residual norms seen at the entry level, initial norm first
    pub history: Vec<f64>,
    /// Reason recorded by the last test
    pub reason: ConvergedReason,
}

impl ConvergenceContext {
    /// Fresh context holding the initial residual norm
    pub fn new(r0: f64) -> Self {
        Self {
            iteration: 0,
            history: vec![r0],
            reason: ConvergedReason::Iterating,
        }
    }

    /// Last recorded residual norm
    pub fn last_norm(&self) -> f64 {
        self.history.last().copied().unwrap_or(f64::NAN)
    }
}

/// Decides after each residual evaluation whether to continue
pub trait ConvergenceTest {
    /// Reason for stopping, or `Iterating`
    fn test(&self, ctx: &ConvergenceContext, iteration: usize, rnorm: f64) -> ConvergedReason;

    /// False when the test never stops the iteration
    fn is_active(&self) -> bool {
        true
    }
}

/// Residual-norm test against `ttol`, `dtol · ‖r₀‖` and NaN
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultConvergenceTest {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Divergence factor
    pub dtol: f64,
    /// Initial residual norm
    pub r0: f64,
    /// Effective stopping threshold
    pub ttol: f64,
}

impl DefaultConvergenceTest {
    /// Test for a solve starting from residual norm `r0`
    ///
    /// `ttol = max(rtol · r0, atol)` when `rtol > 0`, `atol` when only
    /// `atol > 0`, and 0 (inactive) otherwise.
    pub fn new(rtol: f64, atol: f64, dtol: f64, r0: f64) -> Self {
        let ttol = if rtol > 0.0 {
            (rtol * r0).max(atol)
        } else if atol > 0.0 {
            atol
        } else {
            0.0
        };
        Self { rtol, atol, dtol, r0, ttol }
    }
}

impl ConvergenceTest for DefaultConvergenceTest {
    fn test(&self, _ctx: &ConvergenceContext, _iteration: usize, rnorm: f64) -> ConvergedReason {
        if !rnorm.is_finite() {
            return ConvergedReason::DivergedNan;
        }
        if rnorm <= self.ttol {
            return if rnorm < self.atol {
                ConvergedReason::ConvergedAtol
            } else {
                ConvergedReason::ConvergedRtol
            };
        }
        if self.dtol.is_finite() && rnorm > self.dtol * self.r0 {
            return ConvergedReason::DivergedDtol;
        }
        ConvergedReason::Iterating
    }

    fn is_active(&self) -> bool {
        self.ttol > 0.0
    }
}
