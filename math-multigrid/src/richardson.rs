//! Richardson iteration driven by multiplicative cycles
//!
//! Each outer iteration is one cycle whose entry level evaluates the
//! residual after pre-smoothing, so the norm test costs no extra operator
//! application. Convergence is recorded in a [`ConvergenceContext`] that
//! lives only for the duration of one solve.

use crate::config::{MgType, RichardsonTolerances};
use crate::convergence::{ConvergedReason, ConvergenceContext, ConvergenceTest, DefaultConvergenceTest};
use crate::cycle::{EntryCheck, multiplicative_cycle};
use crate::error::{FailureReason, MgError, Result};
use crate::hierarchy::Multigrid;
use math_linalg::ComplexField;
use math_linalg::vector::vector_norm_f64;
use ndarray::Array1;

/// Result of a Richardson solve
#[derive(Debug, Clone, PartialEq)]
pub struct RichardsonOutcome {
    /// Completed cycles
    pub iterations: usize,
    /// Why the iteration stopped
    pub reason: ConvergedReason,
    /// Initial residual norm followed by the norm seen in each cycle
    pub residual_history: Vec<f64>,
    /// Subordinate-solver failure, if any
    pub failure: Option<FailureReason>,
}

impl RichardsonOutcome {
    /// Last residual norm in the history
    pub fn final_residual(&self) -> f64 {
        self.residual_history.last().copied().unwrap_or(f64::NAN)
    }

    /// True when the iteration converged and no subordinate solver failed
    pub fn is_success(&self) -> bool {
        self.reason.is_converged() && self.failure.is_none()
    }
}

impl<T: ComplexField> Multigrid<T> {
    fn initial_residual_norm(&mut self, b: &Array1<T>, x: &mut Array1<T>, zero_guess: bool) -> Result<f64> {
        if zero_guess {
            x.fill(T::zero());
            return Ok(vector_norm_f64(b));
        }
        let n = self.levels.len();
        let a = self.levels[n - 1].operator_ref()?;
        let mut r = Array1::from_elem(a.num_rows, T::zero());
        (self.levels[n - 1].residual)(a, b, &*x, &mut r);
        Ok(vector_norm_f64(&r))
    }

    /// Richardson iteration with the default residual-norm test
    ///
    /// `ttol = max(rtol · ‖r₀‖, atol)`; with `rtol = atol = 0` exactly
    /// `max_iterations` cycles run.
    pub fn apply_richardson(
        &mut self,
        b: &Array1<T>,
        x: &mut Array1<T>,
        tolerances: &RichardsonTolerances,
        zero_guess: bool,
    ) -> Result<RichardsonOutcome> {
        self.ensure_setup()?;
        self.check_vectors(b, x)?;
        let r0 = self.initial_residual_norm(b, x, zero_guess)?;
        let test = DefaultConvergenceTest::new(tolerances.rtol, tolerances.atol, tolerances.dtol, r0);
        self.richardson_loop(b, x, r0, tolerances.max_iterations, &test)
    }

    /// Richardson iteration with a caller-supplied convergence test
    pub fn apply_richardson_with(
        &mut self,
        b: &Array1<T>,
        x: &mut Array1<T>,
        max_iterations: usize,
        zero_guess: bool,
        test: &dyn ConvergenceTest,
    ) -> Result<RichardsonOutcome> {
        self.ensure_setup()?;
        self.check_vectors(b, x)?;
        let r0 = self.initial_residual_norm(b, x, zero_guess)?;
        self.richardson_loop(b, x, r0, max_iterations, test)
    }

    /// Solve `A x = b` from the guess in `x` with the configured tolerances
    pub fn solve(&mut self, b: &Array1<T>, x: &mut Array1<T>) -> Result<RichardsonOutcome> {
        let tolerances = self.config.richardson;
        self.apply_richardson(b, x, &tolerances, false)
    }

    fn richardson_loop(
        &mut self,
        b: &Array1<T>,
        x: &mut Array1<T>,
        r0: f64,
        max_iterations: usize,
        test: &dyn ConvergenceTest,
    ) -> Result<RichardsonOutcome> {
        if self.config.mg_type != MgType::Multiplicative {
            return Err(MgError::RichardsonRequiresMultiplicative {
                found: self.config.mg_type.to_string(),
            });
        }

        // level smoothers run their fixed iteration counts
        for level in self.levels.iter_mut().skip(1) {
            level.smoothers.down_mut().set_rtol(None);
            if !level.smoothers.is_shared() {
                level.smoothers.up_mut().set_rtol(None);
            }
        }
        self.clear_apply_failures();

        let mut ctx = ConvergenceContext::new(r0);
        let active = test.is_active();
        let mut iterations = 0;
        while iterations < max_iterations {
            ctx.iteration = iterations;
            let check = if active {
                Some(EntryCheck { test, ctx: &mut ctx })
            } else {
                None
            };
            multiplicative_cycle(&mut self.levels, b, x, check)?;
            if ctx.reason.is_stopped() {
                break;
            }
            iterations += 1;
        }
        if !ctx.reason.is_stopped() {
            ctx.reason = ConvergedReason::ConvergedIterations;
        }

        self.refresh_failure();
        log::debug!(
            "richardson: {} cycles, {} (residual {:.6e} -> {:.6e})",
            iterations,
            ctx.reason,
            r0,
            ctx.last_norm()
        );
        Ok(RichardsonOutcome {
            iterations,
            reason: ctx.reason,
            residual_history: ctx.history,
            failure: self.failure.clone(),
        })
    }
}
