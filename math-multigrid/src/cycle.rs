//! Cycle engine
//!
//! All variants work on a level slice ordered coarsest first, so the entry
//! level of any (sub)cycle is the last element. The entry level's `b` and `x`
//! are passed in by reference; every coarser level uses its own work vectors,
//! which are moved out around recursive calls and put back afterwards.

use crate::config::MgType;
use crate::convergence::{ConvergenceContext, ConvergenceTest};
use crate::error::{MgError, Result};
use crate::level::Level;
use math_linalg::ComplexField;
use ndarray::Array1;

/// Convergence check performed at the entry level of a multiplicative cycle
pub(crate) struct EntryCheck<'a> {
    pub test: &'a dyn ConvergenceTest,
    pub ctx: &'a mut ConvergenceContext,
}

fn empty_hierarchy() -> MgError {
    MgError::InvalidLevelCount { levels: 0 }
}

/// One multiplicative cycle from the last level of `levels` down to level 0
///
/// Recursion multiplicity comes from the entry level's `cycles`, which is
/// always 1 on level 1.
pub(crate) fn multiplicative_cycle<T: ComplexField>(
    levels: &mut [Level<T>],
    b: &Array1<T>,
    x: &mut Array1<T>,
    check: Option<EntryCheck<'_>>,
) -> Result<()> {
    let (current, coarser) = levels.split_last_mut().ok_or_else(empty_hierarchy)?;

    current.smooth_down(b, x)?;
    if coarser.is_empty() {
        return Ok(());
    }

    current.compute_residual(b, x)?;

    if let Some(check) = check {
        let rnorm = current.residual_norm();
        let reason = check.test.test(check.ctx, check.ctx.iteration, rnorm);
        check.ctx.history.push(rnorm);
        if reason.is_stopped() {
            log::debug!(
                "level {}: stopping at residual norm {:.6e} ({})",
                current.level,
                rnorm,
                reason
            );
            check.ctx.reason = reason;
            return Ok(());
        }
    }

    let coarse = coarser.last_mut().ok_or_else(empty_hierarchy)?;
    let (mut cb, mut cx) = coarse.take_work()?;

    let mut result = current.restrict_residual(&mut cb);
    cx.fill(T::zero());

    for _ in 0..current.cycles {
        if result.is_err() {
            break;
        }
        result = multiplicative_cycle(coarser, &cb, &mut cx, None);
    }

    let result = result.and_then(|_| current.interpolate_add(&cx, x));
    if let Some(coarse) = coarser.last_mut() {
        coarse.restore_work(cb, cx);
    }
    result?;

    current.smooth_up(b, x)
}

/// `b_{i-1} ← R_i b_i` (then `∘ rscale`) for every level, finest first
fn restrict_rhs_down<T: ComplexField>(levels: &mut [Level<T>], b: &Array1<T>) -> Result<()> {
    let n = levels.len();
    for i in (1..n).rev() {
        let (lower, upper) = levels.split_at_mut(i);
        let fine = &mut upper[0];
        let coarse = &mut lower[i - 1];

        let mut cb = coarse.b.take().ok_or(MgError::MissingOperator { level: i - 1 })?;
        let result = if i == n - 1 {
            fine.restrict_vector(b, &mut cb)
        } else {
            match fine.b.take() {
                Some(fb) => {
                    let r = fine.restrict_vector(&fb, &mut cb);
                    fine.b = Some(fb);
                    r
                }
                None => Err(MgError::MissingOperator { level: i }),
            }
        };
        coarse.b = Some(cb);
        result?;
    }
    Ok(())
}

/// `x_i ← P_i x_{i-1}` (or `+=` when `add`), with level `n - 1` writing into `x`
fn prolong_into<T: ComplexField>(
    levels: &mut [Level<T>],
    i: usize,
    x: &mut Array1<T>,
    add: bool,
) -> Result<()> {
    let n = levels.len();
    let (lower, upper) = levels.split_at_mut(i);
    let fine = &mut upper[0];
    let cx = lower[i - 1]
        .x
        .as_ref()
        .ok_or(MgError::MissingOperator { level: i - 1 })?;

    let target_is_entry = i == n - 1;
    let mut fx = if target_is_entry {
        None
    } else {
        Some(fine.x.take().ok_or(MgError::MissingOperator { level: i })?)
    };
    let target = match fx.as_mut() {
        Some(fx) => fx,
        None => x,
    };
    let result = if add {
        fine.interpolate_add(cx, target)
    } else {
        fine.interpolate(cx, target)
    };
    if fx.is_some() {
        fine.x = fx;
    }
    result
}

/// Additive combination: independent smoothing on every level, summed upward
pub(crate) fn additive_cycle<T: ComplexField>(
    levels: &mut [Level<T>],
    b: &Array1<T>,
    x: &mut Array1<T>,
) -> Result<()> {
    let n = levels.len();
    if n == 0 {
        return Err(empty_hierarchy());
    }
    restrict_rhs_down(levels, b)?;

    for level in levels[..n - 1].iter_mut() {
        let (lb, mut lx) = level.take_work()?;
        lx.fill(T::zero());
        let result = level.smooth_down(&lb, &mut lx);
        level.restore_work(lb, lx);
        result?;
    }
    x.fill(T::zero());
    levels[n - 1].smooth_down(b, x)?;

    for i in 1..n {
        prolong_into(levels, i, x, true)?;
    }
    Ok(())
}

/// Full multigrid: nested iteration from the coarsest level up
pub(crate) fn full_cycle<T: ComplexField>(
    levels: &mut [Level<T>],
    b: &Array1<T>,
    x: &mut Array1<T>,
) -> Result<()> {
    let n = levels.len();
    if n == 0 {
        return Err(empty_hierarchy());
    }
    restrict_rhs_down(levels, b)?;

    if n > 1 {
        if let Some(x0) = levels[0].x.as_mut() {
            x0.fill(T::zero());
        }
    }
    for i in 0..n - 1 {
        let (lb, mut lx) = levels[i].take_work()?;
        let result = multiplicative_cycle(&mut levels[..=i], &lb, &mut lx, None);
        levels[i].restore_work(lb, lx);
        result?;
        prolong_into(levels, i + 1, x, false)?;
    }
    if n == 1 {
        x.fill(T::zero());
    }
    multiplicative_cycle(levels, b, x, None)
}

/// Kaskade: post-smoothing only, from the coarsest level up
pub(crate) fn kaskade_cycle<T: ComplexField>(
    levels: &mut [Level<T>],
    b: &Array1<T>,
    x: &mut Array1<T>,
) -> Result<()> {
    let n = levels.len();
    if n == 0 {
        return Err(empty_hierarchy());
    }
    restrict_rhs_down(levels, b)?;

    if n > 1 {
        if let Some(x0) = levels[0].x.as_mut() {
            x0.fill(T::zero());
        }
    } else {
        x.fill(T::zero());
    }
    for i in 0..n - 1 {
        let (lb, mut lx) = levels[i].take_work()?;
        let result = levels[i].smooth_up(&lb, &mut lx);
        levels[i].restore_work(lb, lx);
        result?;
        prolong_into(levels, i + 1, x, false)?;
    }
    levels[n - 1].smooth_up(b, x)
}

/// One preconditioner application of the configured type; `x` is overwritten
pub(crate) fn apply_cycle<T: ComplexField>(
    levels: &mut [Level<T>],
    mg_type: MgType,
    cycles_per_apply: usize,
    b: &Array1<T>,
    x: &mut Array1<T>,
) -> Result<()> {
    match mg_type {
        MgType::Multiplicative => {
            x.fill(T::zero());
            for _ in 0..cycles_per_apply.max(1) {
                multiplicative_cycle(levels, b, x, None)?;
            }
            Ok(())
        }
        MgType::Additive => additive_cycle(levels, b, x),
        MgType::Full => full_cycle(levels, b, x),
        MgType::Kaskade => kaskade_cycle(levels, b, x),
    }
}
