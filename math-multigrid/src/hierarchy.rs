//! Level hierarchy manager
//!
//! [`Multigrid`] owns the level array and drives its lifecycle:
//!
//! 1. `declare` / `from_discretization` create the levels with default smoothers
//! 2. setters register operators, transfers, smoothers and options
//! 3. [`Multigrid::setup`] materializes coarse operators, transfers and work
//!    vectors and sets up every smoother (it may run many times)
//! 4. [`Multigrid::apply`] runs one preconditioner application
//! 5. [`Multigrid::reset`] tears level data down again
//!
//! Any setter that changes what setup computes moves the hierarchy back to
//! [`Lifecycle::Declared`]; `apply` and the Richardson driver set up again on
//! demand.

use crate::config::{CycleShape, MgConfig, MgType};
use crate::cycle;
use crate::discretization::Discretization;
use crate::error::{FailurePhase, FailureReason, MgError, Result};
use crate::galerkin::{galerkin_product, galerkin_product_reuse};
use crate::level::{Level, LevelTimings, Operator, ResidualFn, SmootherPair};
use crate::smoother::{Smoother, default_smoother};
use crate::transfer::{self, TransferPair, TransferSharing};
use math_linalg::{ComplexField, CsrMatrix};
use ndarray::Array1;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle state of a hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Levels exist; operators and work vectors may be stale or missing
    Declared,
    /// `setup` completed and nothing changed since
    Materialized,
}

/// Multigrid preconditioner over a hierarchy of levels
pub struct Multigrid<T: ComplexField> {
    pub(crate) levels: Vec<Level<T>>,
    pub(crate) config: MgConfig,
    pub(crate) fine_operator: Option<Arc<CsrMatrix<T>>>,
    pub(crate) discretization: Option<Box<dyn Discretization<T>>>,
    pub(crate) state: Lifecycle,
    pub(crate) setup_calls: usize,
    pub(crate) failure: Option<FailureReason>,
}

/// Restriction weights must match the coarse dimension
fn check_rscale<T: ComplexField>(rscale: Option<&Array1<T>>, n_coarse: usize) -> Result<()> {
    match rscale {
        Some(s) if s.len() != n_coarse => Err(MgError::DimensionMismatch {
            what: "rscale",
            expected: n_coarse,
            got: s.len(),
        }),
        _ => Ok(()),
    }
}

fn build_levels<T: ComplexField>(n: usize, config: &MgConfig, cycles: usize) -> Vec<Level<T>> {
    (0..n)
        .map(|i| {
            let mut level = Level::new(i, n, default_smoother(i, n, config), cycles);
            if i > 0 && config.smooth_up != config.smooth_down {
                level.smoothers.split();
                level.smoothers.up_mut().set_iterations(config.smooth_up);
            }
            if config.log_levels {
                level.timings = Some(LevelTimings::default());
            }
            level
        })
        .collect()
}

/// Bind the transfer pair of a level from what the user or discretization supplied
fn bind_transfer<T: ComplexField>(level: &mut Level<T>) -> Result<()> {
    let pair = match (&level.restriction, &level.interpolation) {
        (Some(r), Some(p)) => TransferPair {
            restriction: r.clone(),
            interpolation: p.clone(),
            sharing: TransferSharing::Distinct,
        },
        (Some(m), None) | (None, Some(m)) => TransferPair {
            restriction: m.clone(),
            interpolation: m.clone(),
            sharing: TransferSharing::Shared,
        },
        (None, None) => return Err(MgError::MissingTransfer { level: level.level }),
    };
    level.transfer = Some(pair);
    Ok(())
}

/// Coarse size implied by a transfer pair for a fine level of `fine` unknowns
fn coarse_dim<T: ComplexField>(pair: &TransferPair<T>, level: usize, fine: usize) -> Result<usize> {
    let p = &pair.interpolation;
    if p.num_rows == fine {
        Ok(p.num_cols)
    } else if p.num_cols == fine {
        Ok(p.num_rows)
    } else {
        Err(MgError::TransferShape {
            level,
            rows: p.num_rows,
            cols: p.num_cols,
            fine,
            coarse: 0,
        })
    }
}

impl<T: ComplexField> Multigrid<T> {
    /// Hierarchy of `levels` levels with default smoothers
    pub fn declare(levels: usize, config: MgConfig) -> Result<Self> {
        if levels == 0 {
            return Err(MgError::InvalidLevelCount { levels });
        }
        let cycles = config.cycle.multiplicity();
        Ok(Self {
            levels: build_levels(levels, &config, cycles),
            config,
            fine_operator: None,
            discretization: None,
            state: Lifecycle::Declared,
            setup_calls: 0,
            failure: None,
        })
    }

    /// Hierarchy driven by a discretization
    ///
    /// One level per available coarsening plus the fine grid. Transfers and,
    /// without Galerkin, coarse operators come from the discretization.
    pub fn from_discretization(dm: Box<dyn Discretization<T>>, config: MgConfig) -> Result<Self> {
        let levels = dm.refine_level() + 1;
        let mut mg = Self::declare(levels, config)?;
        mg.discretization = Some(dm);
        Ok(mg)
    }

    /// Number of levels
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Current configuration
    pub fn config(&self) -> &MgConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// True after a successful `setup` with no change since
    pub fn is_set_up(&self) -> bool {
        self.state == Lifecycle::Materialized
    }

    /// Number of completed setups since creation or the last reset
    pub fn setup_count(&self) -> usize {
        self.setup_calls
    }

    /// Hierarchy type
    pub fn mg_type(&self) -> MgType {
        self.config.mg_type
    }

    /// Level `level`, 0 = coarsest
    pub fn level(&self, level: usize) -> Result<&Level<T>> {
        let levels = self.levels.len();
        self.levels.get(level).ok_or(MgError::LevelOutOfRange { level, levels })
    }

    /// All levels, coarsest first
    pub fn levels(&self) -> &[Level<T>] {
        &self.levels
    }

    /// Operator bound to `level`, if set up
    pub fn operator(&self, level: usize) -> Option<&CsrMatrix<T>> {
        self.levels.get(level).and_then(|l| l.operator())
    }

    /// Attached discretization
    pub fn discretization(&self) -> Option<&dyn Discretization<T>> {
        self.discretization.as_deref()
    }

    /// First subordinate-solver failure since the last setup
    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    fn level_mut(&mut self, level: usize) -> Result<&mut Level<T>> {
        let levels = self.levels.len();
        self.levels
            .get_mut(level)
            .ok_or(MgError::LevelOutOfRange { level, levels })
    }

    fn transfer_level_mut(&mut self, level: usize) -> Result<&mut Level<T>> {
        if level == 0 {
            return Err(MgError::TransferOnCoarsest);
        }
        self.level_mut(level)
    }

    fn invalidate(&mut self) {
        self.state = Lifecycle::Declared;
    }

    /// Change the number of levels
    ///
    /// A different count releases everything and rebuilds the levels with
    /// default smoothers, keeping the coarsest level's cycle shape. The
    /// current count is a no-op before setup and an error after it.
    pub fn set_levels(&mut self, levels: usize) -> Result<()> {
        if levels == 0 {
            return Err(MgError::InvalidLevelCount { levels });
        }
        if levels == self.levels.len() {
            if self.is_set_up() {
                return Err(MgError::LevelsAlreadySetUp { levels });
            }
            return Ok(());
        }
        let cycles = self
            .levels
            .first()
            .map_or(self.config.cycle.multiplicity(), |l| l.cycles);
        self.reset();
        self.levels = build_levels(levels, &self.config, cycles);
        log::debug!("multigrid rebuilt with {} levels", levels);
        Ok(())
    }

    /// Change how levels are combined
    pub fn set_type(&mut self, mg_type: MgType) {
        self.config.mg_type = mg_type;
    }

    /// Cycle shape on every level
    pub fn set_cycle_type(&mut self, shape: CycleShape) {
        self.config.cycle = shape;
        for level in &mut self.levels {
            level.set_cycles(shape.multiplicity());
        }
    }

    /// Cycle shape on one level
    pub fn set_cycle_type_on_level(&mut self, level: usize, shape: CycleShape) -> Result<()> {
        self.level_mut(level)?.set_cycles(shape.multiplicity());
        Ok(())
    }

    /// Build coarse operators as Galerkin products
    pub fn set_galerkin(&mut self, galerkin: bool) {
        if self.config.galerkin != galerkin {
            self.config.galerkin = galerkin;
            self.invalidate();
        }
    }

    /// Multiplicative cycles per application
    pub fn set_cycles_per_apply(&mut self, cycles: usize) {
        self.config.cycles_per_apply = cycles.max(1);
    }

    /// Collect per-level timings from now on
    pub fn set_log_levels(&mut self, enabled: bool) {
        self.config.log_levels = enabled;
        for level in &mut self.levels {
            match (enabled, level.timings.is_some()) {
                (true, false) => level.timings = Some(LevelTimings::default()),
                (false, true) => level.timings = None,
                _ => {}
            }
        }
    }

    /// Operator of the finest level
    pub fn set_operator(&mut self, a: impl Into<Arc<CsrMatrix<T>>>) {
        self.fine_operator = Some(a.into());
        self.invalidate();
    }

    /// Operator for one level, used when Galerkin products are off
    pub fn set_level_operator(&mut self, level: usize, a: impl Into<Arc<CsrMatrix<T>>>) -> Result<()> {
        self.level_mut(level)?.user_operator = Some(a.into());
        self.invalidate();
        Ok(())
    }

    /// Interpolation from `level - 1` to `level`
    pub fn set_interpolation(&mut self, level: usize, p: impl Into<Arc<CsrMatrix<T>>>) -> Result<()> {
        let l = self.transfer_level_mut(level)?;
        l.interpolation = Some(p.into());
        l.transfer = None;
        self.invalidate();
        Ok(())
    }

    /// Restriction from `level` to `level - 1`
    pub fn set_restriction(&mut self, level: usize, r: impl Into<Arc<CsrMatrix<T>>>) -> Result<()> {
        let l = self.transfer_level_mut(level)?;
        l.restriction = Some(r.into());
        l.transfer = None;
        self.invalidate();
        Ok(())
    }

    /// One matrix used for both directions between `level` and `level - 1`
    pub fn set_transfer(&mut self, level: usize, m: impl Into<Arc<CsrMatrix<T>>>) -> Result<()> {
        let l = self.transfer_level_mut(level)?;
        l.interpolation = Some(m.into());
        l.restriction = None;
        l.transfer = None;
        self.invalidate();
        Ok(())
    }

    /// Weights applied after restricting from `level`
    pub fn set_rscale(&mut self, level: usize, rscale: Array1<T>) -> Result<()> {
        self.transfer_level_mut(level)?.rscale = Some(rscale);
        self.invalidate();
        Ok(())
    }

    /// Replace the residual evaluation of one level
    pub fn set_residual(&mut self, level: usize, residual: ResidualFn<T>) -> Result<()> {
        self.level_mut(level)?.residual = residual;
        Ok(())
    }

    /// Attach a discretization that supplies missing transfers and operators
    pub fn set_discretization(&mut self, dm: Box<dyn Discretization<T>>) {
        self.discretization = Some(dm);
        self.invalidate();
    }

    /// One smoother for both directions on `level`
    pub fn set_smoother(&mut self, level: usize, smoother: Box<dyn Smoother<T>>) -> Result<()> {
        self.level_mut(level)?.smoothers = SmootherPair::Shared(smoother);
        self.invalidate();
        Ok(())
    }

    /// Replace the pre-smoother of `level`; a shared post-smoother stays in place
    pub fn set_smoother_down(&mut self, level: usize, smoother: Box<dyn Smoother<T>>) -> Result<()> {
        self.level_mut(level)?.smoothers.replace_down(smoother);
        self.invalidate();
        Ok(())
    }

    /// Replace the post-smoother of `level`; a shared pre-smoother stays in place
    pub fn set_smoother_up(&mut self, level: usize, smoother: Box<dyn Smoother<T>>) -> Result<()> {
        self.level_mut(level)?.smoothers.replace_up(smoother);
        self.invalidate();
        Ok(())
    }

    /// Pre-smoother (or shared smoother) of `level`
    pub fn smoother(&self, level: usize) -> Result<&dyn Smoother<T>> {
        Ok(self.level(level)?.smoothers.down())
    }

    /// Post-smoother of `level`
    pub fn smoother_up(&self, level: usize) -> Result<&dyn Smoother<T>> {
        Ok(self.level(level)?.smoothers.up())
    }

    /// Mutable pre-smoother (or shared smoother) of `level`
    pub fn smoother_mut(&mut self, level: usize) -> Result<&mut dyn Smoother<T>> {
        self.invalidate();
        Ok(self.level_mut(level)?.smoothers.down_mut())
    }

    /// Mutable post-smoother of `level`
    ///
    /// Above the coarsest level this gives the post-smoother its own copy
    /// first, so configuring it leaves the pre-smoother untouched.
    pub fn smoother_up_mut(&mut self, level: usize) -> Result<&mut dyn Smoother<T>> {
        self.invalidate();
        let l = self.level_mut(level)?;
        if level > 0 {
            l.smoothers.split();
        }
        Ok(l.smoothers.up_mut())
    }

    /// Pre-smoothing iterations on every level above the coarsest
    pub fn set_num_smooth_down(&mut self, iterations: usize) {
        self.config.smooth_down = iterations;
        for level in self.levels.iter_mut().skip(1) {
            level.smoothers.down_mut().set_iterations(iterations);
        }
    }

    /// Post-smoothing iterations on every level above the coarsest
    ///
    /// A shared pair with a different count is split.
    pub fn set_num_smooth_up(&mut self, iterations: usize) {
        self.config.smooth_up = iterations;
        for level in self.levels.iter_mut().skip(1) {
            if level.smoothers.is_shared() {
                if level.smoothers.down().iterations() == iterations {
                    continue;
                }
                level.smoothers.split();
            }
            level.smoothers.up_mut().set_iterations(iterations);
        }
    }

    /// Materialize operators, transfers and work vectors; set up smoothers
    pub fn setup(&mut self) -> Result<()> {
        let start = Instant::now();
        let n = self.levels.len();
        self.failure = None;
        for level in &mut self.levels {
            level.failure = None;
        }

        self.bind_fine_operator()?;

        let missing = self.levels[1..]
            .iter()
            .any(|l| l.restriction.is_none() && l.interpolation.is_none());
        if missing && self.setup_calls == 0 {
            self.transfers_from_discretization()?;
        }

        for i in (1..n).rev() {
            bind_transfer(&mut self.levels[i])?;
            self.bind_coarse_operator(i)?;
        }

        if !self.config.galerkin {
            self.propagate_location();
        }

        for level in &mut self.levels {
            level.ensure_work_vectors()?;
        }

        for i in (1..n).chain(std::iter::once(0)) {
            self.levels[i].setup_smoothers()?;
        }
        self.refresh_failure();

        self.state = Lifecycle::Materialized;
        self.setup_calls += 1;
        log::info!(
            "multigrid setup #{}: {} levels, {} fine unknowns, {} coarse unknowns, galerkin={} ({:.3?})",
            self.setup_calls,
            n,
            self.levels[n - 1].num_dofs(),
            self.levels[0].num_dofs(),
            self.config.galerkin,
            start.elapsed()
        );
        if let Some(failure) = &self.failure {
            log::warn!("multigrid setup finished with a failure: {}", failure);
        }
        Ok(())
    }

    fn bind_fine_operator(&mut self) -> Result<()> {
        let n = self.levels.len();
        let fine = &mut self.levels[n - 1];
        if let Some(a) = self.fine_operator.clone().or_else(|| fine.user_operator.clone()) {
            fine.operator = Some(Operator::Shared(a));
        } else if let Some(a) = self.discretization.as_ref().and_then(|dm| dm.compute_operator()) {
            fine.operator = Some(Operator::Owned(a));
        } else if fine.operator.is_none() {
            return Err(MgError::MissingOperator { level: n - 1 });
        }
        Ok(())
    }

    /// Coarsen the attached discretization once per level and fill in every
    /// transfer the user did not supply
    fn transfers_from_discretization(&mut self) -> Result<()> {
        let n = self.levels.len();
        let Some(dm) = self.discretization.as_deref() else {
            return Ok(());
        };

        let mut chain: Vec<Box<dyn Discretization<T>>> = Vec::with_capacity(n - 1);
        let mut sets = Vec::with_capacity(n - 1);
        for k in 0..n - 1 {
            let finer: &dyn Discretization<T> = if k == 0 { dm } else { chain[k - 1].as_ref() };
            let coarse = finer.coarsen()?;
            sets.push(finer.create_transfer(coarse.as_ref())?);
            chain.push(coarse);
        }

        for (k, (set, coarse)) in sets.into_iter().zip(chain).enumerate() {
            let i = n - 1 - k;
            let level = &mut self.levels[i];
            if level.restriction.is_none() && level.interpolation.is_none() {
                level.interpolation = Some(Arc::new(set.interpolation));
                level.restriction = set.restriction.map(Arc::new);
                if level.rscale.is_none() {
                    level.rscale = set.rscale;
                }
            }
            log::debug!("level {}: coarse grid {}", i - 1, coarse.describe());
            self.levels[i - 1].discretization = Some(coarse);
        }
        Ok(())
    }

    /// Bind the operator of level `i - 1` and validate the transfers of level `i`
    fn bind_coarse_operator(&mut self, i: usize) -> Result<()> {
        let galerkin = self.config.galerkin;
        let (lower, upper) = self.levels.split_at_mut(i);
        let fine = &upper[0];
        let coarse = &mut lower[i - 1];
        let a = fine.operator_ref()?;
        let pair = fine.transfer.as_ref().ok_or(MgError::MissingTransfer { level: i })?;
        let nf = a.num_rows;

        if galerkin {
            let nc = coarse_dim(pair, i, nf)?;
            pair.validate(i, nf, nc)?;
            check_rscale(fine.rscale.as_ref(), nc)?;
            let rscale = fine.rscale.as_ref();
            let reusable = matches!(
                &coarse.operator,
                Some(Operator::Owned(m)) if m.num_rows == nc && m.num_cols == nc
            );
            match coarse.operator.as_mut() {
                Some(Operator::Owned(existing)) if reusable => {
                    let reused = galerkin_product_reuse(a, pair, rscale, existing);
                    log::debug!("level {}: galerkin product recomputed (storage reused: {})", i - 1, reused);
                }
                _ => {
                    let ac = galerkin_product(a, pair, rscale, nc);
                    coarse.operator = Some(Operator::Owned(ac));
                }
            }
        } else {
            if let Some(user) = coarse.user_operator.clone() {
                coarse.operator = Some(Operator::Shared(user));
            } else if let Some(op) = coarse.discretization.as_ref().and_then(|d| d.compute_operator()) {
                coarse.operator = Some(Operator::Owned(op));
            } else if coarse.operator.is_none() {
                return Err(MgError::MissingOperator { level: i - 1 });
            }
            pair.validate(i, nf, coarse.num_dofs())?;
            check_rscale(fine.rscale.as_ref(), coarse.num_dofs())?;
        }
        Ok(())
    }

    /// Carry the discretization's location vector down the hierarchy and
    /// notify every coarse discretization
    fn propagate_location(&mut self) {
        let n = self.levels.len();
        let Some(top) = self.discretization.as_deref() else {
            return;
        };
        let mut location = top.location().cloned();

        for i in (1..n).rev() {
            let (lower, upper) = self.levels.split_at_mut(i);
            let fine = &upper[0];
            let coarse = &mut lower[i - 1];
            let fine_dm = if i == n - 1 { Some(top) } else { fine.discretization.as_deref() };
            let (Some(fine_dm), Some(coarse_dm), Some(pair)) =
                (fine_dm, coarse.discretization.as_mut(), fine.transfer.as_ref())
            else {
                location = None;
                continue;
            };

            location = location.map(|loc| {
                let mut restricted = Array1::from_elem(coarse_dm.num_dofs(), T::zero());
                transfer::restrict(&pair.restriction, &loc, &mut restricted, fine.rscale.as_ref());
                coarse_dm.set_location(restricted.clone());
                restricted
            });
            coarse_dm.on_restrict(fine_dm, &pair.restriction, fine.rscale.as_ref());
        }
    }

    pub(crate) fn refresh_failure(&mut self) {
        if self.failure.is_some() {
            return;
        }
        let n = self.levels.len();
        self.failure = (1..n)
            .chain(std::iter::once(0))
            .find_map(|i| self.levels[i].failure.clone());
    }

    pub(crate) fn ensure_setup(&mut self) -> Result<()> {
        if self.state != Lifecycle::Materialized {
            self.setup()?;
        }
        Ok(())
    }

    pub(crate) fn check_vectors(&self, b: &Array1<T>, x: &Array1<T>) -> Result<()> {
        let n = self.levels[self.levels.len() - 1].num_dofs();
        for (what, len) in [("right-hand side", b.len()), ("solution", x.len())] {
            if len != n {
                return Err(MgError::DimensionMismatch { what, expected: n, got: len });
            }
        }
        Ok(())
    }

    pub(crate) fn clear_apply_failures(&mut self) {
        for level in &mut self.levels {
            level.clear_apply_failure();
        }
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

    /// One preconditioner application `x ← M⁻¹ b`
    ///
    /// Sets the hierarchy up first when needed. `x` is overwritten. A
    /// subordinate-solver failure does not stop the cycle; it is returned
    /// (and kept in [`Multigrid::failure`]).
    pub fn apply(&mut self, b: &Array1<T>, x: &mut Array1<T>) -> Result<Option<FailureReason>> {
        self.ensure_setup()?;
        self.check_vectors(b, x)?;
        self.clear_apply_failures();

        cycle::apply_cycle(
            &mut self.levels,
            self.config.mg_type,
            self.config.cycles_per_apply,
            b,
            x,
        )?;

        self.refresh_failure();
        Ok(self.failure.clone())
    }

    /// Release level operators, transfers, work vectors and coarse
    /// discretizations; smoother configuration is kept
    pub fn reset(&mut self) {
        for level in &mut self.levels {
            level.reset();
        }
        self.state = Lifecycle::Declared;
        self.setup_calls = 0;
        self.failure = None;
    }
}
