//! Level smoothers
//!
//! A [`Smoother`] approximately solves `A x = b` on one level, updating `x` in
//! place. The hierarchy owns one smoother pair per level; the cycle engine only
//! calls [`Smoother::solve`] and never inspects the concrete type.
//!
//! [`RelaxationSmoother`] covers the usual choices: damped Richardson or
//! Chebyshev, each over a Jacobi or SSOR point preconditioner.

use crate::coarse::{DirectSolver, RedundantSolver};
use crate::config::{CoarseSolverKind, MgConfig, RelaxationMethod, RelaxationPreconditioner, SmootherConfig};
use crate::error::SmootherError;
use math_linalg::vector::{axpy, scale_inplace, vector_norm_f64};
use math_linalg::{
    ComplexField, CsrMatrix, DiagonalPreconditioner, IdentityPreconditioner, Preconditioner, SsorPreconditioner,
};
use ndarray::Array1;
use num_traits::Float;

/// Approximate solver for one level.
pub trait Smoother<T: ComplexField>: Send {
    /// Prepare for solves with `a` (factorizations, eigenvalue estimates).
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), SmootherError>;

    /// Improve `x` towards the solution of `a x = b`.
    fn solve(&mut self, a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>) -> Result<(), SmootherError>;

    /// Iteration count per solve.
    fn iterations(&self) -> usize;

    /// Set the iteration count per solve.
    fn set_iterations(&mut self, iterations: usize);

    /// Relative tolerance; `None` runs exactly [`Smoother::iterations`] steps.
    fn rtol(&self) -> Option<f64> {
        None
    }

    /// Set or clear the relative tolerance.
    fn set_rtol(&mut self, _rtol: Option<f64>) {}

    /// Fresh smoother with the same settings, not yet set up.
    fn duplicate(&self) -> Box<dyn Smoother<T>>;

    /// One-line description for diagnostics.
    fn describe(&self) -> String;
}

/// Preconditioned Richardson or Chebyshev relaxation.
pub struct RelaxationSmoother<T: ComplexField> {
    config: SmootherConfig,
    iterations: usize,
    rtol: Option<f64>,
    preconditioner: Option<Box<dyn Preconditioner<T>>>,
    /// Chebyshev interval `[emin, emax]` of `M⁻¹ A`
    eig_bounds: Option<(f64, f64)>,
}

impl<T: ComplexField> RelaxationSmoother<T> {
    /// Create a smoother that runs `iterations` steps per solve
    pub fn new(config: SmootherConfig, iterations: usize) -> Self {
        Self {
            config,
            iterations,
            rtol: None,
            preconditioner: None,
            eig_bounds: None,
        }
    }

    /// Damped Jacobi
    pub fn jacobi(iterations: usize) -> Self {
        Self::new(SmootherConfig::jacobi(), iterations)
    }

    /// Symmetric Gauss-Seidel
    pub fn symmetric_gauss_seidel(iterations: usize) -> Self {
        Self::new(SmootherConfig::symmetric_gauss_seidel(), iterations)
    }

    /// Chebyshev interval estimated at setup
    pub fn eig_bounds(&self) -> Option<(f64, f64)> {
        self.eig_bounds
    }

    fn precondition(&self, r: &Array1<T>) -> Result<Array1<T>, SmootherError> {
        self.preconditioner
            .as_ref()
            .map(|m| m.apply(r))
            .ok_or(SmootherError::NotSetUp)
    }

    /// Power iteration on `M⁻¹ A` from a fixed start vector
    fn estimate_max_eigenvalue(&self, a: &CsrMatrix<T>) -> Result<f64, SmootherError> {
        let n = a.num_rows;
        let mut v: Array1<T> =
            Array1::from_iter((0..n).map(|i| T::from_real_f64(1.0 + 0.1 * (i % 7) as f64)));
        let mut lambda = 0.0;

        for _ in 0..self.config.eig_iterations.max(1) {
            let norm = vector_norm_f64(&v);
            if !(norm > 0.0) || !norm.is_finite() {
                break;
            }
            scale_inplace(T::from_real_f64(1.0 / norm), &mut v);
            let w = self.precondition(&a.matvec(&v))?;
            lambda = vector_norm_f64(&w);
            v = w;
        }

        if lambda.is_finite() && lambda > 0.0 {
            Ok(lambda)
        } else {
            Err(SmootherError::SetupFailed {
                reason: format!("eigenvalue estimate failed ({lambda})"),
            })
        }
    }

    fn solve_richardson(
        &self,
        a: &CsrMatrix<T>,
        b: &Array1<T>,
        x: &mut Array1<T>,
    ) -> Result<usize, SmootherError> {
        let damping = T::from_real_f64(self.config.damping);
        let mut r = Array1::from_elem(b.len(), T::zero());
        let mut r0 = None;

        for k in 0..self.iterations {
            a.residual_into(b, x, &mut r);
            if self.converged(&r, &mut r0) {
                return Ok(k);
            }
            let z = self.precondition(&r)?;
            axpy(damping, &z, x);
        }
        Ok(self.iterations)
    }

    fn solve_chebyshev(
        &self,
        a: &CsrMatrix<T>,
        b: &Array1<T>,
        x: &mut Array1<T>,
    ) -> Result<usize, SmootherError> {
        if self.iterations == 0 {
            return Ok(0);
        }
        let (emin, emax) = self.eig_bounds.ok_or(SmootherError::NotSetUp)?;
        let theta = 0.5 * (emax + emin);
        let delta = 0.5 * (emax - emin);
        let sigma = theta / delta;
        let mut rho = 1.0 / sigma;

        let mut r = Array1::from_elem(b.len(), T::zero());
        a.residual_into(b, x, &mut r);
        let mut r0 = None;
        if self.converged(&r, &mut r0) {
            return Ok(0);
        }
        let mut d = self.precondition(&r)?;
        d.mapv_inplace(|v| v * T::from_real_f64(1.0 / theta));

        for k in 0..self.iterations {
            axpy(T::one(), &d, x);
            if k + 1 == self.iterations {
                break;
            }
            let ad = a.matvec(&d);
            axpy(-T::one(), &ad, &mut r);
            if self.converged(&r, &mut r0) {
                return Ok(k + 1);
            }
            let z = self.precondition(&r)?;
            let rho_next = 1.0 / (2.0 * sigma - rho);
            let c_d = T::from_real_f64(rho_next * rho);
            let c_z = T::from_real_f64(2.0 * rho_next / delta);
            d.zip_mut_with(&z, |di, &zi| *di = c_d * *di + c_z * zi);
            rho = rho_next;
        }
        Ok(self.iterations)
    }

    /// Relative residual test, records the first norm seen
    fn converged(&self, r: &Array1<T>, r0: &mut Option<f64>) -> bool {
        let Some(rtol) = self.rtol else {
            return false;
        };
        let norm = vector_norm_f64(r);
        match *r0 {
            None => {
                *r0 = Some(norm);
                norm == 0.0
            }
            Some(initial) => norm <= rtol * initial,
        }
    }
}

impl<T: ComplexField> Smoother<T> for RelaxationSmoother<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), SmootherError> {
        self.preconditioner = None;
        self.eig_bounds = None;

        let preconditioner: Box<dyn Preconditioner<T>> = match self.config.preconditioner {
            RelaxationPreconditioner::None => Box::new(IdentityPreconditioner),
            RelaxationPreconditioner::Jacobi => Box::new(
                DiagonalPreconditioner::try_from_csr(a)
                    .map_err(|row| SmootherError::ZeroDiagonal { row })?,
            ),
            RelaxationPreconditioner::Ssor => Box::new(
                SsorPreconditioner::try_from_csr(a, self.config.sor_omega)
                    .map_err(|row| SmootherError::ZeroDiagonal { row })?,
            ),
        };
        self.preconditioner = Some(preconditioner);

        if self.config.method == RelaxationMethod::Chebyshev {
            let emax = self.estimate_max_eigenvalue(a)?;
            let (lo, hi) = self.config.eig_fractions;
            self.eig_bounds = Some((lo * emax, hi * emax));
            log::debug!(
                "Chebyshev bounds [{:.4e}, {:.4e}] on {} unknowns",
                lo * emax,
                hi * emax,
                a.num_rows
            );
        }
        Ok(())
    }

    fn solve(&mut self, a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>) -> Result<(), SmootherError> {
        let performed = match self.config.method {
            RelaxationMethod::Richardson => self.solve_richardson(a, b, x)?,
            RelaxationMethod::Chebyshev => self.solve_chebyshev(a, b, x)?,
        };
        if x.iter().any(|v| !v.norm().is_finite()) {
            return Err(SmootherError::NonFinite { iterations: performed });
        }
        Ok(())
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    fn rtol(&self) -> Option<f64> {
        self.rtol
    }

    fn set_rtol(&mut self, rtol: Option<f64>) {
        self.rtol = rtol;
    }

    fn duplicate(&self) -> Box<dyn Smoother<T>> {
        let mut copy = RelaxationSmoother::new(self.config.clone(), self.iterations);
        copy.rtol = self.rtol;
        Box::new(copy)
    }

    fn describe(&self) -> String {
        let method = match self.config.method {
            RelaxationMethod::Richardson => format!("richardson(damping={})", self.config.damping),
            RelaxationMethod::Chebyshev => {
                let (lo, hi) = self.config.eig_fractions;
                format!("chebyshev(eig fractions {lo}, {hi})")
            }
        };
        let pc = match self.config.preconditioner {
            RelaxationPreconditioner::None => "none".to_string(),
            RelaxationPreconditioner::Jacobi => "jacobi".to_string(),
            RelaxationPreconditioner::Ssor => format!("ssor(omega={})", self.config.sor_omega),
        };
        let stop = match self.rtol {
            Some(rtol) => format!("rtol={rtol:e}"),
            None => "fixed".to_string(),
        };
        format!("{method} + {pc}, {} its, {stop}", self.iterations)
    }
}

/// Default smoother for `level` of a `levels`-level hierarchy.
///
/// Levels above the coarsest get the configured relaxation with
/// `smooth_down` iterations. The coarsest level of a multi-level hierarchy
/// gets a direct solve, replicated when more than one rank shares it. A
/// one-level hierarchy relaxes once.
pub fn default_smoother<T: ComplexField>(
    level: usize,
    levels: usize,
    config: &MgConfig,
) -> Box<dyn Smoother<T>> {
    if level > 0 {
        return Box::new(RelaxationSmoother::new(config.smoother.clone(), config.smooth_down));
    }
    if levels == 1 {
        return Box::new(RelaxationSmoother::new(config.smoother.clone(), 1));
    }
    match config.coarse {
        CoarseSolverKind::Auto if config.ranks > 1 => Box::new(RedundantSolver::new(config.ranks)),
        CoarseSolverKind::Auto | CoarseSolverKind::Lu => Box::new(DirectSolver::new()),
        CoarseSolverKind::Redundant => Box::new(RedundantSolver::new(config.ranks.max(1))),
        CoarseSolverKind::Relaxation => {
            Box::new(RelaxationSmoother::new(config.smoother.clone(), config.smooth_down))
        }
    }
}
