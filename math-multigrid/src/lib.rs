//! Geometric multigrid preconditioning
//!
//! This crate builds a hierarchy of grids, smooths on each and corrects with
//! coarse-grid solutions, either as a stand-alone preconditioner or as a
//! Richardson solver.
//!
//! # Features
//!
//! - **Cycles**: multiplicative V/W cycles, additive, full multigrid and Kaskade
//! - **Coarse Operators**: Galerkin products `R A P` with storage reuse, or
//!   rediscretization through a [`Discretization`]
//! - **Smoothers**: Chebyshev or Richardson relaxation over Jacobi or SSOR,
//!   direct and redundant LU on the coarsest level
//! - **Failure Handling**: subordinate-solver failures are flagged, never
//!   unwound through a cycle
//! - **Generic Scalar Types**: Works with f64, f32, Complex64, Complex32
//!
//! # Example
//!
//! ```
//! use math_multigrid::{Grid1d, MgConfig, Multigrid};
//! use ndarray::Array1;
//!
//! let grid = Grid1d::<f64>::dyadic(6).unwrap();
//! let mut mg = Multigrid::from_discretization(Box::new(grid), MgConfig::for_poisson()).unwrap();
//!
//! let b = Array1::from_elem(63, 1.0);
//! let mut x = Array1::zeros(63);
//! let outcome = mg.solve(&b, &mut x).unwrap();
//! assert!(outcome.is_success());
//! ```

pub mod coarse;
pub mod config;
pub mod convergence;
mod cycle;
pub mod diagnostics;
pub mod discretization;
pub mod error;
pub mod galerkin;
pub mod hierarchy;
pub mod level;
pub mod richardson;
pub mod smoother;
pub mod transfer;

// Re-export main types
pub use config::{
    CoarseSolverKind, CycleShape, MgConfig, MgType, RelaxationMethod, RelaxationPreconditioner,
    RichardsonTolerances, SmootherConfig,
};
pub use error::{FailurePhase, FailureReason, MgError, Result, SmootherError};
pub use hierarchy::{Lifecycle, Multigrid};
pub use level::{Level, LevelTimings, Operator, ResidualFn, SmootherPair, default_residual};

// Re-export building blocks
pub use coarse::{DirectSolver, RedundantSolver};
pub use convergence::{ConvergedReason, ConvergenceContext, ConvergenceTest, DefaultConvergenceTest};
pub use diagnostics::{LevelSummary, MgDiagnostics};
pub use discretization::{Discretization, Grid1d, TransferSet};
pub use galerkin::{galerkin_product, galerkin_product_reuse};
pub use richardson::RichardsonOutcome;
pub use smoother::{RelaxationSmoother, Smoother, default_smoother};
pub use transfer::{
    TransferPair, TransferSharing, full_weighting_1d, injection_1d, linear_interpolation_1d,
    restriction_scale,
};
