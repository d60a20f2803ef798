//! Direct solvers for linear systems
//!
//! - [`lu_factorize`]: dense LU with partial pivoting and optional pivot shifting,
//!   used as the coarsest-level solve of a multigrid hierarchy

mod lu;

pub use lu::{LuError, LuFactorization, PivotShift, lu_factorize, lu_factorize_csr, lu_solve};
