//! Point preconditioners used inside relaxation smoothers
//!
//! - **DiagonalPreconditioner** (Jacobi): diagonal scaling, fully parallel
//! - **SsorPreconditioner**: one symmetric successive over-relaxation sweep

mod diagonal;
mod sor;

pub use diagonal::DiagonalPreconditioner;
pub use sor::SsorPreconditioner;

pub use crate::traits::IdentityPreconditioner;
