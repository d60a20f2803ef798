//! Linear algebra kernels for the multigrid engine
//!
//! # Features
//!
//! - **Sparse Matrices**: CSR format with matrix-vector products, transpose,
//!   sparse products and Galerkin triple products
//! - **Direct Solvers**: dense LU with partial pivoting and pivot shifting
//! - **Preconditioners**: Jacobi and SSOR, used inside relaxation smoothers
//! - **Generic Scalar Types**: Works with f64, f32, Complex64, Complex32
//!
//! # Example
//!
//! ```
//! use math_linalg::CsrMatrix;
//!
//! let a = CsrMatrix::<f64>::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 3.0)]);
//! let p = CsrMatrix::from_triplets(2, 1, vec![(0, 0, 1.0), (1, 0, 1.0)]);
//! let coarse = CsrMatrix::ptap(&a, &p);
//! assert_eq!(coarse.get(0, 0), 5.0);
//! ```

pub mod direct;
pub mod preconditioners;
pub mod sparse;
pub mod traits;
pub mod vector;

pub use sparse::{CsrBuilder, CsrMatrix, LeftFactor};
pub use traits::{ComplexField, Preconditioner};

pub use direct::{LuError, LuFactorization, PivotShift, lu_factorize, lu_factorize_csr, lu_solve};

pub use preconditioners::{DiagonalPreconditioner, IdentityPreconditioner, SsorPreconditioner};
