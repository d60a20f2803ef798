//! Sparse matrix structures (CSR format)
//!
//! Level operators, transfer operators and Galerkin products are all stored
//! in Compressed Sparse Row format.

mod csr;

pub use csr::{CsrBuilder, CsrMatrix, LeftFactor};
