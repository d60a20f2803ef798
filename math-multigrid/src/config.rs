//! Multigrid configuration
//!
//! Every field has a default, so a JSON file only needs to list what it
//! changes:
//!
//! ```json
//! { "mg_type": "full", "cycle": "w", "smoother": { "method": "richardson", "preconditioner": "jacobi" } }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How the levels are combined in one preconditioner application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MgType {
    /// Recursive V/W cycle
    #[default]
    Multiplicative,
    /// Independent smoothing of every level, corrections summed
    Additive,
    /// Nested iteration: V/W cycles on growing prefixes of the hierarchy
    Full,
    /// Coarse-to-fine smoothing only, no coarse-grid correction
    Kaskade,
}

impl fmt::Display for MgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MgType::Multiplicative => "multiplicative",
            MgType::Additive => "additive",
            MgType::Full => "full",
            MgType::Kaskade => "kaskade",
        };
        f.write_str(name)
    }
}

/// Recursion multiplicity of the multiplicative cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleShape {
    /// One coarse visit per level
    #[default]
    V,
    /// Two coarse visits per level
    W,
}

impl CycleShape {
    /// Number of recursive calls made from a level
    pub fn multiplicity(self) -> usize {
        match self {
            CycleShape::V => 1,
            CycleShape::W => 2,
        }
    }

    /// Inverse of [`CycleShape::multiplicity`]
    pub fn from_multiplicity(cycles: usize) -> Self {
        if cycles >= 2 { CycleShape::W } else { CycleShape::V }
    }
}

impl fmt::Display for CycleShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleShape::V => "v",
            CycleShape::W => "w",
        })
    }
}

/// Outer iteration of a relaxation smoother
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaxationMethod {
    /// Damped preconditioned Richardson: `x += ω M⁻¹ (b - A x)`
    Richardson,
    /// Chebyshev acceleration over an estimated spectrum of `M⁻¹ A`
    #[default]
    Chebyshev,
}

/// Point preconditioner inside a relaxation smoother
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelaxationPreconditioner {
    /// No preconditioning
    None,
    /// Diagonal scaling
    Jacobi,
    /// Symmetric SOR sweep
    #[default]
    Ssor,
}

/// Settings for the level smoothers on levels above the coarsest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Outer iteration
    pub method: RelaxationMethod,
    /// Point preconditioner
    pub preconditioner: RelaxationPreconditioner,
    /// Richardson damping factor
    pub damping: f64,
    /// SSOR relaxation factor
    pub sor_omega: f64,
    /// Chebyshev lower/upper eigenvalue bounds as fractions of the estimated maximum
    pub eig_fractions: (f64, f64),
    /// Power iterations used to estimate the maximum eigenvalue
    pub eig_iterations: usize,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            method: RelaxationMethod::Chebyshev,
            preconditioner: RelaxationPreconditioner::Ssor,
            damping: 1.0,
            sor_omega: 1.0,
            eig_fractions: (0.1, 1.1),
            eig_iterations: 10,
        }
    }
}

impl SmootherConfig {
    /// Damped Jacobi, `ω = 2/3` (optimal for the Laplacian)
    pub fn jacobi() -> Self {
        Self {
            method: RelaxationMethod::Richardson,
            preconditioner: RelaxationPreconditioner::Jacobi,
            damping: 2.0 / 3.0,
            ..Default::default()
        }
    }

    /// Symmetric Gauss-Seidel
    pub fn symmetric_gauss_seidel() -> Self {
        Self {
            method: RelaxationMethod::Richardson,
            preconditioner: RelaxationPreconditioner::Ssor,
            damping: 1.0,
            ..Default::default()
        }
    }
}

/// Strategy for the coarsest-level solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoarseSolverKind {
    /// LU on a single rank, replicated LU otherwise
    #[default]
    Auto,
    /// Serial LU
    Lu,
    /// LU replicated on every rank group
    Redundant,
    /// The level smoother with a fixed iteration count
    Relaxation,
}

/// Tolerances of the Richardson outer iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichardsonTolerances {
    /// Relative decrease of the residual norm (0 disables)
    pub rtol: f64,
    /// Absolute residual norm (0 disables)
    pub atol: f64,
    /// Divergence factor relative to the initial residual norm
    pub dtol: f64,
    /// Maximum number of cycles
    pub max_iterations: usize,
}

impl Default for RichardsonTolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-50,
            dtol: 1e5,
            max_iterations: 10_000,
        }
    }
}

impl RichardsonTolerances {
    /// Run exactly `max_iterations` cycles, no convergence test
    pub fn fixed(max_iterations: usize) -> Self {
        Self {
            rtol: 0.0,
            atol: 0.0,
            dtol: f64::INFINITY,
            max_iterations,
        }
    }
}

/// Multigrid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MgConfig {
    /// Level combination
    pub mg_type: MgType,
    /// Default cycle shape on every level
    pub cycle: CycleShape,
    /// Pre-smoothing iterations on levels above the coarsest
    pub smooth_down: usize,
    /// Post-smoothing iterations on levels above the coarsest
    pub smooth_up: usize,
    /// Build coarse operators as `R A P`
    pub galerkin: bool,
    /// Multiplicative cycles per preconditioner application
    pub cycles_per_apply: usize,
    /// Level smoother settings
    pub smoother: SmootherConfig,
    /// Coarsest-level solve
    pub coarse: CoarseSolverKind,
    /// Number of ranks sharing the hierarchy
    pub ranks: usize,
    /// Collect per-level timings
    pub log_levels: bool,
    /// Tolerances used by [`crate::Multigrid::solve`]
    pub richardson: RichardsonTolerances,
}

impl Default for MgConfig {
    fn default() -> Self {
        Self {
            mg_type: MgType::Multiplicative,
            cycle: CycleShape::V,
            smooth_down: 2,
            smooth_up: 2,
            galerkin: false,
            cycles_per_apply: 1,
            smoother: SmootherConfig::default(),
            coarse: CoarseSolverKind::Auto,
            ranks: 1,
            log_levels: false,
            richardson: RichardsonTolerances::default(),
        }
    }
}

impl MgConfig {
    /// Galerkin V-cycle with damped Jacobi, the textbook Poisson setup
    pub fn for_poisson() -> Self {
        Self {
            galerkin: true,
            smooth_down: 3,
            smooth_up: 3,
            smoother: SmootherConfig::jacobi(),
            ..Default::default()
        }
    }

    /// W-cycle with symmetric Gauss-Seidel, for strongly anisotropic or
    /// poorly resolved problems
    pub fn for_difficult_problems() -> Self {
        Self {
            galerkin: true,
            cycle: CycleShape::W,
            smoother: SmootherConfig::symmetric_gauss_seidel(),
            ..Default::default()
        }
    }

    /// Full multigrid, one pass gives a discretization-accurate solution
    pub fn for_nested_iteration() -> Self {
        Self {
            mg_type: MgType::Full,
            galerkin: true,
            ..Default::default()
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
