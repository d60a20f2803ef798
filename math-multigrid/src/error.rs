//! Error types for the multigrid engine.
//!
//! Two families are kept apart:
//! - [`MgError`]: configuration and structural errors, returned from setup and
//!   configuration calls and never swallowed.
//! - [`SmootherError`]: failures of a subordinate solver. These never unwind
//!   a cycle; they are recorded on the owning level and surface as a
//!   [`FailureReason`] on the hierarchy.

use math_linalg::LuError;
use thiserror::Error;

/// Errors raised while configuring or materializing a hierarchy.
#[derive(Debug, Error)]
pub enum MgError {
    /// A hierarchy needs at least one level.
    #[error("invalid number of levels: {levels} (must be >= 1)")]
    InvalidLevelCount {
        /// The rejected level count
        levels: usize,
    },

    /// `set_levels` called with the current count after setup.
    #[error("hierarchy already set up with {levels} levels; change the count or reset first")]
    LevelsAlreadySetUp {
        /// Current level count
        levels: usize,
    },

    /// Level index outside `0..levels`.
    #[error("level {level} out of range for a hierarchy of {levels} levels")]
    LevelOutOfRange {
        /// Requested level
        level: usize,
        /// Number of levels
        levels: usize,
    },

    /// Transfer operators cannot be attached to the coarsest level.
    #[error("level 0 has no coarser level; transfer operators start at level 1")]
    TransferOnCoarsest,

    /// No operator could be bound to a level.
    #[error("no operator available for level {level}")]
    MissingOperator {
        /// Level without an operator
        level: usize,
    },

    /// Neither interpolation nor restriction was supplied for a level above the coarsest.
    #[error("must provide interpolation or restriction for level {level}")]
    MissingTransfer {
        /// Level without transfer operators
        level: usize,
    },

    /// A transfer operator does not map between the spaces of two adjacent levels.
    #[error(
        "transfer operator on level {level} is {rows}x{cols}, expected {fine}x{coarse} or {coarse}x{fine}"
    )]
    TransferShape {
        /// Fine level index
        level: usize,
        /// Matrix rows
        rows: usize,
        /// Matrix columns
        cols: usize,
        /// Fine level size
        fine: usize,
        /// Coarse level size
        coarse: usize,
    },

    /// Vector or operator sizes disagree.
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Which object was checked
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// The discretization cannot produce another coarse level.
    #[error("discretization with {dofs} unknowns cannot be coarsened further")]
    CannotCoarsen {
        /// Unknowns on the level that failed to coarsen
        dofs: usize,
    },

    /// The Richardson wrapper only drives multiplicative cycles.
    #[error("Richardson iteration requires a multiplicative hierarchy, found {found}")]
    RichardsonRequiresMultiplicative {
        /// Configured hierarchy type
        found: String,
    },

    /// Configuration file could not be parsed.
    #[error("invalid multigrid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for multigrid operations.
pub type Result<T> = std::result::Result<T, MgError>;

impl MgError {
    /// Returns `true` for errors caused by the level layout.
    pub fn is_level_error(&self) -> bool {
        matches!(
            self,
            MgError::InvalidLevelCount { .. }
                | MgError::LevelsAlreadySetUp { .. }
                | MgError::LevelOutOfRange { .. }
                | MgError::TransferOnCoarsest
        )
    }

    /// Returns `true` for errors detected while materializing operators and transfers.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            MgError::MissingOperator { .. }
                | MgError::MissingTransfer { .. }
                | MgError::TransferShape { .. }
                | MgError::DimensionMismatch { .. }
                | MgError::CannotCoarsen { .. }
        )
    }

    /// Returns `true` when a configuration source was unreadable or invalid.
    pub fn is_config_error(&self) -> bool {
        matches!(self, MgError::Config(_) | MgError::Io(_))
    }
}

/// Failure of a subordinate solver (smoother or coarse solve).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SmootherError {
    /// Setup failed for a reason reported by the smoother.
    #[error("smoother setup failed: {reason}")]
    SetupFailed {
        /// Description from the smoother
        reason: String,
    },

    /// Relaxation needs a nonzero diagonal.
    #[error("zero diagonal entry in row {row}")]
    ZeroDiagonal {
        /// Offending row
        row: usize,
    },

    /// Direct factorization failed.
    #[error("factorization failed: {0}")]
    Factorization(#[from] LuError),

    /// `solve` called before a successful `setup`.
    #[error("smoother used before setup")]
    NotSetUp,

    /// Solve failed for a reason reported by the smoother.
    #[error("smoother solve failed: {reason}")]
    SolveFailed {
        /// Description from the smoother
        reason: String,
    },

    /// Iterates became NaN or infinite.
    #[error("smoother iterate is not finite after {iterations} iterations")]
    NonFinite {
        /// Iterations performed
        iterations: usize,
    },
}

/// Phase in which a subordinate solver failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// During hierarchy setup
    Setup,
    /// During a cycle
    Apply,
}

/// Hierarchy-wide failure flag, taken from the first failing level in setup order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    /// A smoother or coarse solver failed on a level.
    #[error("subordinate solver failed on level {level} during {phase:?}: {error}")]
    SubSolver {
        /// Level of the failing solver
        level: usize,
        /// Setup or apply
        phase: FailurePhase,
        /// Underlying failure
        error: SmootherError,
    },
}

impl FailureReason {
    /// Level that reported the failure
    pub fn level(&self) -> usize {
        match self {
            FailureReason::SubSolver { level, .. } => *level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(MgError::InvalidLevelCount { levels: 0 }.is_level_error());
        assert!(MgError::MissingTransfer { level: 2 }.is_setup_error());
        assert!(!MgError::MissingTransfer { level: 2 }.is_level_error());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(MgError::from(json_err).is_config_error());
    }

    #[test]
    fn test_messages() {
        let err = MgError::MissingTransfer { level: 3 };
        assert_eq!(
            err.to_string(),
            "must provide interpolation or restriction for level 3"
        );

        let failure = FailureReason::SubSolver {
            level: 0,
            phase: FailurePhase::Apply,
            error: SmootherError::NotSetUp,
        };
        assert_eq!(failure.level(), 0);
        assert!(failure.to_string().contains("level 0"));
    }

    #[test]
    fn test_lu_error_converts() {
        let err: SmootherError = LuError::SingularMatrix { column: 4 }.into();
        assert!(matches!(err, SmootherError::Factorization(_)));
    }
}
