//! Hierarchy diagnostics
//!
//! [`MgDiagnostics`] is a snapshot of a hierarchy: sizes, complexities,
//! smoother descriptions and (when level logging is on) per-level timings.
//! Its `Display` output is a human-readable summary of the whole setup.

use crate::config::{CycleShape, MgType};
use crate::error::FailureReason;
use crate::hierarchy::Multigrid;
use crate::level::LevelTimings;
use crate::transfer::TransferSharing;
use math_linalg::ComplexField;
use std::fmt;

/// Snapshot of one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    /// Level index, 0 = coarsest
    pub level: usize,
    /// Unknowns
    pub dofs: usize,
    /// Stored operator entries
    pub nnz: usize,
    /// Recursion multiplicity
    pub cycles: usize,
    /// Pre-smoother (or shared smoother) description
    pub smoother_down: String,
    /// Post-smoother description when it differs from the pre-smoother
    pub smoother_up: Option<String>,
    /// Transfer sharing to the next coarser level
    pub sharing: Option<TransferSharing>,
    /// Restriction is followed by a scaling
    pub has_rscale: bool,
    /// Operator computed by the hierarchy rather than supplied
    pub owned_operator: bool,
    /// Accumulated timings
    pub timings: Option<LevelTimings>,
    /// Failure recorded on the level
    pub failure: Option<FailureReason>,
}

/// Snapshot of a hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct MgDiagnostics {
    /// Level combination
    pub mg_type: MgType,
    /// Cycle shape of the finest level
    pub cycle: CycleShape,
    /// Multiplicative cycles per application
    pub cycles_per_apply: usize,
    /// Coarse operators are Galerkin products
    pub galerkin: bool,
    /// Completed setups
    pub setup_count: usize,
    /// Per-level snapshots, coarsest first
    pub levels: Vec<LevelSummary>,
    /// Hierarchy failure flag
    pub failure: Option<FailureReason>,
}

impl MgDiagnostics {
    /// Total unknowns over all levels divided by the fine unknowns
    pub fn grid_complexity(&self) -> f64 {
        let fine = self.levels.last().map_or(0, |l| l.dofs);
        if fine == 0 {
            return 0.0;
        }
        self.levels.iter().map(|l| l.dofs).sum::<usize>() as f64 / fine as f64
    }

    /// Total operator entries over all levels divided by the fine entries
    pub fn operator_complexity(&self) -> f64 {
        let fine = self.levels.last().map_or(0, |l| l.nnz);
        if fine == 0 {
            return 0.0;
        }
        self.levels.iter().map(|l| l.nnz).sum::<usize>() as f64 / fine as f64
    }
}

impl fmt::Display for MgDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.mg_type {
            MgType::Multiplicative => "MULTIPLICATIVE",
            MgType::Additive => "ADDITIVE",
            MgType::Full => "FULL",
            MgType::Kaskade => "KASKADE",
        };
        writeln!(f, "MG: type is {}, levels={} cycles={}", kind, self.levels.len(), self.cycle)?;
        writeln!(f, "  Cycles per apply={}", self.cycles_per_apply)?;
        if self.galerkin {
            writeln!(f, "  Using Galerkin computed coarse grid matrices")?;
        } else {
            writeln!(f, "  Not using Galerkin computed coarse grid matrices")?;
        }
        writeln!(
            f,
            "  Grid complexity {:.3}, operator complexity {:.3}",
            self.grid_complexity(),
            self.operator_complexity()
        )?;

        for level in &self.levels {
            if level.level == 0 {
                writeln!(f, "Coarse grid solver -- level 0 -------------------------------")?;
            } else {
                writeln!(
                    f,
                    "Down solver (pre-smoother) on level {} -------------------------------",
                    level.level
                )?;
            }
            writeln!(f, "  {}", level.smoother_down)?;
            writeln!(
                f,
                "  operator: {} rows, {} nonzeros{}",
                level.dofs,
                level.nnz,
                if level.owned_operator { "" } else { " (user supplied)" }
            )?;
            if level.level > 0 {
                match &level.smoother_up {
                    None => writeln!(f, "Up solver (post-smoother) same as down solver (pre-smoother)")?,
                    Some(up) => {
                        writeln!(
                            f,
                            "Up solver (post-smoother) on level {} -------------------------------",
                            level.level
                        )?;
                        writeln!(f, "  {}", up)?;
                    }
                }
                let shape = CycleShape::from_multiplicity(level.cycles);
                if level.level > 1 && shape != self.cycle {
                    writeln!(f, "  cycle: {}", shape)?;
                }
                if let Some(sharing) = level.sharing {
                    writeln!(
                        f,
                        "  transfer: {:?}{}",
                        sharing,
                        if level.has_rscale { ", scaled restriction" } else { "" }
                    )?;
                }
            }
            if let Some(t) = &level.timings {
                writeln!(
                    f,
                    "  time: setup {:.3?}, down {:.3?} ({}), up {:.3?} ({}), residual {:.3?} ({}), transfer {:.3?} ({})",
                    t.setup,
                    t.smooth_down,
                    t.smooth_down_calls,
                    t.smooth_up,
                    t.smooth_up_calls,
                    t.residual,
                    t.residual_calls,
                    t.transfer,
                    t.transfer_calls
                )?;
            }
            if let Some(failure) = &level.failure {
                writeln!(f, "  FAILED: {}", failure)?;
            }
        }
        Ok(())
    }
}

impl<T: ComplexField> Multigrid<T> {
    /// Snapshot of the hierarchy for reporting
    pub fn diagnostics(&self) -> MgDiagnostics {
        let levels = self
            .levels
            .iter()
            .map(|l| {
                let pair = l.smoothers();
                LevelSummary {
                    level: l.index(),
                    dofs: l.num_dofs(),
                    nnz: l.operator().map_or(0, |a| a.nnz()),
                    cycles: l.cycles(),
                    smoother_down: pair.down().describe(),
                    smoother_up: (!pair.is_shared()).then(|| pair.up().describe()),
                    sharing: l.transfer().map(|t| t.sharing),
                    has_rscale: l.rscale().is_some(),
                    owned_operator: l.owns_operator(),
                    timings: l.timings().cloned(),
                    failure: l.failure().cloned(),
                }
            })
            .collect::<Vec<_>>();

        let cycle = self.config.cycle;
        MgDiagnostics {
            mg_type: self.config.mg_type,
            cycle,
            cycles_per_apply: self.config.cycles_per_apply,
            galerkin: self.config.galerkin,
            setup_count: self.setup_calls,
            levels,
            failure: self.failure.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(level: usize, dofs: usize, nnz: usize) -> LevelSummary {
        LevelSummary {
            level,
            dofs,
            nnz,
            cycles: 1,
            smoother_down: "lu, preonly".to_string(),
            smoother_up: None,
            sharing: None,
            has_rscale: false,
            owned_operator: true,
            timings: None,
            failure: None,
        }
    }

    #[test]
    fn test_complexities() {
        let diag = MgDiagnostics {
            mg_type: MgType::Multiplicative,
            cycle: CycleShape::V,
            cycles_per_apply: 1,
            galerkin: true,
            setup_count: 1,
            levels: vec![summary(0, 3, 7), summary(1, 7, 19), summary(2, 15, 43)],
            failure: None,
        };
        assert!((diag.grid_complexity() - 25.0 / 15.0).abs() < 1e-12);
        assert!((diag.operator_complexity() - 69.0 / 43.0).abs() < 1e-12);

        let text = diag.to_string();
        assert!(text.starts_with("MG: type is MULTIPLICATIVE, levels=3 cycles=v"));
        assert!(text.contains("Coarse grid solver -- level 0"));
        assert!(text.contains("Up solver (post-smoother) same as down solver"));
        assert!(!text.contains("cycle: "));
    }

    #[test]
    fn test_level_cycle_override_is_shown() {
        let mut finest = summary(2, 15, 43);
        finest.cycles = 2;
        let diag = MgDiagnostics {
            mg_type: MgType::Multiplicative,
            cycle: CycleShape::V,
            cycles_per_apply: 1,
            galerkin: true,
            setup_count: 1,
            levels: vec![summary(0, 3, 7), summary(1, 7, 19), finest],
            failure: None,
        };
        let text = diag.to_string();
        assert!(text.contains("  cycle: w"));
        assert_eq!(text.matches("cycle: ").count(), 1);
    }

    #[test]
    fn test_empty_hierarchy_complexity_is_zero() {
        let diag = MgDiagnostics {
            mg_type: MgType::Additive,
            cycle: CycleShape::W,
            cycles_per_apply: 1,
            galerkin: false,
            setup_count: 0,
            levels: vec![summary(0, 0, 0)],
            failure: None,
        };
        assert_eq!(diag.grid_complexity(), 0.0);
        assert_eq!(diag.operator_complexity(), 0.0);
    }
}
