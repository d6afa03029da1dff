use std::fmt;
use std::str::FromStr;

use envm_core::errors::{EnvmError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Aggregation of the kernel matrix into a single similarity or distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// `-ln` of the mean matched kernel value.
    LogSum,
    /// Sum of matched `-ln` kernel values, extensive unless periodic.
    #[default]
    SumLog,
    /// Sum of matched `2(1 - k)`, extensive unless periodic.
    KDistance,
    /// Mean of matched `2(1 - k)`.
    NKDistance,
    /// Kernel between the aggregate environments, no matching.
    Average,
    /// `perm(K) / N! / N`.
    Permanent,
}

/// How a real/placeholder pair is scored once the penalty is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyForm {
    /// `weight · exp(-mu)`.
    Multiplicative,
    /// `weight - mu / 2`.
    Additive,
}

impl MatchMode {
    /// All modes, in declaration order.
    pub const ALL: [MatchMode; 6] = [
        MatchMode::LogSum,
        MatchMode::SumLog,
        MatchMode::KDistance,
        MatchMode::NKDistance,
        MatchMode::Average,
        MatchMode::Permanent,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::LogSum => "logsum",
            MatchMode::SumLog => "sumlog",
            MatchMode::KDistance => "kdistance",
            MatchMode::NKDistance => "nkdistance",
            MatchMode::Average => "average",
            MatchMode::Permanent => "permanent",
        }
    }

    /// Whether the mode solves an assignment problem.
    pub fn uses_assignment(&self) -> bool {
        matches!(
            self,
            MatchMode::LogSum | MatchMode::SumLog | MatchMode::KDistance | MatchMode::NKDistance
        )
    }

    /// Penalty form for real/placeholder pairs. Only the kernel-distance
    /// modes subtract; every other mode scales.
    pub fn penalty_form(&self) -> PenaltyForm {
        match self {
            MatchMode::KDistance | MatchMode::NKDistance => PenaltyForm::Additive,
            MatchMode::LogSum | MatchMode::SumLog | MatchMode::Average | MatchMode::Permanent => {
                PenaltyForm::Multiplicative
            }
        }
    }

    /// Kernel entry substituted for a real/placeholder pair.
    pub fn missing_pair_entry(&self, weight: f64, mu: f64) -> f64 {
        match self.penalty_form() {
            PenaltyForm::Multiplicative => weight * (-mu).exp(),
            PenaltyForm::Additive => weight - mu / 2.0,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = EnvmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MatchMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| {
                EnvmError::InvalidMode(
                    ErrorInfo::new("unknown-mode", "unrecognised aggregation mode")
                        .with_context("mode", value)
                        .with_hint("expected one of logsum, sumlog, kdistance, nkdistance, average, permanent"),
                )
            })
    }
}
