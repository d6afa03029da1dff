use envm_core::errors::EnvmError;
use envm_lap::{PermanentEstimate, PermanentMethod};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::config::MatchConfig;
use crate::hash::{round_f64, stable_hash_string};
use crate::mode::MatchMode;

/// Outcome of comparing two structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Aggregation mode used.
    pub mode: MatchMode,
    /// Whether the comparison tiled periodic images.
    pub periodic: bool,
    /// Matched environments N, zero for `average`.
    pub size: usize,
    /// Similarity (`average`, `permanent`) or distance (other modes).
    pub value: f64,
    /// Squared distance before the square root, for assignment modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squared_cost: Option<f64>,
    /// Optimal `(row, column)` pairs, for assignment modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Vec<(usize, usize)>>,
    /// Permanent estimate, for `permanent` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent: Option<PermanentEstimate>,
    /// SHA-256 over the rounded content of the report.
    pub report_hash: String,
}

#[derive(Serialize)]
struct HashPayload<'a> {
    mode: MatchMode,
    periodic: bool,
    size: usize,
    value: f64,
    squared_cost: Option<f64>,
    assignment: Option<&'a [(usize, usize)]>,
    permanent: Option<PermanentDigest>,
}

#[derive(Serialize)]
struct PermanentDigest {
    re: f64,
    im: f64,
    method: PermanentMethod,
    samples: usize,
}

impl MatchReport {
    pub(crate) fn new(config: &MatchConfig, aggregate: Aggregate) -> Result<Self, EnvmError> {
        let mut report = MatchReport {
            mode: config.mode,
            periodic: config.periodic,
            size: aggregate.size,
            value: aggregate.value,
            squared_cost: aggregate.squared,
            assignment: aggregate.assignment.map(|assignment| assignment.pairs),
            permanent: aggregate.permanent,
            report_hash: String::new(),
        };
        report.report_hash = report.compute_hash()?;
        Ok(report)
    }

    /// Recomputes the content hash, e.g. after decoding a stored report.
    pub fn compute_hash(&self) -> Result<String, EnvmError> {
        let payload = HashPayload {
            mode: self.mode,
            periodic: self.periodic,
            size: self.size,
            value: round_f64(self.value),
            squared_cost: self.squared_cost.map(round_f64),
            assignment: self.assignment.as_deref(),
            permanent: self.permanent.as_ref().map(|estimate| PermanentDigest {
                re: round_f64(estimate.normalized.re),
                im: round_f64(estimate.normalized.im),
                method: estimate.method,
                samples: estimate.samples,
            }),
        };
        stable_hash_string(&payload)
    }
}
