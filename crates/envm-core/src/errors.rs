//! Error values returned by matching, solving and configuration code.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and the values that led to a failure.
///
/// Context values are stored as their `Display` rendering so that the payload
/// serializes the same way whatever type produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kebab-case identifier, stable across releases.
    pub code: String,
    /// One-line description.
    pub message: String,
    /// Offending values keyed by name, in key order.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// What the caller can change to avoid the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload without context or hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records `key = value`, replacing an earlier value under the same key.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Renders as `message [code] at k=v, k=v; hint: ...`.
impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)?;
        let mut separator = " at ";
        for (key, value) in &self.context {
            write!(f, "{separator}{key}={value}")?;
            separator = ", ";
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

/// Failure of any environment-matching operation.
///
/// Serialized with the variant name under `family` and the payload under
/// `detail`. Every failure is deterministic, so retrying with the same inputs
/// fails again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum EnvmError {
    /// Mode name outside the supported set.
    #[error("invalid mode: {0}")]
    InvalidMode(ErrorInfo),
    /// Nothing to compare on one or both sides.
    #[error("empty structure: {0}")]
    EmptyStructure(ErrorInfo),
    /// Shapes or feature lengths that do not line up.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(ErrorInfo),
    /// NaN, infinity, or a parameter outside its numeric domain.
    #[error("numeric error: {0}")]
    Numeric(ErrorInfo),
    /// Sampling budget spent before the requested precision.
    #[error("precision not reached: {0}")]
    PrecisionNotReached(ErrorInfo),
    /// Encoding, decoding, configuration values and dump sinks.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl EnvmError {
    /// Payload of any variant.
    pub fn info(&self) -> &ErrorInfo {
        let (EnvmError::InvalidMode(info)
        | EnvmError::EmptyStructure(info)
        | EnvmError::DimensionMismatch(info)
        | EnvmError::Numeric(info)
        | EnvmError::PrecisionNotReached(info)
        | EnvmError::Serde(info)) = self;
        info
    }
}
