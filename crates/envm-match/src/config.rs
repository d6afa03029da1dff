use envm_core::errors::{EnvmError, ErrorInfo};
use envm_lap::PermanentOpts;
use serde::{Deserialize, Serialize};

use crate::diagnostics::DumpFormat;
use crate::mode::MatchMode;
use crate::serde::{from_json_slice, from_yaml_slice};

fn default_sumlog_epsilon() -> f64 {
    1e-100
}

fn config_error(code: &str, message: impl Into<String>) -> EnvmError {
    EnvmError::Serde(ErrorInfo::new(code, message.into()))
}

/// Parameters of one structure comparison.
///
/// Species weighting is not part of the configuration; it is passed to
/// [`compare`](crate::compare) as an [`AlchemyMixer`](crate::AlchemyMixer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    /// Aggregation mode.
    #[serde(default)]
    pub mode: MatchMode,
    /// Match across periodic images by tiling instead of padding.
    #[serde(default)]
    pub periodic: bool,
    /// Offset keeping `-ln(k)` finite for vanishing kernel values in `sumlog`.
    #[serde(default = "default_sumlog_epsilon")]
    pub sumlog_epsilon: f64,
    /// Permanent engine options for `permanent` mode.
    #[serde(default)]
    pub permanent: PermanentOpts,
    /// Formatting of the diagnostic dump.
    #[serde(default)]
    pub dump: DumpFormat,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            periodic: false,
            sumlog_epsilon: default_sumlog_epsilon(),
            permanent: PermanentOpts::default(),
            dump: DumpFormat::default(),
        }
    }
}

impl MatchConfig {
    /// Default configuration for `mode`.
    pub fn for_mode(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Sets the periodic flag.
    pub fn periodic(mut self, periodic: bool) -> Self {
        self.periodic = periodic;
        self
    }

    /// Decodes and validates a YAML configuration.
    pub fn from_yaml_slice(data: &[u8]) -> Result<Self, EnvmError> {
        let config: Self = from_yaml_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Decodes and validates a JSON configuration.
    pub fn from_json_slice(data: &[u8]) -> Result<Self, EnvmError> {
        let config: Self = from_json_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), EnvmError> {
        // -ln(0) would reach the solver as an infinite cost
        if !self.sumlog_epsilon.is_finite() || self.sumlog_epsilon <= 0.0 {
            return Err(config_error(
                "invalid-epsilon",
                "sumlog_epsilon must be finite and positive",
            ));
        }
        if let Some(precision) = self.permanent.precision {
            if !(precision > 0.0) {
                return Err(config_error(
                    "invalid-precision",
                    "permanent precision must be positive",
                ));
            }
        }
        if self.permanent.max_samples == 0 || self.permanent.batch_size == 0 {
            return Err(config_error(
                "invalid-budget",
                "permanent sample budget and batch size must be positive",
            ));
        }
        Ok(())
    }
}
