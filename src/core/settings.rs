//! Tunable constants of the compression subsystem, grouped in one struct.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::utils::{CompressError, CompressResult, ValidationError};

/// Configuration for the optimizer, dispatcher and pump.
///
/// Every field has a default, so a settings file only needs the values it
/// changes. Call [`CompressionSettings::validate`] (or load through
/// [`CompressionSettings::from_json_str`]) before handing it to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionSettings {
    /// Lowest quality the optimizer may try
    pub quality_min: u8,
    /// Highest quality the optimizer may try
    pub quality_max: u8,
    /// Quality used when a job does not request one
    pub default_quality: u8,
    /// Upper bound on codec calls per optimized job
    pub max_attempts: u32,
    /// Consecutive codec failures after which the optimizer gives up
    pub max_consecutive_codec_errors: u32,
    /// Results at or below this quality carry a low-quality warning
    pub low_quality_threshold: u8,
    /// Pump tick interval in milliseconds
    pub pump_interval_ms: u64,
    /// Messages handled per pump tick
    pub pump_batch_size: usize,
    /// Failing batch items named in a summary
    pub failure_sample_size: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality_min: 5,
            quality_max: 95,
            default_quality: 85,
            max_attempts: 7,
            max_consecutive_codec_errors: 3,
            low_quality_threshold: 10,
            pump_interval_ms: 50,
            pump_batch_size: 10,
            failure_sample_size: 3,
        }
    }
}

impl CompressionSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quality_min == 0 || self.quality_max > 100 || self.quality_min > self.quality_max {
            return Err(ValidationError::settings(format!(
                "Quality range must satisfy 1 <= min <= max <= 100, got [{}, {}]",
                self.quality_min, self.quality_max
            )));
        }
        if self.default_quality == 0 || self.default_quality > 100 {
            return Err(ValidationError::settings(format!(
                "Default quality {} is outside 1..=100", self.default_quality
            )));
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::settings("maxAttempts must be at least 1"));
        }
        if self.max_consecutive_codec_errors == 0 {
            return Err(ValidationError::settings("maxConsecutiveCodecErrors must be at least 1"));
        }
        if self.pump_interval_ms == 0 || self.pump_batch_size == 0 {
            return Err(ValidationError::settings("Pump interval and batch size must be non-zero"));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ValidationError::settings(format!("Invalid settings JSON: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> CompressResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CompressError::io(format!("Cannot read settings {}: {e}", path.display())))?;
        Ok(Self::from_json_str(&json)?)
    }

    /// Clamps a quality into `[quality_min, quality_max]`.
    pub fn clamp_quality(&self, quality: u8) -> u8 {
        quality.clamp(self.quality_min, self.quality_max)
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms)
    }
}
