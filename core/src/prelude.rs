use crate::model::DetectionRecord;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Number of load cells on a shelf.
pub const CHANNEL_COUNT: usize = 4;

/// Shared configuration for each processing stage.
///
/// The first four fields are the per-run tunables; the remaining ones are
/// fixed domain constants exposed so tests and sweeps can probe boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StageConfig {
    /// Spectral analysis window length in seconds.
    pub window_seconds: f64,
    /// Peak amplitude over total non-DC amplitude required to accept a window.
    pub power_ratio_threshold: f64,
    /// Tolerance within which detections on different channels are simultaneous.
    /// Also used as the per-channel minimum re-detection gap.
    pub co_detection_window_seconds: f64,
    /// Leading samples averaged into the zero reference.
    pub zeroing_samples: usize,
    pub spike_stability_threshold: f64,
    pub spike_threshold: f64,
    /// Minimum peak amplitude for a window to count as oscillating.
    pub amplitude_floor: f64,
    /// Allowed deviation of a pair's phase difference from pi, in radians.
    pub phase_tolerance: f64,
    pub frequency_tolerance_hz: f64,
    pub dedup_window_seconds: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            window_seconds: 0.5,
            power_ratio_threshold: 0.5,
            co_detection_window_seconds: 0.5,
            zeroing_samples: 20,
            spike_stability_threshold: 10.0,
            spike_threshold: 200.0,
            amplitude_floor: 10.0,
            phase_tolerance: PI / 1.1,
            frequency_tolerance_hz: 0.1,
            dedup_window_seconds: 0.1,
        }
    }
}

impl StageConfig {
    /// Builds a config from the per-run tunables, keeping default constants.
    pub fn with_parameters(
        window_seconds: f64,
        power_ratio_threshold: f64,
        co_detection_window_seconds: f64,
    ) -> Self {
        Self {
            window_seconds,
            power_ratio_threshold,
            co_detection_window_seconds,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> StageResult<()> {
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(StageError::InvalidConfig(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if !(self.power_ratio_threshold > 0.0 && self.power_ratio_threshold <= 1.0) {
            return Err(StageError::InvalidConfig(format!(
                "power_ratio_threshold must lie in (0, 1], got {}",
                self.power_ratio_threshold
            )));
        }
        if !(self.co_detection_window_seconds.is_finite()
            && self.co_detection_window_seconds >= 0.0)
        {
            return Err(StageError::InvalidConfig(format!(
                "co_detection_window_seconds must be non-negative, got {}",
                self.co_detection_window_seconds
            )));
        }
        Ok(())
    }
}

/// Input payload for a per-channel processing stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// Zero-based channel index.
    pub channel: usize,
    pub samples: Vec<f64>,
    /// Time axis shared by every channel of the series, in seconds.
    pub timestamps: Arc<[f64]>,
    pub sample_rate: f64,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub samples: Vec<f64>,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub zero_reference: Option<f64>,
    pub corrected_spikes: Option<usize>,
    pub windows_evaluated: Option<usize>,
    pub detections: Vec<DetectionRecord>,
    pub notes: Vec<String>,
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("not enough samples to determine sampling frequency: {found}")]
    InsufficientSamples { found: usize },
    #[error("expected {} channels, found {found}", CHANNEL_COUNT)]
    ChannelCount { found: usize },
    #[error("channel {channel} has {found} samples, expected {expected}")]
    LengthMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },
    #[error("channel {channel} timestamp at index {index} disagrees with the shared time axis")]
    TimestampMismatch { channel: usize, index: usize },
    #[error("invalid sampling rate: {0}")]
    InvalidSampleRate(f64),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing per-channel signal-processing stages.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_carries_documented_constants() {
        let config = StageConfig::default();
        assert_eq!(config.zeroing_samples, 20);
        assert_eq!(config.amplitude_floor, 10.0);
        assert!((config.phase_tolerance.to_degrees() - 163.636).abs() < 1e-2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let config = StageConfig::with_parameters(0.5, 1.5, 0.1);
        assert!(matches!(
            config.validate(),
            Err(StageError::InvalidConfig(_))
        ));
        let config = StageConfig::with_parameters(0.0, 0.5, 0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_style_config_falls_back_to_defaults() {
        let config: StageConfig =
            serde_json::from_str(r#"{"window_seconds": 1.5}"#).unwrap();
        assert_eq!(config.window_seconds, 1.5);
        assert_eq!(config.co_detection_window_seconds, 0.5);
    }
}
