use crate::math::stats::StatsHelper;
use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;

/// Result of zeroing and spike-correcting one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedChannel {
    pub samples: Vec<f64>,
    pub zero_reference: f64,
    pub corrected_spikes: usize,
}

/// Removes the static tare and isolated spikes from a raw channel.
///
/// The zero reference is the mean of the first `zeroing_samples` values. A
/// sample is a spike when its neighbors agree within `stability_threshold`
/// but it departs from their average by more than `spike_threshold`; it is
/// then replaced by that average. Detection reads only the zeroed input, so
/// corrections never cascade, and the two endpoints are left untouched.
pub fn condition_channel(
    raw: &[f64],
    zeroing_samples: usize,
    stability_threshold: f64,
    spike_threshold: f64,
) -> ConditionedChannel {
    let lead = zeroing_samples.max(1).min(raw.len());
    let zero_reference = StatsHelper::mean(&raw[..lead]);
    let zeroed: Vec<f64> = raw.iter().map(|v| v - zero_reference).collect();

    let mut samples = zeroed.clone();
    let mut corrected_spikes = 0;
    for (offset, window) in zeroed.windows(3).enumerate() {
        let (pre, center, post) = (window[0], window[1], window[2]);
        if (pre - post).abs() >= stability_threshold {
            continue;
        }
        let neighbor_avg = (pre + post) / 2.0;
        if (center - neighbor_avg).abs() > spike_threshold {
            samples[offset + 1] = neighbor_avg;
            corrected_spikes += 1;
        }
    }

    ConditionedChannel {
        samples,
        zero_reference,
        corrected_spikes,
    }
}

/// Conditioning stage applied to every channel before spectral analysis.
pub struct ConditionStage {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl ConditionStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new(),
        }
    }
}

impl Default for ConditionStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for ConditionStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        if input.samples.is_empty() {
            return Err(StageError::InvalidInput(format!(
                "channel {} has no samples",
                input.channel + 1
            )));
        }

        let conditioned = condition_channel(
            &input.samples,
            config.zeroing_samples,
            config.spike_stability_threshold,
            config.spike_threshold,
        );
        self.logger.trace(&format!(
            "channel {} zero reference {:.3}, {} spikes corrected",
            input.channel + 1,
            conditioned.zero_reference,
            conditioned.corrected_spikes
        ));

        let metadata = StageMetadata {
            zero_reference: Some(conditioned.zero_reference),
            corrected_spikes: Some(conditioned.corrected_spikes),
            notes: vec![format!("zero reference {:.3}", conditioned.zero_reference)],
            ..Default::default()
        };

        Ok(StageOutput {
            samples: conditioned.samples,
            metadata,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
