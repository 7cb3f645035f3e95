//! End-to-end detection: conditioning, per-channel spectral scan, alignment
//! and vacuum classification.

use crate::math::stats::StatsHelper;
use crate::model::{ChannelSeries, DetectionRecord, VacuumEvent};
use crate::prelude::{
    ProcessingStage, StageConfig, StageInput, StageResult, CHANNEL_COUNT,
};
use crate::processing::{
    align, window_samples, ConditionStage, SpectralStage, VacuumClassifier,
};
use crate::telemetry::{LogManager, MetricsRecorder, PipelineMetrics};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::sync::Arc;

/// How the independent per-channel stages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Sequential,
    /// One rayon task per channel.
    Parallel,
}

/// Everything a single detection run produces.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub sample_rate: f64,
    pub window_samples: usize,
    /// Conditioned signal, shape (N, 4).
    pub conditioned: Array2<f64>,
    pub per_channel_detections: [Vec<DetectionRecord>; CHANNEL_COUNT],
    pub vacuum_events: Vec<VacuumEvent>,
    pub metrics: PipelineMetrics,
}

impl DetectionOutcome {
    pub fn total_detections(&self) -> usize {
        self.per_channel_detections.iter().map(Vec::len).sum()
    }

    pub fn has_vacuum_events(&self) -> bool {
        !self.vacuum_events.is_empty()
    }
}

struct ChannelResult {
    conditioned: Vec<f64>,
    detections: Vec<DetectionRecord>,
}

fn process_channel(
    channel: usize,
    series: &ChannelSeries,
    timestamps: &Arc<[f64]>,
    sample_rate: f64,
    config: &StageConfig,
    metrics: &MetricsRecorder,
) -> StageResult<ChannelResult> {
    let mut condition = ConditionStage::new();
    condition.initialize(config)?;
    let conditioned = condition.execute(StageInput {
        channel,
        samples: series.channel_vec(channel),
        timestamps: Arc::clone(timestamps),
        sample_rate,
    })?;
    condition.cleanup();

    let mut spectral = SpectralStage::new();
    spectral.initialize(config)?;
    let scanned = spectral.execute(StageInput {
        channel,
        samples: conditioned.samples,
        timestamps: Arc::clone(timestamps),
        sample_rate,
    })?;
    spectral.cleanup();

    metrics.record_channel(
        scanned.metadata.windows_evaluated.unwrap_or(0),
        conditioned.metadata.corrected_spikes.unwrap_or(0),
        scanned.metadata.detections.len(),
    );

    Ok(ChannelResult {
        conditioned: scanned.samples,
        detections: scanned.metadata.detections,
    })
}

/// Runs the full detection pipeline on one series.
pub fn detect(series: &ChannelSeries, config: &StageConfig) -> StageResult<DetectionOutcome> {
    detect_with(series, config, Execution::Sequential)
}

/// Same as [`detect`] with the four channel workers on the rayon pool.
pub fn detect_parallel(
    series: &ChannelSeries,
    config: &StageConfig,
) -> StageResult<DetectionOutcome> {
    detect_with(series, config, Execution::Parallel)
}

pub fn detect_with(
    series: &ChannelSeries,
    config: &StageConfig,
    execution: Execution,
) -> StageResult<DetectionOutcome> {
    let logger = LogManager::new();
    config.validate()?;
    let sample_rate = StatsHelper::sample_rate(series.timestamps())?;
    let window = window_samples(config.window_seconds, sample_rate);
    if (config.window_seconds * sample_rate).round() < 3.0 {
        logger.warn(&format!(
            "window of {:.3}s is under 3 samples at {:.3} Hz, widened to {}",
            config.window_seconds, sample_rate, window
        ));
    }
    logger.record(&format!(
        "estimated fs {:.3} Hz, FFT window {} samples ({:.2} s)",
        sample_rate, window, config.window_seconds
    ));

    let metrics = MetricsRecorder::new();
    let timestamps = series.shared_timestamps();
    let results: Vec<ChannelResult> = match execution {
        Execution::Sequential => (0..CHANNEL_COUNT)
            .map(|channel| {
                process_channel(channel, series, &timestamps, sample_rate, config, &metrics)
            })
            .collect::<StageResult<_>>()?,
        Execution::Parallel => (0..CHANNEL_COUNT)
            .into_par_iter()
            .map(|channel| {
                process_channel(channel, series, &timestamps, sample_rate, config, &metrics)
            })
            .collect::<StageResult<_>>()?,
    };

    let mut conditioned = Array2::<f64>::zeros((series.len(), CHANNEL_COUNT));
    let mut per_channel_detections: [Vec<DetectionRecord>; CHANNEL_COUNT] = Default::default();
    for (channel, result) in results.into_iter().enumerate() {
        conditioned
            .column_mut(channel)
            .assign(&Array1::from(result.conditioned));
        per_channel_detections[channel] = result.detections;
    }

    let timeline = align(&per_channel_detections);
    let classifier = VacuumClassifier::new(config);
    let vacuum_events = classifier.classify(&timeline, &per_channel_detections);
    metrics.record_events(vacuum_events.len());

    let snapshot = metrics.snapshot();
    logger.record(&format!(
        "{} vacuum events, {} sinusoidal detections",
        vacuum_events.len(),
        snapshot.detections
    ));

    Ok(DetectionOutcome {
        sample_rate,
        window_samples: window,
        conditioned,
        per_channel_detections,
        vacuum_events,
        metrics: snapshot,
    })
}
