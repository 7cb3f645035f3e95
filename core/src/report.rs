use crate::pipeline::DetectionOutcome;
use crate::prelude::StageConfig;
use serde::{Deserialize, Serialize};

/// One row of the tabular detection summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRow {
    /// `vacuum_event` or `sinusoidal_weight_<n>`.
    pub detection_type: String,
    pub timestamp: f64,
    /// One-based channel, absent for vacuum events.
    pub channel: Option<usize>,
    pub frequency_hz: Option<f64>,
    pub phase_radians: Option<f64>,
    pub phase_degrees: Option<f64>,
}

/// Serializable summary of one detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub source: String,
    pub parameters: StageConfig,
    pub sample_rate: f64,
    pub window_samples: usize,
    pub vacuum_event_count: usize,
    pub detection_count: usize,
    pub rows: Vec<DetectionRow>,
}

/// Flattens vacuum events followed by each channel's detections.
pub fn rows(outcome: &DetectionOutcome) -> Vec<DetectionRow> {
    let events = outcome.vacuum_events.iter().map(|event| DetectionRow {
        detection_type: "vacuum_event".to_string(),
        timestamp: event.timestamp,
        channel: None,
        frequency_hz: None,
        phase_radians: None,
        phase_degrees: None,
    });
    let detections = outcome
        .per_channel_detections
        .iter()
        .flatten()
        .map(|record| DetectionRow {
            detection_type: format!("sinusoidal_weight_{}", record.channel + 1),
            timestamp: record.timestamp,
            channel: Some(record.channel + 1),
            frequency_hz: Some(record.frequency_hz),
            phase_radians: Some(record.phase_rad),
            phase_degrees: Some(record.phase_deg()),
        });
    events.chain(detections).collect()
}

impl DetectionReport {
    pub fn new(source: impl Into<String>, parameters: &StageConfig, outcome: &DetectionOutcome) -> Self {
        Self {
            source: source.into(),
            parameters: parameters.clone(),
            sample_rate: outcome.sample_rate,
            window_samples: outcome.window_samples,
            vacuum_event_count: outcome.vacuum_events.len(),
            detection_count: outcome.total_detections(),
            rows: rows(outcome),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
