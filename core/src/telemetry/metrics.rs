use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counters shared by the per-channel workers of one detection run.
pub struct MetricsRecorder {
    inner: Mutex<PipelineMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub channels_processed: usize,
    pub windows_evaluated: usize,
    pub spikes_corrected: usize,
    pub detections: usize,
    pub vacuum_events: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipelineMetrics::default()),
        }
    }

    pub fn record_channel(&self, windows_evaluated: usize, spikes_corrected: usize, detections: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.channels_processed += 1;
            metrics.windows_evaluated += windows_evaluated;
            metrics.spikes_corrected += spikes_corrected;
            metrics.detections += detections;
        }
    }

    pub fn record_events(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.vacuum_events += count;
        }
    }

    pub fn snapshot(&self) -> PipelineMetrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            PipelineMetrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
