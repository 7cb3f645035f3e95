use crate::prelude::{StageError, StageResult};

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn median(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            Some(sorted[mid])
        } else {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        }
    }

    /// Sampling rate from the median spacing of consecutive timestamps.
    pub fn sample_rate(timestamps: &[f64]) -> StageResult<f64> {
        if timestamps.len() < 2 {
            return Err(StageError::InsufficientSamples {
                found: timestamps.len(),
            });
        }
        let deltas: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        let period = Self::median(&deltas).unwrap_or(0.0);
        let rate = 1.0 / period;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(StageError::InvalidSampleRate(rate));
        }
        Ok(rate)
    }
}
