use crate::prelude::{StageError, StageResult, CHANNEL_COUNT};
use ndarray::{Array2, ArrayView1, Axis};
use std::sync::Arc;

/// Four load-cell channels sampled on one shared time axis.
#[derive(Debug, Clone)]
pub struct ChannelSeries {
    timestamps: Arc<[f64]>,
    /// Shape (N, 4): one row per sample, one column per channel.
    values: Array2<f64>,
}

impl ChannelSeries {
    pub fn new(timestamps: Vec<f64>, channels: [Vec<f64>; CHANNEL_COUNT]) -> StageResult<Self> {
        let expected = timestamps.len();
        for (channel, samples) in channels.iter().enumerate() {
            if samples.len() != expected {
                return Err(StageError::LengthMismatch {
                    channel,
                    expected,
                    found: samples.len(),
                });
            }
        }

        let values = Array2::from_shape_fn((expected, CHANNEL_COUNT), |(row, col)| {
            channels[col][row]
        });
        Ok(Self {
            timestamps: timestamps.into(),
            values,
        })
    }

    pub fn from_rows(rows: &[(f64, [f64; CHANNEL_COUNT])]) -> Self {
        let timestamps: Vec<f64> = rows.iter().map(|(t, _)| *t).collect();
        let values = Array2::from_shape_fn((rows.len(), CHANNEL_COUNT), |(row, col)| {
            rows[row].1[col]
        });
        Self {
            timestamps: timestamps.into(),
            values,
        }
    }

    /// Builds a series from per-channel `(timestamp, value)` sequences.
    ///
    /// Every channel must carry the same timestamps as the first one.
    pub fn from_channel_samples(channels: &[Vec<(f64, f64)>]) -> StageResult<Self> {
        if channels.len() != CHANNEL_COUNT {
            return Err(StageError::ChannelCount {
                found: channels.len(),
            });
        }

        let reference = &channels[0];
        let timestamps: Vec<f64> = reference.iter().map(|(t, _)| *t).collect();
        for (channel, samples) in channels.iter().enumerate().skip(1) {
            if samples.len() != reference.len() {
                return Err(StageError::LengthMismatch {
                    channel,
                    expected: reference.len(),
                    found: samples.len(),
                });
            }
            if let Some(index) = samples
                .iter()
                .zip(&timestamps)
                .position(|((t, _), axis)| t != axis)
            {
                return Err(StageError::TimestampMismatch { channel, index });
            }
        }

        let values = Array2::from_shape_fn((reference.len(), CHANNEL_COUNT), |(row, col)| {
            channels[col][row].1
        });
        Ok(Self {
            timestamps: timestamps.into(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn shared_timestamps(&self) -> Arc<[f64]> {
        Arc::clone(&self.timestamps)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn channel(&self, channel: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), channel)
    }

    pub fn channel_vec(&self, channel: usize) -> Vec<f64> {
        self.channel(channel).to_vec()
    }
}
