use anyhow::{bail, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use vacuumcore::prelude::CHANNEL_COUNT;
use vacuumcore::ChannelSeries;

/// Configuration for generating a synthetic shelf recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub duration_seconds: f64,
    pub sample_rate: f64,
    /// Static load on each cell before zeroing.
    pub baseline: [f64; CHANNEL_COUNT],
    /// Oscillation frequency on cells 1 and 4.
    pub outer_frequency: f64,
    /// Oscillation frequency on cells 2 and 3.
    pub inner_frequency: f64,
    pub amplitude: f64,
    pub onset_seconds: f64,
    pub burst_seconds: f64,
    pub outer_oscillates: bool,
    pub inner_oscillates: bool,
    /// Opposite phase within each pair when set, in phase otherwise.
    pub anti_phase: bool,
    /// Half-width of the uniform noise added to every sample.
    pub noise: f64,
    /// Single-sample spikes spread evenly over the quiet part of the recording.
    pub spikes: usize,
    pub seed: u64,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 10.0,
            sample_rate: 100.0,
            baseline: [1200.0, 950.0, 1010.0, 1180.0],
            outer_frequency: 2.0,
            inner_frequency: 3.0,
            amplitude: 50.0,
            onset_seconds: 3.0,
            burst_seconds: 4.0,
            outer_oscillates: true,
            inner_oscillates: true,
            anti_phase: true,
            noise: 0.5,
            spikes: 0,
            seed: 0,
            description: None,
        }
    }
}

impl GeneratorConfig {
    fn sample_count(&self) -> anyhow::Result<usize> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            bail!("generator sample_rate must be positive, got {}", self.sample_rate);
        }
        let count = (self.duration_seconds * self.sample_rate).round();
        if !(count.is_finite() && count >= 2.0) {
            bail!(
                "generator needs at least two samples, got {:.0} for {}s at {} Hz",
                count,
                self.duration_seconds,
                self.sample_rate
            );
        }
        Ok(count as usize)
    }

    fn in_burst(&self, t: f64) -> bool {
        t >= self.onset_seconds && t < self.onset_seconds + self.burst_seconds
    }

    /// Oscillation added to `channel` at time `t`.
    fn oscillation(&self, channel: usize, t: f64) -> f64 {
        if !self.in_burst(t) {
            return 0.0;
        }
        let opposite = if self.anti_phase { PI } else { 0.0 };
        let (active, frequency, phase) = match channel {
            0 => (self.outer_oscillates, self.outer_frequency, 0.0),
            3 => (self.outer_oscillates, self.outer_frequency, opposite),
            1 => (self.inner_oscillates, self.inner_frequency, 0.7),
            _ => (self.inner_oscillates, self.inner_frequency, 0.7 + opposite),
        };
        if active {
            self.amplitude * (2.0 * PI * frequency * t + phase).sin()
        } else {
            0.0
        }
    }
}

pub fn build_series_from_config(config: &GeneratorConfig) -> anyhow::Result<ChannelSeries> {
    let count = config.sample_count()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let timestamps: Vec<f64> = (0..count).map(|i| i as f64 / config.sample_rate).collect();
    let mut channels: [Vec<f64>; CHANNEL_COUNT] = Default::default();
    for (channel, samples) in channels.iter_mut().enumerate() {
        samples.reserve(count);
        for &t in &timestamps {
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            samples.push(config.baseline[channel] + config.oscillation(channel, t) + jitter);
        }
    }

    let quiet: Vec<usize> = (1..count.saturating_sub(1))
        .filter(|&i| !config.in_burst(timestamps[i]))
        .collect();
    if !quiet.is_empty() {
        for spike in 0..config.spikes {
            let index = quiet[(spike + 1) * quiet.len() / (config.spikes + 1)];
            channels[spike % CHANNEL_COUNT][index] += 500.0;
        }
    }

    ChannelSeries::new(timestamps, channels).context("assembling synthetic series")
}

/// Default scenario with both pairs in anti-phase.
#[cfg(test)]
pub fn build_vacuum_series(seed: u64) -> anyhow::Result<ChannelSeries> {
    let config = GeneratorConfig {
        seed,
        ..Default::default()
    };
    build_series_from_config(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vacuumcore::{detect, StageConfig};

    #[test]
    fn generator_builds_expected_sample_count() {
        let series = build_vacuum_series(1).unwrap();
        assert_eq!(series.len(), 1000);
        assert!((series.timestamps()[1] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn generator_is_reproducible_for_a_seed() {
        let a = build_vacuum_series(7).unwrap();
        let b = build_vacuum_series(7).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn quiet_channels_stay_near_baseline() {
        let config = GeneratorConfig {
            inner_oscillates: false,
            ..Default::default()
        };
        let series = build_series_from_config(&config).unwrap();
        for value in series.channel(1).iter() {
            assert!((value - 950.0).abs() <= 0.5);
        }
    }

    #[test]
    fn spikes_are_removed_by_conditioning() {
        let config = GeneratorConfig {
            outer_oscillates: false,
            inner_oscillates: false,
            spikes: 3,
            ..Default::default()
        };
        let series = build_series_from_config(&config).unwrap();
        let outcome = detect(&series, &StageConfig::default()).unwrap();
        assert_eq!(outcome.metrics.spikes_corrected, 3);
        assert!(outcome.conditioned.iter().all(|v| v.abs() < 5.0));
    }

    #[test]
    fn anti_phase_scenario_is_detected() {
        let series = build_vacuum_series(3).unwrap();
        let config = StageConfig::with_parameters(1.0, 0.5, 0.15);
        let outcome = detect(&series, &config).unwrap();
        assert!(outcome.has_vacuum_events());
        for event in &outcome.vacuum_events {
            assert!(event.timestamp > 2.4 && event.timestamp < 7.6);
        }
    }

    #[test]
    fn in_phase_scenario_is_not_a_vacuum() {
        let config = GeneratorConfig {
            anti_phase: false,
            ..Default::default()
        };
        let series = build_series_from_config(&config).unwrap();
        let mut detector = StageConfig::with_parameters(1.0, 0.5, 0.1);
        detector.phase_tolerance = 0.5;
        let outcome = detect(&series, &detector).unwrap();
        assert!(outcome.total_detections() > 0);
        assert!(!outcome.has_vacuum_events());
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let config = GeneratorConfig {
            duration_seconds: 0.0,
            ..Default::default()
        };
        assert!(build_series_from_config(&config).is_err());
    }
}
