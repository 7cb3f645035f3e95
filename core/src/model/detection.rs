use serde::{Deserialize, Serialize};

/// Single-channel dominant-sinusoid detection emitted by the spectral stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Zero-based channel index.
    pub channel: usize,
    /// Window center in samples.
    pub sample_index: usize,
    pub timestamp: f64,
    pub frequency_hz: f64,
    /// Angle of the raw transform at the peak bin, in radians.
    pub phase_rad: f64,
    pub power_ratio: f64,
    pub amplitude: f64,
}

impl DetectionRecord {
    pub fn new(
        channel: usize,
        sample_index: usize,
        timestamp: f64,
        frequency_hz: f64,
        phase_rad: f64,
    ) -> Self {
        Self {
            channel,
            sample_index,
            timestamp,
            frequency_hz,
            phase_rad,
            power_ratio: 0.0,
            amplitude: 0.0,
        }
    }

    pub fn with_spectrum(mut self, power_ratio: f64, amplitude: f64) -> Self {
        self.power_ratio = power_ratio;
        self.amplitude = amplitude;
        self
    }

    pub fn phase_deg(&self) -> f64 {
        self.phase_rad.to_degrees()
    }
}

/// Opposing load-cell pair, numbered from 1 as on the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorPair(pub u8, pub u8);

impl SensorPair {
    pub const OUTER: SensorPair = SensorPair(1, 4);
    pub const INNER: SensorPair = SensorPair(2, 3);

    /// Zero-based channel indices of both cells.
    pub fn channels(self) -> (usize, usize) {
        (usize::from(self.0) - 1, usize::from(self.1) - 1)
    }
}

impl std::fmt::Display for SensorPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W{}/W{}", self.0, self.1)
    }
}

/// Channel detection that took part in confirming a vacuum event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelContribution {
    pub channel: usize,
    /// Index into that channel's detection list.
    pub detection_index: usize,
    pub frequency_hz: f64,
    pub phase_rad: f64,
}

/// Simultaneous anti-phase oscillation on both sensor pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacuumEvent {
    pub timestamp: f64,
    pub pairs: [SensorPair; 2],
    pub contributions: Vec<ChannelContribution>,
}

impl VacuumEvent {
    pub fn new(timestamp: f64, contributions: Vec<ChannelContribution>) -> Self {
        Self {
            timestamp,
            pairs: [SensorPair::OUTER, SensorPair::INNER],
            contributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_pairs_map_to_zero_based_channels() {
        assert_eq!(SensorPair::OUTER.channels(), (0, 3));
        assert_eq!(SensorPair::INNER.channels(), (1, 2));
        assert_eq!(SensorPair::OUTER.to_string(), "W1/W4");
    }

    #[test]
    fn vacuum_event_reports_both_pairs() {
        let event = VacuumEvent::new(1.25, Vec::new());
        assert_eq!(event.pairs, [SensorPair(1, 4), SensorPair(2, 3)]);
    }
}
