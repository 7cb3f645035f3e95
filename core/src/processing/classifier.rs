use crate::model::{ChannelContribution, DetectionRecord, SensorPair, VacuumEvent};
use crate::prelude::{StageConfig, CHANNEL_COUNT};
use crate::processing::aligner::TimelineEntry;
use crate::telemetry::log::LogManager;
use std::f64::consts::PI;

/// What one channel contributes around an aligned instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelObservation {
    pub detection_index: usize,
    pub frequency_hz: f64,
    pub phase_rad: f64,
}

pub type ChannelInfo = [Option<ChannelObservation>; CHANNEL_COUNT];

/// Wraps an angle into (-pi, pi].
pub fn wrap_phase(angle: f64) -> f64 {
    let wrapped = angle.sin().atan2(angle.cos());
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

fn is_chronological(detections: &[DetectionRecord]) -> bool {
    detections.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Confirms vacuum events from aligned per-channel detections.
pub struct VacuumClassifier {
    half_window: f64,
    phase_tolerance: f64,
    frequency_tolerance: f64,
    dedup_window: f64,
    logger: LogManager,
}

impl VacuumClassifier {
    pub fn new(config: &StageConfig) -> Self {
        Self {
            half_window: config.co_detection_window_seconds / 2.0,
            phase_tolerance: config.phase_tolerance,
            frequency_tolerance: config.frequency_tolerance_hz,
            dedup_window: config.dedup_window_seconds,
            logger: LogManager::new(),
        }
    }

    /// Per-channel observation within the co-detection window around `instant`.
    ///
    /// Takes each channel's earliest detection with `|t - instant| <= co / 2`,
    /// which is the first one met in timeline order.
    pub fn gather<L: AsRef<[DetectionRecord]>>(&self, per_channel: &[L], instant: f64) -> ChannelInfo {
        let mut info: ChannelInfo = [None; CHANNEL_COUNT];
        for (slot, detections) in info.iter_mut().zip(per_channel) {
            let detections = detections.as_ref();
            *slot = self.first_in_window(detections, instant, is_chronological(detections));
        }
        info
    }

    fn first_in_window(
        &self,
        detections: &[DetectionRecord],
        instant: f64,
        chronological: bool,
    ) -> Option<ChannelObservation> {
        let in_window = |d: &DetectionRecord| (d.timestamp - instant).abs() <= self.half_window;
        // The lookup bounds are a full window wide; membership is decided by `in_window` alone.
        let (start, end) = if chronological {
            let reach = 2.0 * self.half_window;
            (
                detections.partition_point(|d| d.timestamp < instant - reach),
                detections.partition_point(|d| d.timestamp <= instant + reach),
            )
        } else {
            (0, detections.len())
        };

        detections[start..end]
            .iter()
            .enumerate()
            .filter(|(_, d)| in_window(*d))
            .min_by(|(_, a), (_, b)| a.timestamp.total_cmp(&b.timestamp))
            .map(|(offset, d)| ChannelObservation {
                detection_index: start + offset,
                frequency_hz: d.frequency_hz,
                phase_rad: d.phase_rad,
            })
    }

    /// Same frequency and roughly opposite phase on both cells of `pair`.
    pub fn pair_is_anti_phase(&self, info: &ChannelInfo, pair: SensorPair) -> bool {
        let (a, b) = pair.channels();
        let (Some(a), Some(b)) = (info[a], info[b]) else {
            return false;
        };
        if (a.frequency_hz - b.frequency_hz).abs() >= self.frequency_tolerance {
            return false;
        }
        let phase_diff = wrap_phase(a.phase_rad - b.phase_rad).abs();
        (phase_diff - PI).abs() < self.phase_tolerance
    }

    fn gather_with(
        &self,
        per_channel: &[&[DetectionRecord]],
        chronological: &[bool],
        instant: f64,
    ) -> ChannelInfo {
        let mut info: ChannelInfo = [None; CHANNEL_COUNT];
        for ((slot, detections), &sorted) in info.iter_mut().zip(per_channel).zip(chronological) {
            *slot = self.first_in_window(detections, instant, sorted);
        }
        info
    }

    /// Scans the timeline and returns deduplicated vacuum events in order.
    pub fn classify<L: AsRef<[DetectionRecord]>>(
        &self,
        timeline: &[TimelineEntry],
        per_channel: &[L],
    ) -> Vec<VacuumEvent> {
        let channels: Vec<&[DetectionRecord]> = per_channel.iter().map(|d| d.as_ref()).collect();
        let chronological: Vec<bool> = channels.iter().map(|d| is_chronological(d)).collect();
        let mut events: Vec<VacuumEvent> = Vec::new();
        for entry in timeline {
            let instant = entry.timestamp;
            let info = self.gather_with(&channels, &chronological, instant);
            if !(self.pair_is_anti_phase(&info, SensorPair::OUTER)
                && self.pair_is_anti_phase(&info, SensorPair::INNER))
            {
                continue;
            }

            let isolated = events
                .iter()
                .all(|event| (instant - event.timestamp).abs() > self.dedup_window);
            if !isolated {
                continue;
            }

            let contributions = info
                .iter()
                .enumerate()
                .filter_map(|(channel, observation)| {
                    observation.map(|o| ChannelContribution {
                        channel,
                        detection_index: o.detection_index,
                        frequency_hz: o.frequency_hz,
                        phase_rad: o.phase_rad,
                    })
                })
                .collect();
            self.logger.record(&format!(
                "anti-phase (same frequency) at {:.3}s: {} and {}",
                instant,
                SensorPair::OUTER,
                SensorPair::INNER
            ));
            events.push(VacuumEvent::new(instant, contributions));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::aligner::align;

    fn record(channel: usize, timestamp: f64, frequency: f64, phase: f64) -> DetectionRecord {
        DetectionRecord::new(channel, 0, timestamp, frequency, phase)
    }

    fn config() -> StageConfig {
        StageConfig::with_parameters(1.0, 0.5, 0.1)
    }

    fn vacuum_at(timestamp: f64) -> Vec<Vec<DetectionRecord>> {
        vec![
            vec![record(0, timestamp, 2.0, 0.2)],
            vec![record(1, timestamp, 3.0, -1.0)],
            vec![record(2, timestamp, 3.0, 2.1)],
            vec![record(3, timestamp, 2.0, 0.2 - PI)],
        ]
    }

    #[test]
    fn wrap_phase_stays_in_half_open_range() {
        assert!((wrap_phase(3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_phase(-PI).abs() - PI).abs() < 1e-12);
        assert!((wrap_phase(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_phase(2.0 * PI + 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn both_anti_phase_pairs_produce_event() {
        let per_channel = vacuum_at(1.0);
        let classifier = VacuumClassifier::new(&config());
        let events = classifier.classify(&align(&per_channel), &per_channel);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 1.0);
        assert_eq!(events[0].contributions.len(), 4);
    }

    #[test]
    fn single_pair_is_not_enough() {
        let mut per_channel = vacuum_at(1.0);
        per_channel[1].clear();
        let classifier = VacuumClassifier::new(&config());
        assert!(classifier
            .classify(&align(&per_channel), &per_channel)
            .is_empty());
    }

    #[test]
    fn frequency_difference_at_tolerance_does_not_match() {
        let mut config = config();
        config.frequency_tolerance_hz = 0.125;
        let classifier = VacuumClassifier::new(&config);
        let mut info: ChannelInfo = [None; CHANNEL_COUNT];
        info[0] = Some(ChannelObservation {
            detection_index: 0,
            frequency_hz: 1.5,
            phase_rad: 0.0,
        });
        info[3] = Some(ChannelObservation {
            detection_index: 0,
            frequency_hz: 1.625,
            phase_rad: PI,
        });
        assert!(!classifier.pair_is_anti_phase(&info, SensorPair::OUTER));

        info[3] = Some(ChannelObservation {
            detection_index: 0,
            frequency_hz: 1.5625,
            phase_rad: PI,
        });
        assert!(classifier.pair_is_anti_phase(&info, SensorPair::OUTER));
    }

    #[test]
    fn in_phase_pair_is_rejected() {
        let mut config = config();
        config.phase_tolerance = 0.5;
        let classifier = VacuumClassifier::new(&config);
        let mut info: ChannelInfo = [None; CHANNEL_COUNT];
        let observation = ChannelObservation {
            detection_index: 0,
            frequency_hz: 2.0,
            phase_rad: 1.0,
        };
        info[1] = Some(observation);
        info[2] = Some(observation);
        assert!(!classifier.pair_is_anti_phase(&info, SensorPair::INNER));

        info[2] = Some(ChannelObservation {
            phase_rad: 1.0 - PI + 0.2,
            ..observation
        });
        assert!(classifier.pair_is_anti_phase(&info, SensorPair::INNER));
    }

    #[test]
    fn gather_takes_first_detection_inside_window() {
        let per_channel = vec![
            vec![
                record(0, 0.90, 2.0, 0.0),
                record(0, 0.97, 2.5, 0.1),
                record(0, 1.02, 3.0, 0.2),
            ],
            vec![record(1, 1.2, 2.0, 0.0)],
            vec![],
            vec![record(3, 1.04, 4.0, 0.0)],
        ];
        let classifier = VacuumClassifier::new(&config());
        let info = classifier.gather(&per_channel, 1.0);
        assert_eq!(info[0].map(|o| o.detection_index), Some(1));
        assert_eq!(info[0].map(|o| o.frequency_hz), Some(2.5));
        assert!(info[1].is_none());
        assert!(info[2].is_none());
        assert_eq!(info[3].map(|o| o.frequency_hz), Some(4.0));
    }

    #[test]
    fn detection_on_window_edge_is_included() {
        let per_channel = vec![
            vec![record(0, 2.0 / 100.0, 2.0, 0.0)],
            vec![record(1, 27.0 / 100.0, 3.0, 0.5)],
            vec![record(2, 27.0 / 100.0, 3.0, 0.5 - PI)],
            vec![record(3, 0.0, 2.0, 0.0), record(3, 27.0 / 100.0, 2.0, PI)],
        ];
        let config = StageConfig::with_parameters(0.5, 0.5, 0.5);
        let classifier = VacuumClassifier::new(&config);

        let info = classifier.gather(&per_channel, 27.0 / 100.0);
        assert_eq!(info[0].map(|o| o.detection_index), Some(0));
        assert_eq!(info[3].map(|o| o.detection_index), Some(1));

        let events = classifier.classify(&align(&per_channel), &per_channel);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 27.0 / 100.0);
    }

    #[test]
    fn unsorted_channel_still_yields_earliest_detection() {
        let per_channel = vec![
            vec![record(0, 1.04, 3.0, 0.0), record(0, 0.97, 2.5, 0.1)],
            vec![],
            vec![],
            vec![],
        ];
        let classifier = VacuumClassifier::new(&config());
        let info = classifier.gather(&per_channel, 1.0);
        assert_eq!(info[0].map(|o| o.detection_index), Some(1));
        assert_eq!(info[0].map(|o| o.frequency_hz), Some(2.5));
    }

    #[test]
    fn nearby_confirmations_are_deduplicated() {
        let mut per_channel: Vec<Vec<DetectionRecord>> = vec![Vec::new(); CHANNEL_COUNT];
        for timestamp in [1.0, 1.06, 1.3, 1.35, 2.0] {
            for (channel, detections) in vacuum_at(timestamp).into_iter().enumerate() {
                per_channel[channel].extend(detections);
            }
        }
        let classifier = VacuumClassifier::new(&config());
        let events = classifier.classify(&align(&per_channel), &per_channel);
        let times: Vec<f64> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![1.0, 1.3, 2.0]);
        for pair in events.windows(2) {
            assert!(pair[1].timestamp - pair[0].timestamp > 0.1);
        }
    }
}
