use crate::workflow::runner::run_isolated;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vacuumcore::prelude::StageConfig;
use vacuumcore::{detect_with, ChannelSeries, Execution};

/// Parameter values combined into a full grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepGrid {
    pub window_seconds: Vec<f64>,
    pub power_ratio_threshold: Vec<f64>,
    pub co_detection_window_seconds: Vec<f64>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            window_seconds: vec![0.1, 0.25, 0.5, 1.0, 2.0],
            power_ratio_threshold: vec![0.1, 0.25, 0.5, 0.75, 0.9],
            co_detection_window_seconds: vec![0.02, 0.05, 0.1, 0.25, 0.5],
        }
    }
}

impl SweepGrid {
    /// Every combination, window-major, each on top of `base`'s constants.
    pub fn combinations(&self, base: &StageConfig) -> Vec<StageConfig> {
        let mut configs = Vec::with_capacity(
            self.window_seconds.len()
                * self.power_ratio_threshold.len()
                * self.co_detection_window_seconds.len(),
        );
        for &window_seconds in &self.window_seconds {
            for &power_ratio_threshold in &self.power_ratio_threshold {
                for &co_detection_window_seconds in &self.co_detection_window_seconds {
                    configs.push(StageConfig {
                        window_seconds,
                        power_ratio_threshold,
                        co_detection_window_seconds,
                        ..base.clone()
                    });
                }
            }
        }
        configs
    }
}

/// Outcome of one grid point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepRow {
    pub window_seconds: f64,
    pub power_ratio_threshold: f64,
    pub co_detection_window_seconds: f64,
    pub vacuum_events: Option<usize>,
    pub sinusoid_detections: Option<usize>,
    pub first_vacuum_time: Option<f64>,
    pub error: Option<String>,
}

impl SweepRow {
    fn from_config(config: &StageConfig) -> Self {
        Self {
            window_seconds: config.window_seconds,
            power_ratio_threshold: config.power_ratio_threshold,
            co_detection_window_seconds: config.co_detection_window_seconds,
            vacuum_events: None,
            sinusoid_detections: None,
            first_vacuum_time: None,
            error: None,
        }
    }

    pub fn detected_vacuum(&self) -> bool {
        self.vacuum_events.unwrap_or(0) > 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    pub combinations: usize,
    pub successful: usize,
    pub with_vacuum: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn from_rows(rows: &[SweepRow]) -> Self {
        Self {
            combinations: rows.len(),
            successful: rows.iter().filter(|r| r.error.is_none()).count(),
            with_vacuum: rows.iter().filter(|r| r.detected_vacuum()).count(),
            failed: rows.iter().filter(|r| r.error.is_some()).count(),
        }
    }
}

/// Runs detection on `series` for every grid point.
///
/// A failing combination is recorded in its row and does not stop the sweep.
pub fn run_sweep(
    series: Arc<ChannelSeries>,
    grid: &SweepGrid,
    base: &StageConfig,
    execution: Execution,
) -> anyhow::Result<Vec<SweepRow>> {
    let configs = grid.combinations(base);
    let units = configs
        .iter()
        .map(|config| {
            let series = Arc::clone(&series);
            let config = config.clone();
            let label = format!(
                "win={} thr={} codet={}",
                config.window_seconds,
                config.power_ratio_threshold,
                config.co_detection_window_seconds
            );
            let unit = move || -> anyhow::Result<(usize, usize, Option<f64>)> {
                let outcome = detect_with(&series, &config, execution)?;
                Ok((
                    outcome.vacuum_events.len(),
                    outcome.total_detections(),
                    outcome.vacuum_events.first().map(|e| e.timestamp),
                ))
            };
            (label, unit)
        })
        .collect();

    let rows = run_isolated(units)?
        .into_iter()
        .zip(&configs)
        .map(|((_, outcome), config)| {
            let mut row = SweepRow::from_config(config);
            match outcome {
                Ok((events, detections, first)) => {
                    row.vacuum_events = Some(events);
                    row.sinusoid_detections = Some(detections);
                    row.first_vacuum_time = first;
                }
                Err(message) => row.error = Some(message),
            }
            row
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_vacuum_series;

    #[test]
    fn default_grid_has_125_combinations() {
        let grid = SweepGrid::default();
        let configs = grid.combinations(&StageConfig::default());
        assert_eq!(configs.len(), 125);
        assert_eq!(configs[0].window_seconds, 0.1);
        assert_eq!(configs[0].co_detection_window_seconds, 0.02);
        assert_eq!(configs[1].co_detection_window_seconds, 0.05);
        assert_eq!(configs[124].power_ratio_threshold, 0.9);
    }

    #[test]
    fn combinations_keep_base_constants() {
        let mut base = StageConfig::default();
        base.zeroing_samples = 7;
        let grid = SweepGrid {
            window_seconds: vec![1.0],
            power_ratio_threshold: vec![0.5],
            co_detection_window_seconds: vec![0.1],
        };
        assert_eq!(grid.combinations(&base)[0].zeroing_samples, 7);
    }

    #[test]
    fn sweep_isolates_invalid_combinations() {
        let series = Arc::new(build_vacuum_series(11).unwrap());
        let grid = SweepGrid {
            window_seconds: vec![1.0],
            power_ratio_threshold: vec![0.5, 1.5],
            co_detection_window_seconds: vec![0.15],
        };
        let rows = run_sweep(series, &grid, &StageConfig::default(), Execution::Sequential)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].detected_vacuum());
        assert!(rows[1].error.is_some());
        let summary = SweepSummary::from_rows(&rows);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.with_vacuum, 1);
    }
}
