use crate::ingest::table::load_table;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;
use vacuumcore::report::DetectionReport;
use vacuumcore::{detect_with, ChannelSeries, DetectionOutcome};

pub struct WorkflowResult {
    pub outcome: DetectionOutcome,
    pub report: DetectionReport,
}

/// Per-unit summary kept by batch runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitSummary {
    pub source: String,
    pub vacuum_events: usize,
    pub sinusoid_detections: usize,
    pub first_vacuum_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitFailure {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub with_vacuum: usize,
    pub without_vacuum: usize,
    pub results: Vec<UnitSummary>,
    pub failures: Vec<UnitFailure>,
}

impl BatchSummary {
    pub fn total_detections(&self) -> usize {
        self.results.iter().map(|r| r.sinusoid_detections).sum()
    }
}

/// Runs independent units on blocking worker threads.
///
/// Results come back in submission order. A unit that errors or panics is
/// reported as `Err(message)` without affecting the others.
pub fn run_isolated<T, F>(units: Vec<(String, F)>) -> anyhow::Result<Vec<(String, Result<T, String>)>>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for batch execution")?;

    let outcomes = runtime.block_on(async move {
        let handles: Vec<_> = units
            .into_iter()
            .map(|(label, unit)| (label, tokio::task::spawn_blocking(unit)))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (label, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(format!("{:#}", err)),
                Err(join_err) => Err(format!("worker failed: {}", join_err)),
            };
            outcomes.push((label, outcome));
        }
        outcomes
    });
    Ok(outcomes)
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, source: &str, series: &ChannelSeries) -> anyhow::Result<WorkflowResult> {
        let outcome = detect_with(series, &self.config.detector, self.config.execution())
            .with_context(|| format!("running detection on {}", source))?;
        let report = DetectionReport::new(source, &self.config.detector, &outcome);
        Ok(WorkflowResult { outcome, report })
    }

    pub fn execute_file(&self, path: &Path) -> anyhow::Result<WorkflowResult> {
        let series = load_table(path)?;
        self.execute(&path.display().to_string(), &series)
    }

    /// Processes every file, recording failures instead of stopping.
    pub fn run_batch(&self, files: &[PathBuf]) -> anyhow::Result<BatchSummary> {
        let units = files
            .iter()
            .map(|path| {
                let runner = self.clone();
                let path = path.clone();
                let label = path.display().to_string();
                let unit = move || -> anyhow::Result<UnitSummary> {
                    let result = runner.execute_file(&path)?;
                    Ok(UnitSummary {
                        source: label_of(&path),
                        vacuum_events: result.outcome.vacuum_events.len(),
                        sinusoid_detections: result.outcome.total_detections(),
                        first_vacuum_time: result.outcome.vacuum_events.first().map(|e| e.timestamp),
                    })
                };
                (label, unit)
            })
            .collect();

        let mut summary = BatchSummary {
            total: files.len(),
            ..Default::default()
        };
        for (position, (label, outcome)) in run_isolated(units)?.into_iter().enumerate() {
            match outcome {
                Ok(unit) => {
                    info!(
                        "{}/{} {}: {} vacuum events, {} sinusoidal detections",
                        position + 1,
                        files.len(),
                        unit.source,
                        unit.vacuum_events,
                        unit.sinusoid_detections
                    );
                    summary.successful += 1;
                    if unit.vacuum_events > 0 {
                        summary.with_vacuum += 1;
                    } else {
                        summary.without_vacuum += 1;
                    }
                    summary.results.push(unit);
                }
                Err(message) => {
                    warn!("{}/{} {} failed: {}", position + 1, files.len(), label, message);
                    summary.failures.push(UnitFailure {
                        source: label,
                        message,
                    });
                }
            }
        }
        Ok(summary)
    }
}

fn label_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_vacuum_series;
    use std::fs;
    use tempfile::tempdir;

    fn write_series(path: &Path, series: &ChannelSeries) {
        let mut table = String::from("timestamp,weight_1,weight_2,weight_3,weight_4\n");
        for (row, t) in series.timestamps().iter().enumerate() {
            let values = series.values().row(row);
            table.push_str(&format!(
                "{},{},{},{},{}\n",
                t, values[0], values[1], values[2], values[3]
            ));
        }
        fs::write(path, table).unwrap();
    }

    #[test]
    fn runner_executes_synthetic_series() {
        let cfg = WorkflowConfig::from_args(1.0, 0.5, 0.15);
        let runner = Runner::new(cfg);
        let series = build_vacuum_series(5).unwrap();
        let result = runner.execute("synthetic", &series).unwrap();
        assert!(result.outcome.has_vacuum_events());
        assert_eq!(
            result.report.vacuum_event_count,
            result.outcome.vacuum_events.len()
        );
    }

    type Unit = Box<dyn FnOnce() -> anyhow::Result<u32> + Send>;

    fn unit(label: &str, work: Unit) -> (String, Unit) {
        (label.to_string(), work)
    }

    #[test]
    fn isolated_units_survive_failures_and_panics() {
        let units = vec![
            unit("ok", Box::new(|| -> anyhow::Result<u32> { Ok(1) })),
            unit("err", Box::new(|| -> anyhow::Result<u32> { anyhow::bail!("bad input") })),
            unit("panic", Box::new(|| -> anyhow::Result<u32> { panic!("boom") })),
            unit("ok2", Box::new(|| -> anyhow::Result<u32> { Ok(2) })),
        ];
        let outcomes = run_isolated(units).unwrap();
        assert_eq!(outcomes[0].1, Ok(1));
        assert_eq!(outcomes[1].1, Err("bad input".to_string()));
        assert!(outcomes[2].1.is_err());
        assert_eq!(outcomes[3].1, Ok(2));
    }

    #[test]
    fn batch_records_bad_file_and_continues() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("a_good.csv");
        let bad = dir.path().join("b_bad.csv");
        write_series(&good, &build_vacuum_series(2).unwrap());
        fs::write(&bad, "timestamp,weight_1\n0,1\n").unwrap();

        let runner = Runner::new(WorkflowConfig::from_args(1.0, 0.5, 0.15));
        let summary = runner.run_batch(&[good, bad]).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.with_vacuum, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].source.ends_with("b_bad.csv"));
        assert_eq!(summary.results[0].source, "a_good.csv");
    }
}
