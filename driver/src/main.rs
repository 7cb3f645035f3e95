use anyhow::Context;
use clap::{ArgGroup, Parser};
use generator::profile::build_series_from_config;
use ingest::table::{list_tables, load_table};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use workflow::config::{Overrides, WorkflowConfig};
use workflow::runner::{BatchSummary, Runner};
use workflow::sweep::{run_sweep, SweepSummary};

mod generator;
mod ingest;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Vacuum event detection for 4-cell weight recordings")]
#[command(group(ArgGroup::new("input").required(true).args(["file", "folder", "synthetic"])))]
struct Args {
    /// Delimited weight table with timestamp and weight_1..weight_4 columns
    #[arg(long)]
    file: Option<PathBuf>,
    /// Process every .csv/.txt table in a folder
    #[arg(long)]
    folder: Option<PathBuf>,
    /// Analyze a generated shelf recording instead of a file
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Run the parameter grid on the selected single input
    #[arg(long, default_value_t = false, conflicts_with = "folder")]
    sweep: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    window_seconds: Option<f64>,
    #[arg(long)]
    power_ratio: Option<f64>,
    #[arg(long)]
    co_detection: Option<f64>,
    #[arg(long)]
    zeroing_samples: Option<usize>,
    /// Process the four channels on parallel workers
    #[arg(long, default_value_t = false)]
    parallel: bool,
    /// Write the JSON report (or sweep table) to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report folder {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value).context("serializing report")?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    println!("Saved report to {}", path.display());
    Ok(())
}

fn print_batch(summary: &BatchSummary, config: &WorkflowConfig) {
    let percent = |count: usize| {
        if summary.total == 0 {
            0.0
        } else {
            count as f64 / summary.total as f64 * 100.0
        }
    };
    println!("Detection parameters:");
    println!("  window size          {:.2} s", config.detector.window_seconds);
    println!("  power ratio          {:.2}", config.detector.power_ratio_threshold);
    println!("  co-detection window  {:.2} s", config.detector.co_detection_window_seconds);
    println!("Files processed: {}", summary.total);
    println!(
        "  with vacuum effects     {} ({:.1}%)",
        summary.with_vacuum,
        percent(summary.with_vacuum)
    );
    println!(
        "  without vacuum effects  {} ({:.1}%)",
        summary.without_vacuum,
        percent(summary.without_vacuum)
    );
    println!("  failed                  {}", summary.failures.len());
    println!("  sinusoidal detections   {}", summary.total_detections());
    for failure in &summary.failures {
        println!("  ! {}: {}", failure.source, failure.message);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::default()
    };
    workflow_config.apply(&Overrides {
        window_seconds: args.window_seconds,
        power_ratio_threshold: args.power_ratio,
        co_detection_window_seconds: args.co_detection,
        zeroing_samples: args.zeroing_samples,
        parallel: args.parallel,
    });
    workflow_config
        .detector
        .validate()
        .context("validating detector parameters")?;

    let runner = Runner::new(workflow_config.clone());

    if let Some(folder) = &args.folder {
        let files = list_tables(folder)?;
        if files.is_empty() {
            anyhow::bail!("no weight tables found in {}", folder.display());
        }
        println!("Found {} files in {}", files.len(), folder.display());
        let summary = runner.run_batch(&files)?;
        print_batch(&summary, &workflow_config);
        if let Some(path) = &args.report {
            write_json(path, &summary)?;
        }
        return Ok(());
    }

    let (source, series) = if let Some(path) = &args.file {
        (path.display().to_string(), load_table(path)?)
    } else {
        let generator = workflow_config.generator.clone().unwrap_or_default();
        let series = build_series_from_config(&generator)?;
        let label = generator
            .description
            .clone()
            .unwrap_or_else(|| "synthetic".to_string());
        (label, series)
    };

    if args.sweep {
        let grid = workflow_config.sweep.clone().unwrap_or_default();
        let rows = run_sweep(
            Arc::new(series),
            &grid,
            &workflow_config.detector,
            workflow_config.execution(),
        )?;
        for row in &rows {
            match (&row.error, row.vacuum_events, row.sinusoid_detections) {
                (Some(err), _, _) => println!(
                    "win={:<5} thr={:<5} codet={:<5} error: {}",
                    row.window_seconds,
                    row.power_ratio_threshold,
                    row.co_detection_window_seconds,
                    err
                ),
                (None, events, detections) => println!(
                    "win={:<5} thr={:<5} codet={:<5} vacuum={} detections={}",
                    row.window_seconds,
                    row.power_ratio_threshold,
                    row.co_detection_window_seconds,
                    events.unwrap_or(0),
                    detections.unwrap_or(0)
                ),
            }
        }
        let summary = SweepSummary::from_rows(&rows);
        println!(
            "Sweep on {}: {} combinations, {} with vacuum events, {} failed",
            source, summary.combinations, summary.with_vacuum, summary.failed
        );
        if let Some(path) = &args.report {
            write_json(path, &rows)?;
        }
        return Ok(());
    }

    let result = runner.execute(&source, &series)?;
    println!(
        "{} -> fs {:.3} Hz, window {} samples, {} vacuum events, {} sinusoidal detections",
        source,
        result.outcome.sample_rate,
        result.outcome.window_samples,
        result.outcome.vacuum_events.len(),
        result.outcome.total_detections()
    );
    for event in &result.outcome.vacuum_events {
        println!(
            "  anti-phase (same frequency) at {:.3}s: {} and {}",
            event.timestamp, event.pairs[0], event.pairs[1]
        );
    }
    if let Some(path) = &args.report {
        write_json(path, &result.report)?;
    } else {
        let default_path = PathBuf::from("reports").join(format!(
            "{}_detections.json",
            workflow_config.parameter_tag()
        ));
        write_json(&default_path, &result.report)?;
    }

    Ok(())
}
