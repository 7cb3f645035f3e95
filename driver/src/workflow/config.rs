use crate::generator::profile::GeneratorConfig;
use crate::workflow::sweep::SweepGrid;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use vacuumcore::prelude::StageConfig;
use vacuumcore::Execution;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub detector: StageConfig,
    pub parallel: bool,
    pub sweep: Option<SweepGrid>,
    pub generator: Option<GeneratorConfig>,
}

/// Detector values given on the command line; they win over the YAML file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub window_seconds: Option<f64>,
    pub power_ratio_threshold: Option<f64>,
    pub co_detection_window_seconds: Option<f64>,
    pub zeroing_samples: Option<usize>,
    pub parallel: bool,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .detector
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn from_args(
        window_seconds: f64,
        power_ratio_threshold: f64,
        co_detection_window_seconds: f64,
    ) -> Self {
        Self {
            detector: StageConfig::with_parameters(
                window_seconds,
                power_ratio_threshold,
                co_detection_window_seconds,
            ),
            ..Default::default()
        }
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(value) = overrides.window_seconds {
            self.detector.window_seconds = value;
        }
        if let Some(value) = overrides.power_ratio_threshold {
            self.detector.power_ratio_threshold = value;
        }
        if let Some(value) = overrides.co_detection_window_seconds {
            self.detector.co_detection_window_seconds = value;
        }
        if let Some(value) = overrides.zeroing_samples {
            self.detector.zeroing_samples = value;
        }
        self.parallel |= overrides.parallel;
    }

    pub fn execution(&self) -> Execution {
        if self.parallel {
            Execution::Parallel
        } else {
            Execution::Sequential
        }
    }

    /// Compact parameter tag used to name report files.
    pub fn parameter_tag(&self) -> String {
        let tag = format!(
            "win_{}_thr_{:.2}_codet_{:.2}",
            self.detector.window_seconds,
            self.detector.power_ratio_threshold,
            self.detector.co_detection_window_seconds
        );
        tag.replace('.', "")
    }
}
