use crate::math::fft::{one_sided_amplitude, FftHelper};
use crate::model::DetectionRecord;
use crate::prelude::{
    ProcessingStage, StageConfig, StageError, StageInput, StageMetadata, StageOutput, StageResult,
};
use crate::telemetry::log::LogManager;

/// Guards the power ratio against all-zero windows.
const RATIO_EPSILON: f64 = 1e-12;

/// Smallest analysis window that still has a center and a non-DC bin.
const MIN_WINDOW_SAMPLES: usize = 3;

/// Window length in samples for `window_seconds` at `sample_rate`.
///
/// Rounded to the nearest sample, raised to at least three samples and bumped
/// to the next odd count so every window is symmetric around its center.
pub fn window_samples(window_seconds: f64, sample_rate: f64) -> usize {
    let rounded = (window_seconds * sample_rate).round().max(0.0) as usize;
    let clamped = rounded.max(MIN_WINDOW_SAMPLES);
    if clamped % 2 == 0 {
        clamped + 1
    } else {
        clamped
    }
}

/// Dominant non-DC component of one analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPeak {
    pub bin: usize,
    pub amplitude: f64,
    pub power_ratio: f64,
    pub phase_rad: f64,
}

/// Sliding-window dominant-frequency detector for a single channel.
pub struct SpectralDetector {
    /// Planned on the first evaluated window, so oversized windows never allocate.
    fft: Option<FftHelper>,
    window: usize,
    sample_rate: f64,
    power_ratio_threshold: f64,
    amplitude_floor: f64,
    min_gap_samples: usize,
}

impl SpectralDetector {
    pub fn new(
        sample_rate: f64,
        window_seconds: f64,
        power_ratio_threshold: f64,
        amplitude_floor: f64,
        min_gap_seconds: f64,
    ) -> Self {
        let window = window_samples(window_seconds, sample_rate);
        let min_gap_samples = (min_gap_seconds * sample_rate).round().max(0.0) as usize;
        Self {
            fft: None,
            window,
            sample_rate,
            power_ratio_threshold,
            amplitude_floor,
            min_gap_samples,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn min_gap_samples(&self) -> usize {
        self.min_gap_samples
    }

    pub fn bin_width_hz(&self) -> f64 {
        self.sample_rate / self.window as f64
    }

    /// Spectral peak of a segment of exactly `window()` samples.
    pub fn analyze(&mut self, segment: &[f64]) -> WindowPeak {
        let window = self.window;
        let spectrum = self
            .fft
            .get_or_insert_with(|| FftHelper::new(window))
            .forward(segment);
        let mut amplitudes = one_sided_amplitude(spectrum, window);
        amplitudes[0] = 0.0;

        let (bin, amplitude) = amplitudes
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (bin, value)| {
                if value > best.1 {
                    (bin, value)
                } else {
                    best
                }
            });
        let total: f64 = amplitudes.iter().sum();

        WindowPeak {
            bin,
            amplitude,
            power_ratio: amplitude / (total + RATIO_EPSILON),
            phase_rad: spectrum[bin].arg(),
        }
    }

    /// Scans `signal` left to right and returns the accepted detections.
    ///
    /// Also returns how many windows were actually transformed.
    pub fn scan(
        &mut self,
        channel: usize,
        signal: &[f64],
        timestamps: &[f64],
    ) -> (Vec<DetectionRecord>, usize) {
        let half = self.window / 2;
        let mut detections = Vec::new();
        let mut evaluated = 0;
        if signal.len() < self.window {
            return (detections, evaluated);
        }

        let mut last_accepted: Option<usize> = None;
        for center in half..signal.len() - half {
            if let Some(last) = last_accepted {
                if center - last < self.min_gap_samples {
                    continue;
                }
            }

            let peak = self.analyze(&signal[center - half..=center + half]);
            evaluated += 1;
            if peak.power_ratio > self.power_ratio_threshold && peak.amplitude > self.amplitude_floor
            {
                let frequency = peak.bin as f64 * self.bin_width_hz();
                detections.push(
                    DetectionRecord::new(
                        channel,
                        center,
                        timestamps[center],
                        frequency,
                        peak.phase_rad,
                    )
                    .with_spectrum(peak.power_ratio, peak.amplitude),
                );
                last_accepted = Some(center);
            }
        }

        (detections, evaluated)
    }
}

/// Spectral detection stage producing one channel's detection list.
pub struct SpectralStage {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl SpectralStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new(),
        }
    }
}

impl Default for SpectralStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for SpectralStage {
    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: StageInput) -> StageResult<StageOutput> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        if input.samples.len() != input.timestamps.len() {
            return Err(StageError::LengthMismatch {
                channel: input.channel,
                expected: input.timestamps.len(),
                found: input.samples.len(),
            });
        }
        if !(input.sample_rate.is_finite() && input.sample_rate > 0.0) {
            return Err(StageError::InvalidSampleRate(input.sample_rate));
        }

        let mut detector = SpectralDetector::new(
            input.sample_rate,
            config.window_seconds,
            config.power_ratio_threshold,
            config.amplitude_floor,
            config.co_detection_window_seconds,
        );
        let (detections, evaluated) =
            detector.scan(input.channel, &input.samples, &input.timestamps);
        self.logger.trace(&format!(
            "channel {} evaluated {} windows, {} detections",
            input.channel + 1,
            evaluated,
            detections.len()
        ));

        let metadata = StageMetadata {
            windows_evaluated: Some(evaluated),
            notes: vec![format!(
                "window {} samples, min gap {} samples",
                detector.window(),
                detector.min_gap_samples()
            )],
            detections,
            ..Default::default()
        };

        Ok(StageOutput {
            samples: input.samples,
            metadata,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
