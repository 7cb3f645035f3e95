use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for reuse across windows of one size.
pub struct FftHelper {
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex64::zero(); fft.get_inplace_scratch_len()];
        let buffer = vec![Complex64::zero(); size];
        Self {
            fft,
            buffer,
            scratch,
        }
    }

    /// Transforms a real segment, zero-padding or truncating it to the planned size.
    pub fn forward(&mut self, input: &[f64]) -> &[Complex64] {
        for (slot, value) in self.buffer.iter_mut().zip(
            input
                .iter()
                .copied()
                .chain(std::iter::repeat(0.0)),
        ) {
            *slot = Complex64::new(value, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        &self.buffer
    }
}

/// One-sided amplitude spectrum of a `window`-point transform.
///
/// Bins are scaled by `1/window` and every bin except the first and last is
/// doubled to fold in the negative-frequency half.
pub fn one_sided_amplitude(spectrum: &[Complex64], window: usize) -> Vec<f64> {
    let bins = window / 2 + 1;
    let scale = window as f64;
    let mut amplitudes: Vec<f64> = spectrum
        .iter()
        .take(bins)
        .map(|c| c.norm() / scale)
        .collect();
    let last = amplitudes.len().saturating_sub(1);
    for amplitude in amplitudes.iter_mut().take(last).skip(1) {
        *amplitude *= 2.0;
    }
    amplitudes
}
