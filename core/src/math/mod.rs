pub mod fft;
pub mod stats;

pub use fft::{one_sided_amplitude, FftHelper};
pub use stats::StatsHelper;
