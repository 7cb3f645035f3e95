//! Detection core for vacuum events on load-cell shelves.
//!
//! Four weight channels are zeroed and spike-corrected, scanned for locally
//! dominant sinusoids, aligned on one timeline and classified: a vacuum event
//! is a moment where cells (1,4) and (2,3) both oscillate at a shared
//! frequency in opposite phase.

pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod report;
pub mod telemetry;

pub use model::{ChannelSeries, DetectionRecord, VacuumEvent};
pub use pipeline::{detect, detect_parallel, detect_with, DetectionOutcome, Execution};
pub use prelude::{ProcessingStage, StageConfig, StageError, StageInput, StageOutput, StageResult};
