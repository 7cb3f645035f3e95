pub mod aligner;
pub mod classifier;
pub mod conditioner;
pub mod spectral;

pub use aligner::{align, TimelineEntry};
pub use classifier::{ChannelInfo, ChannelObservation, VacuumClassifier};
pub use conditioner::{condition_channel, ConditionStage, ConditionedChannel};
pub use spectral::{window_samples, SpectralDetector, SpectralStage};
