pub mod detection;
pub mod series;

pub use detection::{ChannelContribution, DetectionRecord, SensorPair, VacuumEvent};
pub use series::ChannelSeries;
