use crate::model::DetectionRecord;

/// One detection instant on the merged, chronologically sorted timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEntry {
    pub timestamp: f64,
    pub channel: usize,
    /// Index into the source channel's detection list.
    pub local_index: usize,
}

/// Merges every channel's detections into one timeline.
///
/// Channels are concatenated in order and stable-sorted by timestamp, so ties
/// keep their emission order.
pub fn align<L: AsRef<[DetectionRecord]>>(per_channel: &[L]) -> Vec<TimelineEntry> {
    let mut timeline: Vec<TimelineEntry> = per_channel
        .iter()
        .enumerate()
        .flat_map(|(channel, detections)| {
            detections
                .as_ref()
                .iter()
                .enumerate()
                .map(move |(local_index, record)| TimelineEntry {
                    timestamp: record.timestamp,
                    channel,
                    local_index,
                })
        })
        .collect();
    timeline.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    timeline
}
