use log::{debug, info, warn};

/// Thin front for the `log` facade used by every detection stage.
///
/// Run summaries go to `info`, per-channel stage notes to `debug`.
pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn trace(&self, message: &str) {
        debug!("{}", message);
    }

    /// Parameter adjustments the caller should know about, such as a widened window.
    pub fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
