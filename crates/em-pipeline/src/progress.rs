//! Progress reporting from a transcoder back to the runner.

/// Sender for whole-percent progress reports (0-100).
pub struct ProgressSender {
    callback: Box<dyn Fn(u8) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A sender that discards all reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    pub fn send(&self, progress: u8) {
        (self.callback)(progress.min(100));
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}
