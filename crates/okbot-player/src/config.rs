//! Playback configuration.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct PlayerConfig {
    /// Longest a single stream may run before it is treated as failed.
    /// `None` waits for the transport indefinitely.
    pub stream_timeout: Option<Duration>,
}

impl PlayerConfig {
    #[must_use]
    pub const fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }
}
