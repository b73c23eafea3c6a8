//! Seams between the playback core and its collaborators.

use async_trait::async_trait;

use crate::{Result, Track};

/// Turns a user-supplied locator into a locally playable track.
///
/// Implementations may hit the network or disk; callers must not hold locks
/// across `resolve`.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Fails with [`crate::Error::Resolution`] when the locator is invalid or
    /// the source is unreachable.
    async fn resolve(&self, locator: &str) -> Result<Track>;
}
