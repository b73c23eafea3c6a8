//! Track type representing a single playable song.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A resolved track: where it came from and where its audio lives locally.
///
/// Tracks are immutable once the resolver has produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Track {
    /// `YouTube` video ID, used as the cache key.
    pub video_id: String,
    /// The URL the user asked for.
    pub locator: String,
    /// Local encoded audio file ready to stream.
    pub resource: PathBuf,
}

impl Track {
    pub fn new(
        video_id: impl Into<String>,
        locator: impl Into<String>,
        resource: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            locator: locator.into(),
            resource: resource.into(),
        }
    }

    /// Get the local resource path.
    pub fn resource(&self) -> &Path {
        &self.resource
    }

    /// Canonical watch URL for the video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}
