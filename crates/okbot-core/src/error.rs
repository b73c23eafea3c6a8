//! Error types for okbot.

use thiserror::Error;

/// Result type alias using okbot's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for okbot.
#[derive(Error, Debug)]
pub enum Error {
    // Playback errors
    #[error("Could not resolve track: {0}")]
    Resolution(String),

    #[error("Could not join voice channel: {0}")]
    TransportJoin(String),

    #[error("Voice stream failed: {0}")]
    TransportStream(String),

    #[error("{0}")]
    InvalidState(#[from] InvalidState),

    #[error("No voice channel to play into")]
    NoVoiceChannel,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An operation was requested in a playback state that forbids it.
///
/// The display strings are shown to users as-is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    #[error("nothing is playing")]
    NothingPlaying,

    #[error("not paused")]
    NotPaused,

    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Returns true if the failure happened while talking to the voice transport.
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::TransportJoin(_) | Self::TransportStream(_))
    }
}
