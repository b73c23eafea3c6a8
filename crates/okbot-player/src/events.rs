//! Notifications emitted by playback sessions.

use okbot_core::{GuildKey, Track};

use crate::session::Control;

/// Something a user may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TrackStarted { guild: GuildKey, track: Track },
    TrackFinished { guild: GuildKey, track: Track },
    /// The stream was cut short by a command.
    TrackStopped {
        guild: GuildKey,
        track: Track,
        by: Option<Control>,
    },
    TrackFailed {
        guild: GuildKey,
        track: Track,
        reason: String,
    },
    /// The queue ran dry and the loop exited.
    Idle { guild: GuildKey },
    Disconnected { guild: GuildKey },
}

impl PlayerEvent {
    pub const fn guild(&self) -> GuildKey {
        match self {
            Self::TrackStarted { guild, .. }
            | Self::TrackFinished { guild, .. }
            | Self::TrackStopped { guild, .. }
            | Self::TrackFailed { guild, .. }
            | Self::Idle { guild }
            | Self::Disconnected { guild } => *guild,
        }
    }
}
