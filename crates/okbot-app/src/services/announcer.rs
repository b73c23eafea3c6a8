//! Posts player events to the text channel music was last requested from.

use std::sync::Arc;

use dashmap::DashMap;
use okbot_core::GuildKey;
use okbot_player::PlayerEvent;
use serenity::all::{ChannelId, Http};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::commands::truncate;

/// Text channel per guild that announcements go to.
pub type AnnounceChannels = Arc<DashMap<GuildKey, ChannelId>>;

pub struct Announcer {
    http: Arc<Http>,
    channels: AnnounceChannels,
}

impl Announcer {
    pub const fn new(http: Arc<Http>, channels: AnnounceChannels) -> Self {
        Self { http, channels }
    }

    /// Forward events until every session sender is gone.
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<PlayerEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.announce(&event).await;
            }
            debug!("Player event stream closed");
        })
    }

    async fn announce(&self, event: &PlayerEvent) {
        let Some(text) = announcement(event) else {
            debug!("Player event: {event:?}");
            return;
        };

        let guild = event.guild();
        let Some(channel) = self.channels.get(&guild).map(|c| *c) else {
            debug!("[{guild}] No text channel to announce in");
            return;
        };

        if let Err(e) = channel.say(&self.http, text).await {
            warn!("[{guild}] Failed to post announcement: {e}");
        }
    }
}

/// User-facing text for an event, if it deserves one.
pub fn announcement(event: &PlayerEvent) -> Option<String> {
    let text = match event {
        PlayerEvent::TrackStarted { track, .. } => format!("Now playing <{}>", track.locator),
        PlayerEvent::TrackFailed { track, reason, .. } => {
            format!("Could not play <{}>: {reason}", track.locator)
        }
        PlayerEvent::Idle { .. } => "Finished playing the queue!".to_string(),
        PlayerEvent::TrackFinished { .. }
        | PlayerEvent::TrackStopped { .. }
        | PlayerEvent::Disconnected { .. } => return None,
    };
    Some(truncate(&text))
}

#[cfg(test)]
mod tests {
    use okbot_core::Track;

    use super::*;

    fn track() -> Track {
        Track::new("abc", "https://youtu.be/abc", "abc.opus")
    }

    #[test]
    fn test_announcements() {
        let guild = GuildKey(1);
        assert_eq!(
            announcement(&PlayerEvent::TrackStarted { guild, track: track() }).as_deref(),
            Some("Now playing <https://youtu.be/abc>")
        );
        assert_eq!(
            announcement(&PlayerEvent::TrackFailed {
                guild,
                track: track(),
                reason: "stream timed out after 600s".into()
            })
            .as_deref(),
            Some("Could not play <https://youtu.be/abc>: stream timed out after 600s")
        );
        assert!(announcement(&PlayerEvent::Idle { guild }).is_some());
        assert!(announcement(&PlayerEvent::TrackFinished { guild, track: track() }).is_none());
        assert!(announcement(&PlayerEvent::Disconnected { guild }).is_none());
    }
}
