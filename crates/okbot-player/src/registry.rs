//! Guild → playback session map.

use std::sync::Arc;

use dashmap::DashMap;
use okbot_core::{ChannelKey, GuildKey, InvalidState, Result, TrackResolver};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::events::PlayerEvent;
use crate::queue::QueueSnapshot;
use crate::session::{Enqueued, PlaybackSession};
use crate::transport::VoiceGateway;

/// Owns every guild's [`PlaybackSession`].
///
/// Sessions are created by the first enqueue in a guild and torn down by
/// [`disconnect`](Self::disconnect).
pub struct SessionRegistry {
    sessions: DashMap<GuildKey, Arc<PlaybackSession>>,
    resolver: Arc<dyn TrackResolver>,
    gateway: Arc<dyn VoiceGateway>,
    config: PlayerConfig,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl SessionRegistry {
    /// Create a registry and the receiver for its sessions' events.
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        gateway: Arc<dyn VoiceGateway>,
        config: PlayerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            sessions: DashMap::new(),
            resolver,
            gateway,
            config,
            events,
        };
        (registry, receiver)
    }

    pub fn session(&self, guild: GuildKey) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild).map(|s| Arc::clone(&s))
    }

    fn session_or_create(&self, guild: GuildKey) -> Arc<PlaybackSession> {
        let session = self.sessions.entry(guild).or_insert_with(|| {
            debug!("[{guild}] Creating playback session");
            PlaybackSession::new(
                guild,
                Arc::clone(&self.gateway),
                self.config.clone(),
                self.events.clone(),
            )
        });
        Arc::clone(&session)
    }

    /// Drop `session` from the map unless it was already replaced.
    fn forget(&self, guild: GuildKey, session: &Arc<PlaybackSession>) {
        self.sessions
            .remove_if(&guild, |_, current| Arc::ptr_eq(current, session));
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Resolve `locator`, make sure the bot is in voice, and queue the track.
    ///
    /// `channel` is the caller's voice channel, if they are in one. Nothing
    /// is queued when resolution or joining fails.
    pub async fn enqueue(
        &self,
        guild: GuildKey,
        channel: Option<ChannelKey>,
        locator: &str,
    ) -> Result<Enqueued> {
        let track = self.resolver.resolve(locator).await?;

        loop {
            let session = self.session_or_create(guild);
            if session.is_closed() {
                self.forget(guild, &session);
                continue;
            }

            if let Err(e) = session.connect(channel).await {
                if session.is_closed() {
                    self.forget(guild, &session);
                    continue;
                }
                return Err(e);
            }

            match session.push(track.clone()) {
                Some(outcome) => {
                    info!("[{guild}] Enqueued {}", track.video_id);
                    return Ok(outcome);
                }
                // Disconnected while we were joining; start over with a fresh session.
                None => self.forget(guild, &session),
            }
        }
    }

    /// Current track and pending tracks. Empty for guilds without a session.
    pub fn list(&self, guild: GuildKey) -> QueueSnapshot {
        self.session(guild)
            .map(|s| s.snapshot())
            .unwrap_or_default()
    }

    pub fn skip(&self, guild: GuildKey) -> Result<()> {
        self.session(guild)
            .ok_or(InvalidState::NothingPlaying)?
            .skip()
    }

    pub fn stop(&self, guild: GuildKey) -> Result<()> {
        self.session(guild)
            .ok_or(InvalidState::NothingPlaying)?
            .stop()
    }

    pub fn resume(&self, guild: GuildKey) -> Result<()> {
        self.session(guild)
            .ok_or(InvalidState::NotPaused)?
            .resume()
    }

    /// Clear the guild's queue, stop playback and leave voice.
    pub async fn disconnect(&self, guild: GuildKey) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(&guild)
            .ok_or(InvalidState::NotConnected)?;
        session.disconnect().await
    }

    /// Disconnect every session.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildKey> = self.sessions.iter().map(|e| *e.key()).collect();
        for guild in guilds {
            if let Err(e) = self.disconnect(guild).await {
                debug!("[{guild}] Shutdown disconnect: {e}");
            }
        }
        info!("All playback sessions closed");
    }
}
