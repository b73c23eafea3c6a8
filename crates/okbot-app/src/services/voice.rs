//! Voice transport backed by songbird.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use okbot_core::{ChannelKey, Error, GuildKey, Result};
use okbot_player::{Completion, CompletionSender, VoiceConnection, VoiceGateway};
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId};
use songbird::events::{Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Songbird};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Joins voice channels through the shared songbird manager.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub const fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(&self, guild: GuildKey, channel: ChannelKey) -> Result<Arc<dyn VoiceConnection>> {
        let guild_id = GuildId::new(guild.0);
        let call = self
            .manager
            .join(guild_id, ChannelId::new(channel.0))
            .await
            .map_err(|e| Error::TransportJoin(e.to_string()))?;

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            manager: Arc::clone(&self.manager),
            call,
            track: Mutex::new(None),
        }))
    }
}

/// One guild's songbird call.
struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<AsyncMutex<Call>>,
    track: Mutex<Option<TrackHandle>>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn stream(&self, resource: &Path) -> Result<Completion> {
        let input = songbird::input::File::new(resource.to_path_buf());
        let handle = self.call.lock().await.play_input(input.into());

        let (sender, completion) = Completion::channel();
        let notifier = EndNotifier {
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| Error::TransportStream(e.to_string()))?;
        }

        *self.track.lock() = Some(handle);
        Ok(completion)
    }

    async fn abort(&self) {
        let Some(handle) = self.track.lock().take() else {
            return;
        };
        if let Err(e) = handle.stop() {
            debug!("Track for guild {} already gone: {e}", self.guild_id);
        }
    }

    async fn leave(&self) -> Result<()> {
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| Error::TransportJoin(e.to_string()))
    }
}

/// Completes the stream's [`Completion`] on the first end or error event.
#[derive(Clone)]
struct EndNotifier {
    sender: Arc<Mutex<Option<CompletionSender>>>,
}

#[async_trait]
impl VoiceEventHandler for EndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let sender = self.sender.lock().take()?;
        match ctx {
            EventContext::Track(tracks) => {
                let error = tracks.iter().find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(err) => Some(format!("{err:?}")),
                    _ => None,
                });
                match error {
                    Some(err) => {
                        warn!("Track errored: {err}");
                        sender.failed(err);
                    }
                    None => sender.finished(),
                }
            }
            _ => sender.finished(),
        }
        Some(Event::Cancel)
    }
}
