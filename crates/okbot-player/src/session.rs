//! Per-guild playback session and its playback loop.
//!
//! The session state lives in the [`PlaybackQueue`] mutex. Commands change
//! that state and then publish a [`Control`] tag on a watch channel, both
//! under the lock. The loop task only ever decides what to do next from the
//! state, and uses the watch channel to be woken:
//!
//! ```text
//! Idle ──enqueue──▶ Playing ──stop──▶ Paused ──resume──▶ Playing
//!   ▲                 │ ▲                                  │
//!   │                 │ └──────── skip / track end ────────┘
//!   └──queue empty────┘
//! ```
//!
//! Only one loop task exists per session at a time; `loop_active` in the
//! queue state is claimed under the lock before a task is spawned and
//! released under the lock when the loop decides to exit.

use std::sync::Arc;

use okbot_core::{ChannelKey, Error, GuildKey, InvalidState, Result, Track};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::events::PlayerEvent;
use crate::queue::{PlaybackQueue, PlaybackStatus, QueueSnapshot, QueueState};
use crate::transport::{VoiceConnection, VoiceGateway};

/// Wake-up reason published to the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Skip,
    Pause,
    Resume,
    Disconnect,
}

/// Why a playback loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The queue ran out of tracks.
    Drained,
    /// The session was disconnected.
    Disconnected,
}

/// Outcome of adding a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Nothing was playing; a playback loop was started for this track.
    NowPlaying(Track),
    /// Added behind other tracks, at this 1-based position.
    Queued { track: Track, position: usize },
}

impl Enqueued {
    pub const fn track(&self) -> &Track {
        match self {
            Self::NowPlaying(track) | Self::Queued { track, .. } => track,
        }
    }
}

enum Step {
    Play(Track),
    Wait,
    Exit(LoopExit),
}

enum Cycle {
    Finished,
    Failed(Error),
    Interrupted(Option<Control>),
}

#[derive(Default)]
struct Transport {
    /// Channel to (re)join when no usable connection exists.
    channel: Option<ChannelKey>,
    connection: Option<Arc<dyn VoiceConnection>>,
    /// Set by disconnect. No join happens afterwards.
    closed: bool,
}

/// Playback state and voice connection for one guild.
pub struct PlaybackSession {
    guild: GuildKey,
    queue: PlaybackQueue,
    control: watch::Sender<Option<Control>>,
    transport: AsyncMutex<Transport>,
    gateway: Arc<dyn VoiceGateway>,
    config: PlayerConfig,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlaybackSession {
    pub fn new(
        guild: GuildKey,
        gateway: Arc<dyn VoiceGateway>,
        config: PlayerConfig,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Arc<Self> {
        let (control, _) = watch::channel(None);
        Arc::new(Self {
            guild,
            queue: PlaybackQueue::new(),
            control,
            transport: AsyncMutex::new(Transport::default()),
            gateway,
            config,
            events,
        })
    }

    pub const fn guild(&self) -> GuildKey {
        self.guild
    }

    pub const fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn status(&self) -> PlaybackStatus {
        self.queue.status()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    /// Make sure a voice connection exists, joining `channel` if needed.
    ///
    /// A given channel is remembered for later reconnects. Without one, the
    /// previously remembered channel is used.
    pub async fn connect(&self, channel: Option<ChannelKey>) -> Result<()> {
        self.connection(channel).await.map(|_| ())
    }

    async fn connection(&self, channel: Option<ChannelKey>) -> Result<Arc<dyn VoiceConnection>> {
        let mut transport = self.transport.lock().await;
        if transport.closed {
            return Err(InvalidState::NotConnected.into());
        }
        if channel.is_some() {
            transport.channel = channel;
        }

        if let Some(connection) = &transport.connection {
            if connection.is_connected().await {
                return Ok(Arc::clone(connection));
            }
            warn!("[{}] Voice connection lost, rejoining", self.guild);
        }

        let channel = transport.channel.ok_or(Error::NoVoiceChannel)?;
        let connection = self.gateway.join(self.guild, channel).await?;
        info!("[{}] Joined voice channel {channel}", self.guild);
        transport.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Append a resolved track, starting the playback loop if none is
    /// running. Returns `None` if the session was disconnected meanwhile.
    ///
    /// A track that starts a loop becomes the current, playing track before
    /// this returns.
    pub fn push(self: &Arc<Self>, track: Track) -> Option<Enqueued> {
        let mut state = self.queue.lock();
        if state.closed {
            return None;
        }

        if state.loop_active {
            state.add(track.clone());
            let position = state.tracks.len();
            debug!("[{}] Queued {} at {position}", self.guild, track.video_id);
            return Some(Enqueued::Queued { track, position });
        }

        state.set_current(Some(track.clone()));
        state.set_playing(true);
        state.loop_active = true;
        self.spawn_loop();
        Some(Enqueued::NowPlaying(track))
    }

    /// Interrupt the current stream and advance to the next track.
    pub fn skip(&self) -> Result<()> {
        let mut state = self.queue.lock();
        if !state.playing {
            return Err(InvalidState::NothingPlaying.into());
        }
        state.set_playing(false);
        self.signal(Control::Skip);
        info!("[{}] Skip requested", self.guild);
        Ok(())
    }

    /// Interrupt the current stream and hold the track for [`resume`](Self::resume).
    pub fn stop(&self) -> Result<()> {
        let mut state = self.queue.lock();
        if !state.playing {
            return Err(InvalidState::NothingPlaying.into());
        }
        state.set_paused(true);
        self.signal(Control::Pause);
        info!("[{}] Stop requested", self.guild);
        Ok(())
    }

    /// Restream the held track from the beginning.
    pub fn resume(self: &Arc<Self>) -> Result<()> {
        let mut state = self.queue.lock();
        if !state.paused {
            return Err(InvalidState::NotPaused.into());
        }
        state.set_playing(true);
        self.signal(Control::Resume);
        if !state.loop_active {
            state.loop_active = true;
            self.spawn_loop();
        }
        info!("[{}] Resume requested", self.guild);
        Ok(())
    }

    /// Clear everything, stop the loop and leave the voice channel.
    ///
    /// The session cannot be used afterwards.
    pub async fn disconnect(&self) -> Result<()> {
        let was_active = {
            let mut state = self.queue.lock();
            let was_active =
                state.loop_active || state.current.is_some() || !state.tracks.is_empty();
            state.clear();
            state.set_current(None);
            state.closed = true;
            self.signal(Control::Disconnect);
            was_active
        };

        let connection = {
            let mut transport = self.transport.lock().await;
            transport.closed = true;
            transport.channel = None;
            transport.connection.take()
        };

        match connection {
            Some(connection) => {
                connection.abort().await;
                if let Err(e) = connection.leave().await {
                    warn!("[{}] Failed to leave voice channel: {e}", self.guild);
                }
            }
            None if was_active => {}
            None => return Err(InvalidState::NotConnected.into()),
        }

        info!("[{}] Disconnected", self.guild);
        self.emit(PlayerEvent::Disconnected { guild: self.guild });
        Ok(())
    }

    /// Publish a wake-up tag. Callers hold the queue lock.
    fn signal(&self, control: Control) {
        self.control.send_replace(Some(control));
    }

    fn spawn_loop(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let control = self.control.subscribe();
        tokio::spawn(async move {
            let exit = session.run(control).await;
            debug!("[{}] Playback loop exited: {exit:?}", session.guild);
        });
    }

    fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            debug!("[{}] No event listener", self.guild);
        }
    }

    async fn run(&self, mut control: watch::Receiver<Option<Control>>) -> LoopExit {
        info!("[{}] Playback loop started", self.guild);

        let exit = loop {
            let step = {
                let mut state = self.queue.lock();
                control.mark_unchanged();
                next_step(&mut state)
            };

            let track = match step {
                Step::Play(track) => track,
                Step::Wait => {
                    debug!("[{}] Paused, waiting", self.guild);
                    if control.changed().await.is_err() {
                        break LoopExit::Disconnected;
                    }
                    continue;
                }
                Step::Exit(exit) => break exit,
            };

            match self.play(&track, &mut control).await {
                Cycle::Finished => {
                    info!("[{}] Finished {}", self.guild, track.video_id);
                    settle_finished(&mut self.queue.lock());
                    self.emit(PlayerEvent::TrackFinished {
                        guild: self.guild,
                        track,
                    });
                }
                Cycle::Failed(_) if self.is_closed() => {
                    debug!("[{}] {} dropped by disconnect", self.guild, track.video_id);
                    self.emit(PlayerEvent::TrackStopped {
                        guild: self.guild,
                        track,
                        by: Some(Control::Disconnect),
                    });
                }
                Cycle::Failed(e) => {
                    warn!("[{}] Playback of {} failed: {e}", self.guild, track.video_id);
                    settle_finished(&mut self.queue.lock());
                    self.emit(PlayerEvent::TrackFailed {
                        guild: self.guild,
                        track,
                        reason: e.to_string(),
                    });
                }
                Cycle::Interrupted(by) => {
                    debug!("[{}] {} interrupted by {by:?}", self.guild, track.video_id);
                    self.emit(PlayerEvent::TrackStopped {
                        guild: self.guild,
                        track,
                        by,
                    });
                }
            }
        };

        if exit == LoopExit::Drained {
            info!("[{}] Queue empty, going idle", self.guild);
            self.emit(PlayerEvent::Idle { guild: self.guild });
        }
        exit
    }

    /// One stream cycle: connect, stream, and wait for the end or a command.
    async fn play(
        &self,
        track: &Track,
        control: &mut watch::Receiver<Option<Control>>,
    ) -> Cycle {
        let connection = match self.connection(None).await {
            Ok(connection) => connection,
            Err(e) => return Cycle::Failed(e),
        };

        let completion = match connection.stream(track.resource()).await {
            Ok(completion) => completion,
            Err(e) => return Cycle::Failed(e),
        };

        info!("[{}] Now playing {}", self.guild, track.video_id);
        self.emit(PlayerEvent::TrackStarted {
            guild: self.guild,
            track: track.clone(),
        });

        let finished = async {
            match self.config.stream_timeout {
                Some(limit) => tokio::time::timeout(limit, completion.wait())
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::TransportStream(format!(
                            "stream timed out after {}s",
                            limit.as_secs()
                        )))
                    }),
                None => completion.wait().await,
            }
        };

        tokio::select! {
            result = finished => match result {
                Ok(()) => Cycle::Finished,
                Err(e) => {
                    connection.abort().await;
                    Cycle::Failed(e)
                }
            },
            changed = control.changed() => {
                let by = if changed.is_ok() { *control.borrow_and_update() } else { None };
                connection.abort().await;
                Cycle::Interrupted(by)
            }
        }
    }
}

/// Decide the loop's next move from the state alone.
fn next_step(state: &mut QueueState) -> Step {
    if state.closed {
        state.loop_active = false;
        return Step::Exit(LoopExit::Disconnected);
    }
    if state.paused {
        return Step::Wait;
    }

    // A current track that is no longer playing was skipped.
    if state.current.is_some() && !state.playing {
        state.set_current(None);
    }
    // A current track that is still playing was resumed.
    if let Some(track) = &state.current {
        return Step::Play(track.clone());
    }

    match state.next() {
        Some(track) => {
            state.set_current(Some(track.clone()));
            state.set_playing(true);
            Step::Play(track)
        }
        None => {
            state.loop_active = false;
            Step::Exit(LoopExit::Drained)
        }
    }
}

/// The stream ended by itself. A stop that raced the end keeps the track.
fn settle_finished(state: &mut QueueState) {
    if !state.paused {
        state.set_current(None);
    }
}
