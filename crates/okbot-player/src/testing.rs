//! In-memory resolver and voice transport for playback tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use okbot_core::{ChannelKey, Error, GuildKey, Result, Track, TrackResolver};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use crate::config::PlayerConfig;
use crate::events::PlayerEvent;
use crate::registry::SessionRegistry;
use crate::transport::{Completion, CompletionSender, VoiceConnection, VoiceGateway};

pub const GUILD: GuildKey = GuildKey(1);
pub const CHANNEL: ChannelKey = ChannelKey(10);

/// The track [`FakeResolver`] produces for `id`.
pub fn track(id: &str) -> Track {
    Track::new(id, id, format!("/songs/{id}.opus"))
}

/// Resolves any locator except those starting with `bad`.
pub struct FakeResolver;

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, locator: &str) -> Result<Track> {
        if locator.starts_with("bad") {
            return Err(Error::Resolution(format!("cannot resolve {locator}")));
        }
        Ok(track(locator))
    }
}

#[derive(Default)]
pub struct FakeGateway {
    fail_joins: AtomicBool,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    waiting: AtomicUsize,
}

impl FakeGateway {
    pub fn fail_joins(&self, fail: bool) {
        self.fail_joins.store(fail, Ordering::SeqCst);
    }

    /// Make every join wait for a permit on the returned semaphore.
    pub fn hold_joins(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Joins that reached the gate.
    pub fn waiting_joins(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn joins(&self) -> usize {
        self.connections.lock().len()
    }

    /// The connection opened by the `n`th successful join.
    pub fn connection(&self, n: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.connections.lock()[n])
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(&self, _guild: GuildKey, channel: ChannelKey) -> Result<Arc<dyn VoiceConnection>> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            gate.acquire().await.expect("join gate closed").forget();
        }
        if self.fail_joins.load(Ordering::SeqCst) {
            return Err(Error::TransportJoin(format!("channel {channel} refused")));
        }
        let connection = Arc::new(FakeConnection::new());
        self.connections.lock().push(Arc::clone(&connection));
        Ok(connection)
    }
}

/// Streams "play" until the test calls [`finish`](Self::finish) or
/// [`fail`](Self::fail).
pub struct FakeConnection {
    connected: AtomicBool,
    left: AtomicBool,
    aborts: AtomicUsize,
    streamed: Mutex<Vec<PathBuf>>,
    pending: Mutex<Option<CompletionSender>>,
}

impl FakeConnection {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            left: AtomicBool::new(false),
            aborts: AtomicUsize::new(0),
            streamed: Mutex::new(Vec::new()),
            pending: Mutex::new(None),
        }
    }

    pub fn finish(&self) {
        self.pending.lock().take().expect("no active stream").finished();
    }

    pub fn fail(&self, reason: &str) {
        self.pending.lock().take().expect("no active stream").failed(reason);
    }

    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }

    pub fn streamed(&self) -> Vec<PathBuf> {
        self.streamed.lock().clone()
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn stream(&self, resource: &Path) -> Result<Completion> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::TransportStream("not connected".to_string()));
        }
        let (sender, completion) = Completion::channel();
        self.streamed.lock().push(resource.to_path_buf());
        *self.pending.lock() = Some(sender);
        Ok(completion)
    }

    async fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().take();
    }

    async fn leave(&self) -> Result<()> {
        self.left.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub fn harness(
    config: PlayerConfig,
) -> (
    SessionRegistry,
    mpsc::UnboundedReceiver<PlayerEvent>,
    Arc<FakeGateway>,
) {
    let gateway = Arc::new(FakeGateway::default());
    let voice: Arc<dyn VoiceGateway> = gateway.clone();
    let (registry, events) = SessionRegistry::new(Arc::new(FakeResolver), voice, config);
    (registry, events, gateway)
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a player event")
        .expect("event channel closed")
}

/// Yield to other tasks until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition never held");
}

/// Flag invariants that must hold whenever the queue lock is free.
pub fn assert_invariants(registry: &SessionRegistry) {
    let Some(session) = registry.session(GUILD) else {
        return;
    };
    let state = session.queue().lock();
    assert!(!(state.playing && state.paused), "playing and paused at once");
    if state.playing || state.paused {
        assert!(state.current.is_some(), "playing or paused without a current track");
    }
}
