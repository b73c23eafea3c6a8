//! # okbot-player
//!
//! Music playback coordination for okbot.
//!
//! - [`PlaybackQueue`]: FIFO of pending tracks plus the current-track slot,
//!   all behind one mutex
//! - [`PlaybackSession`]: the per-guild state machine and its single playback
//!   loop task
//! - [`SessionRegistry`]: guild → session map and the operations the command
//!   router calls
//!
//! Audio acquisition and the voice connection are reached through the
//! [`TrackResolver`](okbot_core::TrackResolver), [`VoiceGateway`] and
//! [`VoiceConnection`] traits.

pub mod config;
pub mod events;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::PlayerConfig;
pub use events::PlayerEvent;
pub use queue::{PlaybackQueue, PlaybackStatus, QueueSnapshot};
pub use registry::SessionRegistry;
pub use session::{Control, Enqueued, LoopExit, PlaybackSession};
pub use transport::{Completion, CompletionSender, VoiceConnection, VoiceGateway};
