//! Glue between Discord and the playback crates.
//!
//! - Songbird-backed voice gateway for the playback loop
//! - Announcer posting player events to text channels

pub mod announcer;
pub mod voice;

pub use announcer::Announcer;
pub use voice::SongbirdGateway;
