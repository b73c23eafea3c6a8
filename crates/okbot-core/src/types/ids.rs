//! Identifiers for guilds and voice channels.
//!
//! Kept independent of the Discord library so the playback crates can be
//! tested without a gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A server (guild) identifier. One playback session exists per guild.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuildKey(pub u64);

/// A voice channel identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(pub u64);

impl From<u64> for GuildKey {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for ChannelKey {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for GuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
