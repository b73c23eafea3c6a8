//! Core domain types for okbot.

pub mod ids;
pub mod track;

pub use ids::{ChannelKey, GuildKey};
pub use track::Track;
