//! # okbot-core
//!
//! Core types, traits, and error handling shared by the okbot crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, InvalidState, Result};
pub use traits::TrackResolver;
pub use types::*;
