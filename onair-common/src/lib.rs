//! # OnAir Common Library
//!
//! Shared code for the OnAir stream player crates:
//! - Playback status and event types (`StreamEvent`) with the broadcast `EventBus`
//! - Bootstrap configuration loading (TOML file resolution, compiled defaults)
//! - Error types
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackStatus, StreamEvent};
