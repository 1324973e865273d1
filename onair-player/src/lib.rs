//! # OnAir Player Library (onair-player)
//!
//! Stream resilience engine for a long-lived internet radio stream.
//!
//! **Purpose:** Keep one unreliable network audio stream playing indefinitely
//! across network drops, buffering stalls, OS audio-focus interruptions and
//! host-app content breaks, and report what happened.
//!
//! **Architecture:** A single actor (`playback::engine`) owns all playback
//! state and consults two pure policy objects (`playback::buffer_health`,
//! `playback::reconnect`). Audio output sits behind the `player::StreamPlayer`
//! seam; platform, probe, remote config and telemetry are pluggable
//! collaborators. `api` exposes the engine over HTTP/SSE.

pub mod api;
pub mod config;
pub mod error;
pub mod platform;
pub mod playback;
pub mod player;
pub mod probe;
pub mod remote_config;
pub mod telemetry;

pub use error::{Error, Result};
pub use playback::engine::{EngineHandle, PlaybackEngine};
