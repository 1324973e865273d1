//! Underlying player seam
//!
//! The engine never decodes audio itself. It drives a `StreamPlayer` and
//! listens to the raw state transitions the player reports through a
//! `PlayerEventSender`. Each player instance gets its own generation number;
//! events from a disposed player still in flight carry an old generation and
//! are dropped by the engine.

pub mod http;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use http::HttpStreamPlayer;

/// Player processing state as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    Loading,
    Buffering,
    Ready,
    Completed,
}

/// Raw transition reported by a player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    State {
        playing: bool,
        processing: ProcessingState,
    },
    /// Playback error (decoder failure, HTTP error, ...)
    Fault(String),
}

/// Channel half handed to a player at construction
#[derive(Debug, Clone)]
pub struct PlayerEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
}

impl PlayerEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, PlayerEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the engine has shut down
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn state(&self, playing: bool, processing: ProcessingState) -> bool {
        self.send(PlayerEvent::State {
            playing,
            processing,
        })
    }

    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.send(PlayerEvent::Fault(message.into()))
    }
}

/// Audio player driven by the engine
///
/// Every call is wrapped in the engine's player command timeout, so an
/// implementation may block on I/O but must not hold locks across awaits
/// that other calls need.
#[async_trait]
pub trait StreamPlayer: Send + Sync {
    async fn set_url(&self, url: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn set_volume(&self, volume: f32) -> Result<()>;
    /// Release all resources. The instance is not used again.
    async fn dispose(&self) -> Result<()>;
}

/// Builds fresh players (initial connect and every full restart)
pub trait PlayerFactory: Send + Sync {
    fn create(&self, events: PlayerEventSender) -> Result<Arc<dyn StreamPlayer>>;
}

impl<F> PlayerFactory for F
where
    F: Fn(PlayerEventSender) -> Result<Arc<dyn StreamPlayer>> + Send + Sync,
{
    fn create(&self, events: PlayerEventSender) -> Result<Arc<dyn StreamPlayer>> {
        self(events)
    }
}
