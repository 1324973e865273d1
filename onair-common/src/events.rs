//! Event types for the OnAir event system
//!
//! Provides the playback status enum, the `StreamEvent` enum published to UI
//! subscribers, and the `EventBus` that broadcasts them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Authoritative playback status of the stream engine
///
/// Mutated only by the playback engine; read by UI and telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing playing, nothing pending
    #[default]
    Idle,
    /// Connecting to the stream (initial connect or reconnect attempt)
    Connecting,
    /// Audio is flowing
    Playing,
    /// Player is starved for data mid-playback
    Buffering,
    /// Paused by the user, the host app or an audio-focus interruption
    Paused,
    /// Stream dropped (recovering) or retries exhausted (terminal)
    Error,
    /// Player resource is being torn down and rebuilt
    Restarting,
}

impl PlaybackStatus {
    /// True when audio is (or is about to be) audible
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Buffering)
    }

    /// True while the UI should show a spinner
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            PlaybackStatus::Connecting | PlaybackStatus::Buffering | PlaybackStatus::Restarting
        )
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Connecting => write!(f, "connecting"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Buffering => write!(f, "buffering"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Error => write!(f, "error"),
            PlaybackStatus::Restarting => write!(f, "restarting"),
        }
    }
}

/// Events published by the stream engine
///
/// Broadcast via `EventBus` and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Playback status changed
    ///
    /// Emitted exactly once per transition; repeated signals for the same
    /// status produce no event.
    StatusChanged {
        /// Status before the change
        old_status: PlaybackStatus,
        /// Status after the change
        new_status: PlaybackStatus,
        /// When the status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Human-readable status line for the UI (empty string clears it)
    StatusMessage {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-visible error changed (empty string clears it)
    ErrorMessage {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed (0.0-1.0)
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Buffer health or network stability changed
    BufferHealthChanged {
        /// Remaining buffer health (0-3)
        buffer_health: u8,
        /// Network stability score (0.1-1.0)
        stability_score: f64,
        /// True when the score is below the degraded threshold
        degraded: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An incremental reconnection attempt was scheduled
    ReconnectScheduled {
        /// Attempt number within the current backoff cycle (1-based)
        attempt: u32,
        /// Backoff cycle length
        max_retries: u32,
        /// Delay before the attempt fires
        delay_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A full player restart started
    RestartStarted {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A listening session opened
    SessionStarted {
        session_id: uuid::Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A listening session was flushed
    SessionEnded {
        session_id: uuid::Uuid,
        continuous_minutes: u64,
        total_reconnections: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StreamEvent {
    /// Event type name (used as the SSE `event:` field)
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::StatusChanged { .. } => "StatusChanged",
            StreamEvent::StatusMessage { .. } => "StatusMessage",
            StreamEvent::ErrorMessage { .. } => "ErrorMessage",
            StreamEvent::VolumeChanged { .. } => "VolumeChanged",
            StreamEvent::BufferHealthChanged { .. } => "BufferHealthChanged",
            StreamEvent::ReconnectScheduled { .. } => "ReconnectScheduled",
            StreamEvent::RestartStarted { .. } => "RestartStarted",
            StreamEvent::SessionStarted { .. } => "SessionStarted",
            StreamEvent::SessionEnded { .. } => "SessionEnded",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper around `tokio::sync::broadcast`. Slow subscribers lag and
/// lose old events; they never block the publisher.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<StreamEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use onair_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StreamEvent,
    ) -> Result<usize, broadcast::error::SendError<StreamEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
