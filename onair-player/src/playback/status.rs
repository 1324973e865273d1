//! Published engine status
//!
//! UI consumers observe the engine two ways:
//! - `watch` channel carrying the latest `EngineStatus` snapshot
//! - `EventBus` carrying discrete `StreamEvent`s (status transitions,
//!   messages, reconnect notices)
//!
//! Both are fire-and-forget from the engine's side. Every setter compares
//! before publishing, so a repeated signal never produces a duplicate event.

use crate::platform::WakeLockState;
use onair_common::events::{EventBus, PlaybackStatus, StreamEvent};
use onair_common::time;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Snapshot published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub is_loading: bool,
    /// User-visible error; empty when there is none
    pub error_message: String,
    /// Transient status line ("Buffering...", "Reconnecting in 4s")
    pub status_message: String,
    pub volume: f32,
    pub buffer_health: u8,
    pub stability_score: f64,
    pub network_degraded: bool,
    pub wake_lock: WakeLockState,
}

impl EngineStatus {
    pub fn initial(volume: f32, wake_lock: WakeLockState) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            is_playing: false,
            is_loading: false,
            error_message: String::new(),
            status_message: String::new(),
            volume,
            buffer_health: crate::playback::buffer_health::MAX_BUFFER_HEALTH,
            stability_score: 1.0,
            network_degraded: false,
            wake_lock,
        }
    }
}

/// Engine-side publisher. Dropping it closes both channels.
pub struct StatusPublisher {
    tx: watch::Sender<EngineStatus>,
    events: Arc<EventBus>,
}

impl StatusPublisher {
    pub fn new(initial: EngineStatus, event_capacity: usize) -> (Self, watch::Receiver<EngineStatus>) {
        let (tx, rx) = watch::channel(initial);
        let publisher = Self {
            tx,
            events: Arc::new(EventBus::new(event_capacity)),
        };
        (publisher, rx)
    }

    /// Weak reference for handles; upgrading fails once the engine is gone
    pub fn event_bus(&self) -> Weak<EventBus> {
        Arc::downgrade(&self.events)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.tx.borrow().status
    }

    /// Returns true if the status actually changed
    pub fn set_status(&self, new_status: PlaybackStatus) -> bool {
        let mut old_status = new_status;
        let changed = self.tx.send_if_modified(|s| {
            if s.status == new_status {
                return false;
            }
            old_status = s.status;
            s.status = new_status;
            s.is_playing = new_status.is_playing();
            s.is_loading = new_status.is_loading();
            true
        });

        if changed {
            self.events.emit_lossy(StreamEvent::StatusChanged {
                old_status,
                new_status,
                timestamp: time::now(),
            });
        }
        changed
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        let changed = self.tx.send_if_modified(|s| {
            if s.status_message == message {
                return false;
            }
            s.status_message = message.clone();
            true
        });
        if changed {
            self.events.emit_lossy(StreamEvent::StatusMessage {
                message,
                timestamp: time::now(),
            });
        }
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        let changed = self.tx.send_if_modified(|s| {
            if s.error_message == message {
                return false;
            }
            s.error_message = message.clone();
            true
        });
        if changed {
            self.events.emit_lossy(StreamEvent::ErrorMessage {
                message,
                timestamp: time::now(),
            });
        }
    }

    pub fn set_volume(&self, volume: f32) {
        let changed = self.tx.send_if_modified(|s| {
            if s.volume == volume {
                return false;
            }
            s.volume = volume;
            true
        });
        if changed {
            self.events.emit_lossy(StreamEvent::VolumeChanged {
                volume,
                timestamp: time::now(),
            });
        }
    }

    pub fn set_buffer(&self, buffer_health: u8, stability_score: f64, degraded: bool) {
        let changed = self.tx.send_if_modified(|s| {
            if s.buffer_health == buffer_health
                && s.stability_score == stability_score
                && s.network_degraded == degraded
            {
                return false;
            }
            s.buffer_health = buffer_health;
            s.stability_score = stability_score;
            s.network_degraded = degraded;
            true
        });
        if changed {
            self.events.emit_lossy(StreamEvent::BufferHealthChanged {
                buffer_health,
                stability_score,
                degraded,
                timestamp: time::now(),
            });
        }
    }

    pub fn set_wake_lock(&self, state: WakeLockState) {
        self.tx.send_if_modified(|s| {
            if s.wake_lock == state {
                return false;
            }
            s.wake_lock = state;
            true
        });
    }

    /// Publish a discrete event with no snapshot counterpart
    pub fn emit(&self, event: StreamEvent) {
        self.events.emit_lossy(event);
    }
}
