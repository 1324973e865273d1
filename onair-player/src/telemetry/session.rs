//! Listening session
//!
//! One session spans continuous listening from the first ready signal until
//! the user stops, the engine is disposed, or the app sits in the background
//! without playing past the grace period. Reconnections inside a session do
//! not end it.

use chrono::{DateTime, Utc};
use onair_common::time;
use serde_json::{json, Value};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub total_reconnections: u32,
}

impl Session {
    pub fn open(now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: time::now(),
            started: now,
            total_reconnections: 0,
        }
    }

    pub fn record_reconnection(&mut self) {
        self.total_reconnections += 1;
    }

    pub fn continuous_minutes(&self, now: Instant) -> u64 {
        time::whole_minutes(now.saturating_duration_since(self.started))
    }

    /// Telemetry properties for heartbeat and end-of-session events
    pub fn properties(&self, now: Instant) -> Value {
        json!({
            "session_id": self.id,
            "started_at": self.started_at,
            "continuous_minutes": self.continuous_minutes(now),
            "total_reconnections": self.total_reconnections,
        })
    }
}
