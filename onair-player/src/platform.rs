//! Platform audio-focus bridge
//!
//! The OS audio session reports interruptions (phone calls, other apps
//! taking focus) and "becoming noisy" (headphones unplugged); the engine
//! consumes them as `FocusEvent`s through its handle.
//!
//! Wake locks are an optional capability. A platform without one passes no
//! `WakeLock` at all, which the controller models as
//! `WakeLockState::Unavailable`; a lock that fails is `Failed`. Neither
//! stops the engine from playing.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Audio-focus signals from the OS audio session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FocusEvent {
    /// Another audio source took focus; always pauses
    InterruptionBegin,
    /// Focus returned; resumes only when `resumable`
    InterruptionEnd { resumable: bool },
    /// Audio route about to switch to the speaker; pauses for good
    BecomingNoisy,
}

/// Wake lock capability exposed by the platform
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn acquire(&self) -> Result<()>;
    async fn release(&self) -> Result<()>;
}

/// Observable wake lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeLockState {
    /// Platform offers no wake lock
    #[default]
    Unavailable,
    Released,
    Held,
    /// Last call failed or timed out; background playback may be cut short
    Failed,
}

/// Best-effort wrapper used by the engine
pub struct WakeLockController {
    lock: Option<Arc<dyn WakeLock>>,
    state: WakeLockState,
    timeout: Duration,
}

impl WakeLockController {
    pub fn new(lock: Option<Arc<dyn WakeLock>>, timeout: Duration) -> Self {
        let state = if lock.is_some() {
            WakeLockState::Released
        } else {
            info!("No wake lock capability; background playback may be suspended by the OS");
            WakeLockState::Unavailable
        };
        Self {
            lock,
            state,
            timeout,
        }
    }

    pub fn state(&self) -> WakeLockState {
        self.state
    }

    /// Acquire if not already held. Failures are logged and recorded, never
    /// returned.
    pub async fn acquire(&mut self) -> WakeLockState {
        let Some(lock) = self.lock.clone() else {
            return self.state;
        };
        if self.state == WakeLockState::Held {
            return self.state;
        }

        self.state = match self.call(lock.acquire()).await {
            Ok(()) => {
                debug!("Wake lock acquired");
                WakeLockState::Held
            }
            Err(e) => {
                warn!("Wake lock acquisition failed, continuing without it: {}", e);
                WakeLockState::Failed
            }
        };
        self.state
    }

    /// Release if held
    pub async fn release(&mut self) -> WakeLockState {
        let Some(lock) = self.lock.clone() else {
            return self.state;
        };
        if self.state != WakeLockState::Held {
            return self.state;
        }

        self.state = match self.call(lock.release()).await {
            Ok(()) => {
                debug!("Wake lock released");
                WakeLockState::Released
            }
            Err(e) => {
                warn!("Wake lock release failed: {}", e);
                WakeLockState::Failed
            }
        };
        self.state
    }

    async fn call<F>(&self, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Platform(format!(
                "wake lock call timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
