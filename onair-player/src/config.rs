//! Configuration for the stream engine
//!
//! Two layers:
//! 1. **Bootstrap** (`onair_common::config::TomlConfig`): port, stream URL,
//!    collaborator endpoints, logging.
//! 2. **Engine policy** (`[engine]` table): retry/backoff, buffering
//!    thresholds, telemetry cadence and timeouts.
//!
//! Every value has a built-in default, so an empty file (or no file) yields a
//! working configuration.

use crate::error::{Error, Result};
use onair_common::config::{load_or_default, TomlConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Whole config file: bootstrap keys at the top level plus `[engine]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerConfig {
    #[serde(flatten)]
    pub bootstrap: TomlConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl PlayerConfig {
    /// Load from `path` (defaults when absent) and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: PlayerConfig = load_or_default(path)?;
        config.engine.validate()?;
        Ok(config)
    }
}

/// Engine policy knobs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reconnect: ReconnectPolicy,
    pub buffering: BufferPolicy,
    pub telemetry: TelemetryConfig,
    pub timeouts: TimeoutConfig,
    pub probe: ProbeConfig,
}

impl EngineConfig {
    /// Reject policies the scheduler cannot honor
    pub fn validate(&self) -> Result<()> {
        let r = &self.reconnect;
        if r.max_retries == 0 {
            return Err(Error::Config("reconnect.max_retries must be at least 1".into()));
        }
        if r.min_delay_ms > r.max_delay_ms {
            return Err(Error::Config(format!(
                "reconnect.min_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                r.min_delay_ms, r.max_delay_ms
            )));
        }
        if r.give_up_after == Some(0) {
            return Err(Error::Config("reconnect.give_up_after must be at least 1".into()));
        }

        let b = &self.buffering;
        if b.check_interval_ms == 0 {
            return Err(Error::Config("buffering.check_interval_ms must be non-zero".into()));
        }
        if !(0.1..=1.0).contains(&b.degraded_threshold)
            || !(0.1..=1.0).contains(&b.stable_threshold)
            || b.degraded_threshold > b.stable_threshold
        {
            return Err(Error::Config(format!(
                "buffering thresholds must satisfy 0.1 <= degraded ({}) <= stable ({}) <= 1.0",
                b.degraded_threshold, b.stable_threshold
            )));
        }

        if self.telemetry.heartbeat_interval_secs == 0 {
            return Err(Error::Config("telemetry.heartbeat_interval_secs must be non-zero".into()));
        }
        Ok(())
    }
}

/// Retry/backoff policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Base of the exponential backoff
    pub initial_delay_ms: u64,
    /// Lower clamp of any computed delay
    pub min_delay_ms: u64,
    /// Upper clamp; also the pinned delay once a cycle is exhausted
    pub max_delay_ms: u64,
    /// Backoff cycle length before the delay pins at `max_delay_ms`
    pub max_retries: u32,
    /// Consecutive errors above this value force a full restart
    pub restart_threshold: u32,
    /// Total failed attempts before surfacing a terminal error.
    /// `None` retries forever.
    pub give_up_after: Option<u32>,
    /// Minimum spacing after a successful reconnect
    pub success_cooldown_ms: u64,
    /// Minimum spacing between attempts
    pub debounce_ms: u64,
    /// Pause between player teardown and rebuild during a full restart
    pub restart_pause_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            min_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_retries: 5,
            restart_threshold: 3,
            give_up_after: None,
            success_cooldown_ms: 10_000,
            debounce_ms: 2_000,
            restart_pause_ms: 1_000,
        }
    }
}

impl ReconnectPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn success_cooldown(&self) -> Duration {
        Duration::from_millis(self.success_cooldown_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }
}

/// Buffering grace-period policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferPolicy {
    /// Spacing of progressive checks while buffering
    pub check_interval_ms: u64,
    /// Progressive checks before escalating
    pub max_checks: u32,
    /// Adaptive timeout when the network is stable
    pub stable_timeout_ms: u64,
    /// Adaptive timeout for a moderately stable network
    pub moderate_timeout_ms: u64,
    /// Adaptive timeout for a degraded network
    pub degraded_timeout_ms: u64,
    /// Trailing window for the stability score
    pub window_secs: u64,
    /// Score below which the network counts as degraded
    pub degraded_threshold: f64,
    /// Score at or above which the network counts as stable
    pub stable_threshold: f64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            check_interval_ms: 3_000,
            max_checks: 3,
            stable_timeout_ms: 15_000,
            moderate_timeout_ms: 10_000,
            degraded_timeout_ms: 8_000,
            window_secs: 300,
            degraded_threshold: 0.6,
            stable_threshold: 0.8,
        }
    }
}

impl BufferPolicy {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Session telemetry cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Heartbeat period while a session is open
    pub heartbeat_interval_secs: u64,
    /// How long the app may sit in the background without playing before
    /// the open session is flushed
    pub background_grace_secs: u64,
    /// Bounded queue for the HTTP sink; events beyond it are dropped
    pub queue_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 60,
            background_grace_secs: 300,
            queue_capacity: 256,
        }
    }
}

impl TelemetryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn background_grace(&self) -> Duration {
        Duration::from_secs(self.background_grace_secs)
    }
}

/// Timeouts on calls to external collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub player_command_ms: u64,
    pub bridge_ms: u64,
    pub remote_config_ms: u64,
    /// Settle delay before resuming after foreground content
    pub foreground_resume_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            player_command_ms: 5_000,
            bridge_ms: 2_000,
            remote_config_ms: 3_000,
            foreground_resume_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn player_command(&self) -> Duration {
        Duration::from_millis(self.player_command_ms)
    }

    pub fn bridge(&self) -> Duration {
        Duration::from_millis(self.bridge_ms)
    }

    pub fn remote_config(&self) -> Duration {
        Duration::from_millis(self.remote_config_ms)
    }

    pub fn foreground_resume(&self) -> Duration {
        Duration::from_millis(self.foreground_resume_ms)
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe the endpoint before each incremental reconnect
    pub enabled: bool,
    /// Hard per-check timeout
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5_000,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
