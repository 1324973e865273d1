//! Recovery: incremental reconnects, probes, full restarts, terminal failure
//!
//! Call graph is one-directional: a failure schedules a timer (or a restart
//! pause, or gives up) and returns. Attempts happen only when that timer
//! fires, so a failing attempt never re-enters the failure path
//! synchronously.

use super::core::{PlaybackEngine, PlayerCommand};
use crate::playback::reconnect::{ReconnectGuards, ScheduleDecision};
use crate::playback::timers::TimerKind;
use crate::probe::probe_with_timeout;
use crate::telemetry::names;
use onair_common::events::{PlaybackStatus, StreamEvent};
use onair_common::time;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Non-terminal message shown while recovering
pub const RECONNECTING_MESSAGE: &str = "Connection lost. Reconnecting...";

impl PlaybackEngine {
    /// Count a failure and let the scheduler decide what happens next
    pub(super) async fn on_stream_failure(&mut self, reason: String) {
        let errors = self.scheduler.record_error();
        warn!("Stream failure #{}: {}", errors, reason);

        self.timers.cancel(TimerKind::BufferCheck);
        self.monitor.abandon_episode();

        self.status.set_status(PlaybackStatus::Error);
        self.status.set_message(RECONNECTING_MESSAGE);
        self.publish_buffer();

        let mut props = self.recovery_properties();
        props["reason"] = json!(reason);
        props["consecutive_errors"] = json!(errors);
        self.telemetry.report(names::STREAM_DROPPED, props);

        self.schedule_reconnect().await;
    }

    fn guards(&self) -> ReconnectGuards {
        ReconnectGuards {
            user_stopped: self.flags.user_stopped,
            paused_for_foreground_content: self.flags.paused_for_foreground_content,
            deliberately_paused: self.deliberately_paused(),
            exhausted: self.flags.exhausted,
            reconnect_in_flight: self.timers.is_pending(TimerKind::Reconnect) || self.probe_in_flight,
            restart_in_flight: self.flags.restart_in_flight,
        }
    }

    async fn schedule_reconnect(&mut self) {
        let decision = self.scheduler.schedule(Instant::now(), self.guards());
        match decision {
            ScheduleDecision::Skip(reason) => {
                debug!("Reconnect not scheduled: {}", reason);
            }
            ScheduleDecision::Retry { attempt, delay } => {
                let max_retries = self.scheduler.policy().max_retries;
                info!(
                    "Reconnect attempt {}/{} in {:?}",
                    attempt, max_retries, delay
                );
                self.timers.schedule(TimerKind::Reconnect, delay);
                self.status.set_message(format!(
                    "Reconnecting in {}s (attempt {}/{})",
                    delay.as_secs_f64().ceil() as u64,
                    attempt,
                    max_retries
                ));
                self.status.emit(StreamEvent::ReconnectScheduled {
                    attempt,
                    max_retries,
                    delay_ms: delay.as_millis() as u64,
                    timestamp: time::now(),
                });

                let mut props = self.recovery_properties();
                props["attempt"] = json!(attempt);
                props["delay_ms"] = json!(delay.as_millis() as u64);
                self.telemetry.report(names::RECONNECT_SCHEDULED, props);
            }
            ScheduleDecision::Restart { consecutive_errors } => {
                self.begin_restart(format!("{} consecutive errors", consecutive_errors))
                    .await;
            }
            ScheduleDecision::GiveUp { total_attempts } => {
                self.enter_terminal(total_attempts).await;
            }
        }
    }

    /// Backoff elapsed: probe first if configured, else reconnect
    pub(super) async fn on_reconnect_timer(&mut self) {
        if self.recovery_blocked() || self.flags.restart_in_flight {
            return;
        }

        match self.probe.clone() {
            Some(probe) if self.config.probe.enabled => {
                self.probe_generation += 1;
                self.probe_in_flight = true;
                self.status.set_message("Checking connection...");

                let generation = self.probe_generation;
                let tx = self.probe_tx.clone();
                let url = self.stream_url.clone();
                let timeout = self.config.probe.timeout();
                tokio::spawn(async move {
                    let result = probe_with_timeout(probe.as_ref(), &url, timeout).await;
                    let _ = tx.send((generation, result));
                });
            }
            _ => self.issue_reconnect().await,
        }
    }

    pub(super) async fn handle_probe_result(
        &mut self,
        generation: u64,
        result: crate::error::Result<()>,
    ) {
        if !self.probe_in_flight || generation != self.probe_generation {
            debug!("Ignoring stale probe result");
            return;
        }
        self.probe_in_flight = false;
        if self.recovery_blocked() {
            return;
        }

        match result {
            Ok(()) => self.issue_reconnect().await,
            Err(e) => {
                warn!("Stream host unreachable: {}", e);
                self.scheduler.record_attempt(Instant::now());
                let mut props = self.recovery_properties();
                props["error"] = json!(e.to_string());
                self.telemetry.report(names::PROBE_FAILED, props);
                self.on_stream_failure(format!("probe failed: {}", e)).await;
            }
        }
    }

    /// Incremental attempt on the existing player
    async fn issue_reconnect(&mut self) {
        self.scheduler.record_attempt(Instant::now());
        info!(
            "Reconnecting (attempt {} since last success)",
            self.scheduler.state().total_attempts
        );
        self.telemetry
            .report(names::RECONNECT_ATTEMPT, self.recovery_properties());

        self.status.set_status(PlaybackStatus::Connecting);
        self.status.set_message("Reconnecting...");
        self.source_loaded = false;

        if let Err(e) = self.start_playback().await {
            self.on_stream_failure(format!("reconnect failed: {}", e))
                .await;
        }
    }

    /// Tear the player down; the rebuild happens after `restart_pause`
    pub(super) async fn begin_restart(&mut self, reason: String) {
        warn!("Restarting player: {}", reason);
        self.cancel_recovery();
        self.flags.restart_in_flight = true;
        self.monitor.abandon_episode();

        self.status.set_status(PlaybackStatus::Restarting);
        self.status.set_message("Restarting player...");
        self.status.emit(StreamEvent::RestartStarted {
            reason: reason.clone(),
            timestamp: time::now(),
        });
        let mut props = self.recovery_properties();
        props["reason"] = json!(reason);
        self.telemetry.report(names::RESTART_STARTED, props);

        self.scheduler.record_attempt(Instant::now());
        self.dispose_player().await;
        self.timers
            .schedule(TimerKind::RestartPause, self.config.reconnect.restart_pause());
    }

    pub(super) async fn finish_restart(&mut self) {
        self.flags.restart_in_flight = false;
        if self.recovery_blocked() {
            debug!("Restart abandoned: playback stopped or paused meanwhile");
            return;
        }

        self.scheduler.reset_after_restart();
        self.flags.fresh_connection = true;
        self.status.set_status(PlaybackStatus::Connecting);
        self.status.set_message("Reconnecting...");

        if let Err(e) = self.start_playback().await {
            self.on_stream_failure(format!("restart failed: {}", e))
                .await;
        }
    }

    /// Hard maximum reached: stop retrying until the user presses play
    async fn enter_terminal(&mut self, total_attempts: u32) {
        error!("Giving up after {} reconnection attempts", total_attempts);
        self.flags.exhausted = true;
        self.cancel_recovery();
        self.monitor.abandon_episode();

        self.player_call_logged(PlayerCommand::Stop).await;
        self.source_loaded = false;

        self.status.set_status(PlaybackStatus::Error);
        self.status.set_message("");
        self.status.set_error(format!(
            "Unable to reach the station after {} attempts. Press play to try again.",
            total_attempts
        ));

        let mut props = self.recovery_properties();
        props["total_attempts"] = json!(total_attempts);
        self.telemetry.report(names::RETRIES_EXHAUSTED, props);

        self.release_wake_lock().await;
    }

    /// Cancel every pending recovery step (reconnect timer, probe, restart
    /// pause, buffering checks)
    pub(super) fn cancel_recovery(&mut self) {
        self.timers.cancel(TimerKind::Reconnect);
        self.timers.cancel(TimerKind::BufferCheck);
        if self.timers.cancel(TimerKind::RestartPause) {
            debug!("Pending restart cancelled");
        }
        self.flags.restart_in_flight = false;
        self.cancel_probe();
    }

    pub(super) fn cancel_probe(&mut self) {
        if self.probe_in_flight {
            self.probe_in_flight = false;
            self.probe_generation += 1;
        }
    }

    fn recovery_properties(&self) -> Value {
        let retry = self.scheduler.state();
        json!({
            "attempt": retry.attempt_count,
            "max_retries": self.scheduler.policy().max_retries,
            "consecutive_errors": retry.consecutive_error_count,
            "total_attempts": retry.total_attempts,
            "buffer_health": self.monitor.health(),
            "stability_score": self.monitor.stability_score(),
        })
    }
}
