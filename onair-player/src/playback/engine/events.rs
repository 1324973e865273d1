//! Player event classification and buffering management

use super::core::PlaybackEngine;
use crate::playback::buffer_health::{BufferingAction, CheckOutcome};
use crate::playback::timers::TimerKind;
use crate::player::{PlayerEvent, ProcessingState};
use crate::telemetry::names;
use onair_common::events::PlaybackStatus;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

impl PlaybackEngine {
    pub(super) async fn handle_player_event(&mut self, generation: u64, event: PlayerEvent) {
        if self.player.is_none() || generation != self.player_generation {
            trace!("Ignoring event from stale player {}: {:?}", generation, event);
            return;
        }

        match event {
            PlayerEvent::Fault(message) => {
                warn!("Player fault: {}", message);
                self.on_stream_dropped(format!("player fault: {}", message))
                    .await;
            }
            PlayerEvent::State {
                playing,
                processing,
            } => {
                trace!("Player state: playing={} {:?}", playing, processing);
                match processing {
                    ProcessingState::Loading => self.on_loading(),
                    ProcessingState::Ready if playing => self.on_ready(),
                    ProcessingState::Ready => self.on_ready_not_playing(),
                    ProcessingState::Buffering => self.on_buffering().await,
                    ProcessingState::Idle => {
                        self.on_stream_dropped("player went idle".to_string())
                            .await
                    }
                    ProcessingState::Completed => {
                        self.on_stream_dropped("stream ended".to_string()).await
                    }
                }
            }
        }
    }

    fn on_loading(&mut self) {
        if self.status.status() == PlaybackStatus::Idle
            || self.recovery_blocked()
            || self.flags.restart_in_flight
        {
            return;
        }
        self.status.set_status(PlaybackStatus::Connecting);
    }

    /// Sustained playback: reset counters, open the session. Health is
    /// refilled only on a fresh connection; reconnects keep its history.
    fn on_ready(&mut self) {
        let now = Instant::now();
        if let Some(duration) = self.monitor.on_buffering_resolved(now) {
            debug!("Buffering resolved after {:?}", duration);
            self.status.set_message("");
        }
        self.timers.cancel(TimerKind::BufferCheck);

        if self.status.status() == PlaybackStatus::Playing {
            self.publish_buffer();
            return;
        }
        if self.flags.user_stopped || self.deliberately_paused() || self.flags.paused_for_foreground_content {
            debug!("Ready signal while paused or stopped; ignoring");
            return;
        }

        let recovered = self.scheduler.record_success(now);
        self.cancel_recovery();
        self.flags.exhausted = false;
        if std::mem::take(&mut self.flags.fresh_connection) {
            self.monitor.mark_healthy();
        }

        self.status.set_error("");
        self.status.set_message("");
        self.status.set_status(PlaybackStatus::Playing);
        self.publish_buffer();

        self.open_session_if_needed(now);
        if recovered {
            if let Some(session) = self.session.as_mut() {
                session.record_reconnection();
            }
            info!("Stream recovered");
            self.telemetry.report(
                names::RECONNECT_SUCCEEDED,
                json!({
                    "buffer_health": self.monitor.health(),
                    "stability_score": self.monitor.stability_score(),
                    "session_reconnections": self.session.as_ref().map(|s| s.total_reconnections),
                }),
            );
        }
        self.start_heartbeat();
    }

    fn on_ready_not_playing(&mut self) {
        if self.deliberately_paused() || self.flags.paused_for_foreground_content {
            self.status.set_status(PlaybackStatus::Paused);
        }
    }

    async fn on_buffering(&mut self) {
        if !matches!(
            self.status.status(),
            PlaybackStatus::Playing | PlaybackStatus::Buffering
        ) {
            trace!("Buffering outside playback ignored");
            return;
        }
        self.status.set_status(PlaybackStatus::Buffering);

        if self.flags.backgrounded || self.flags.paused_for_foreground_content {
            debug!("Buffering while backgrounded; no progressive checks");
            return;
        }

        let now = Instant::now();
        match self.monitor.on_buffering_start(now) {
            BufferingAction::AlreadyBuffering => {
                debug!("Buffering again, health {}", self.monitor.health());
                self.publish_buffer();
            }
            BufferingAction::EscalateNow => {
                let elapsed = self.monitor.on_escalated(now).unwrap_or(Duration::ZERO);
                self.publish_buffer();
                info!("Buffer health exhausted; reconnecting immediately");
                self.report_escalation(0, elapsed);
                self.on_stream_failure("buffer health exhausted".to_string())
                    .await;
            }
            BufferingAction::ProgressiveCheck { interval, message } => {
                self.status.set_message(message);
                self.publish_buffer();
                self.timers.schedule(TimerKind::BufferCheck, interval);
            }
        }
    }

    pub(super) async fn on_buffer_check(&mut self) {
        let now = Instant::now();
        match self.monitor.on_progress_check(now) {
            CheckOutcome::NotBuffering => {}
            CheckOutcome::StillWaiting { check, message } => {
                debug!("Still buffering (check {})", check);
                self.status.set_message(message);
                self.timers
                    .schedule(TimerKind::BufferCheck, self.config.buffering.check_interval());
            }
            CheckOutcome::Escalate { checks, elapsed } => {
                self.monitor.on_escalated(now);
                self.publish_buffer();
                info!("Buffering for {:?} after {} checks; reconnecting", elapsed, checks);
                self.report_escalation(checks, elapsed);
                self.on_stream_failure(format!("buffering timeout after {:?}", elapsed))
                    .await;
            }
        }
    }

    fn report_escalation(&self, checks: u32, elapsed: Duration) {
        self.telemetry.report(
            names::BUFFERING_ESCALATED,
            json!({
                "checks": checks,
                "elapsed_ms": elapsed.as_millis() as u64,
                "buffer_health": self.monitor.health(),
                "stability_score": self.monitor.stability_score(),
            }),
        );
    }

    /// The stream stopped without being asked to
    async fn on_stream_dropped(&mut self, reason: String) {
        if self.flags.user_stopped
            || self.flags.exhausted
            || self.flags.restart_in_flight
            || self.status.status() == PlaybackStatus::Idle
        {
            debug!("Stream drop ignored ({})", reason);
            return;
        }
        if self.deliberately_paused() || self.flags.paused_for_foreground_content {
            // Reload the source on the next play
            self.source_loaded = false;
            debug!("Stream dropped while paused ({})", reason);
            return;
        }

        self.on_stream_failure(reason).await;
    }
}
