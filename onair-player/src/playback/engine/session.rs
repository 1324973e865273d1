//! Listening session lifecycle and heartbeat

use super::core::PlaybackEngine;
use crate::playback::timers::TimerKind;
use crate::telemetry::{names, Session};
use onair_common::events::StreamEvent;
use onair_common::time;
use tokio::time::Instant;
use tracing::{debug, info};

impl PlaybackEngine {
    pub(super) fn open_session_if_needed(&mut self, now: Instant) {
        if self.session.is_some() {
            return;
        }

        let session = Session::open(now);
        info!("Listening session {} started", session.id);
        self.telemetry
            .report(names::SESSION_STARTED, session.properties(now));
        self.status.emit(StreamEvent::SessionStarted {
            session_id: session.id,
            timestamp: time::now(),
        });
        self.session = Some(session);
    }

    /// Flush and forget the open session, if any
    pub(super) fn close_session(&mut self, reason: &str) {
        self.timers.cancel(TimerKind::Heartbeat);
        self.timers.cancel(TimerKind::BackgroundGrace);
        let Some(session) = self.session.take() else {
            return;
        };

        let now = Instant::now();
        let continuous_minutes = session.continuous_minutes(now);
        info!(
            "Listening session {} ended ({}): {} min, {} reconnections",
            session.id, reason, continuous_minutes, session.total_reconnections
        );

        let mut props = session.properties(now);
        props["reason"] = reason.into();
        self.telemetry.report(names::SESSION_ENDED, props);
        self.status.emit(StreamEvent::SessionEnded {
            session_id: session.id,
            continuous_minutes,
            total_reconnections: session.total_reconnections,
            timestamp: time::now(),
        });
    }

    pub(super) fn start_heartbeat(&mut self) {
        if self.session.is_some() && !self.timers.is_pending(TimerKind::Heartbeat) {
            self.timers.schedule_repeating(
                TimerKind::Heartbeat,
                self.config.telemetry.heartbeat_interval(),
            );
        }
    }

    pub(super) fn on_heartbeat(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.timers.cancel(TimerKind::Heartbeat);
            return;
        };

        let mut props = session.properties(Instant::now());
        props["status"] = self.status.status().to_string().into();
        props["buffer_health"] = self.monitor.health().into();
        props["stability_score"] = self.monitor.stability_score().into();
        self.telemetry.report(names::HEARTBEAT, props);
    }

    /// Keep the background grace timer armed exactly while the app is
    /// backgrounded, not playing, and a session is open
    pub(super) fn refresh_background_grace(&mut self) {
        let should_arm = self.flags.backgrounded
            && self.session.is_some()
            && !self.status.status().is_playing();
        let armed = self.timers.is_pending(TimerKind::BackgroundGrace);

        if should_arm && !armed {
            debug!("Background grace period started");
            self.timers.schedule(
                TimerKind::BackgroundGrace,
                self.config.telemetry.background_grace(),
            );
        } else if !should_arm && armed {
            self.timers.cancel(TimerKind::BackgroundGrace);
        }
    }

    pub(super) fn on_background_grace(&mut self) {
        self.close_session("background_idle");
    }
}
