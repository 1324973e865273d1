//! User and host-app commands

use super::core::{PlaybackEngine, PlayerCommand};
use crate::platform::FocusEvent;
use crate::playback::timers::TimerKind;
use onair_common::events::PlaybackStatus;
use tracing::{debug, info, warn};

impl PlaybackEngine {
    /// Explicit play: clears every pause and stop, resets retry counters
    /// (including terminal exhaustion) and connects
    pub(super) async fn play(&mut self) {
        let current = self.status.status();
        if current.is_playing() && !self.recovery_blocked() {
            debug!("Play ignored: already {}", current);
            return;
        }

        info!("Play requested");
        self.flags.user_stopped = false;
        self.flags.exhausted = false;
        self.flags.paused_by_user = false;
        self.flags.paused_by_interruption = false;
        self.flags.paused_for_foreground_content = false;
        self.flags.resume_after_content = false;
        self.flags.fresh_connection = true;
        self.timers.cancel(TimerKind::ForegroundResume);

        self.scheduler.reset();
        self.cancel_recovery();
        self.status.set_error("");

        self.resume_playback("Connecting...").await;
    }

    /// Reissue play without touching retry counters
    pub(super) async fn resume_playback(&mut self, message: &str) {
        self.acquire_wake_lock().await;
        self.status.set_status(PlaybackStatus::Connecting);
        self.status.set_message(message);

        if let Err(e) = self.start_playback().await {
            warn!("Starting playback failed: {}", e);
            self.on_stream_failure(format!("play failed: {}", e)).await;
        }
    }

    pub(super) async fn pause(&mut self) {
        if self.status.status() == PlaybackStatus::Idle {
            debug!("Pause ignored: nothing playing");
            return;
        }
        info!("Pause requested");
        self.flags.paused_by_user = true;
        self.suspend().await;
    }

    /// Stop pending recovery, pause the player and publish `Paused`
    pub(super) async fn suspend(&mut self) {
        self.cancel_recovery();
        self.monitor.abandon_episode();
        self.player_call_logged(PlayerCommand::Pause).await;

        self.status.set_message("");
        self.status.set_status(PlaybackStatus::Paused);
        self.publish_buffer();
        self.release_wake_lock().await;
    }

    pub(super) async fn stop(&mut self) {
        info!("Stop requested");
        self.flags.user_stopped = true;
        self.flags.exhausted = false;
        self.flags.paused_by_user = false;
        self.flags.paused_by_interruption = false;
        self.flags.paused_for_foreground_content = false;
        self.flags.resume_after_content = false;

        self.timers.cancel_all();
        self.cancel_recovery();
        self.monitor.abandon_episode();

        self.player_call_logged(PlayerCommand::Pause).await;
        self.player_call_logged(PlayerCommand::Stop).await;
        self.source_loaded = false;

        self.status.set_message("");
        self.status.set_error("");
        self.status.set_status(PlaybackStatus::Idle);

        self.close_session("user_stop");
        self.release_wake_lock().await;
    }

    pub(super) async fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            warn!("Ignoring invalid volume {}", volume);
            return;
        };

        self.volume = volume;
        self.status.set_volume(volume);
        if self.source_loaded {
            self.player_call_logged(PlayerCommand::SetVolume(volume)).await;
        }
    }

    /// Manual escalation to a full player rebuild
    pub(super) async fn force_restart(&mut self) {
        if self.status.status() == PlaybackStatus::Idle || self.recovery_blocked() {
            debug!("Restart ignored: playback not active");
            return;
        }
        if self.flags.restart_in_flight {
            debug!("Restart ignored: already restarting");
            return;
        }
        self.begin_restart("manual restart".to_string()).await;
    }

    pub(super) async fn pause_for_foreground_content(&mut self) {
        self.timers.cancel(TimerKind::ForegroundResume);
        if self.flags.paused_for_foreground_content {
            debug!("Already paused for foreground content");
            return;
        }

        // An interruption pause is still live playback; a user pause is not
        let current = self.status.status();
        let active = current != PlaybackStatus::Idle
            && !self.flags.user_stopped
            && !self.flags.exhausted
            && !self.flags.paused_by_user;
        self.flags.paused_for_foreground_content = true;
        self.flags.resume_after_content = active;

        if !active {
            debug!("Foreground content started while {}; nothing to pause", current);
            return;
        }
        info!("Pausing for foreground content");
        if current != PlaybackStatus::Paused {
            self.suspend().await;
        }
    }

    /// Resume after a short settle delay. Counters are untouched.
    pub(super) fn resume_after_foreground_content(&mut self) {
        if !self.flags.paused_for_foreground_content {
            debug!("Foreground resume ignored: not paused for content");
            return;
        }
        self.timers.schedule(
            TimerKind::ForegroundResume,
            self.config.timeouts.foreground_resume(),
        );
    }

    pub(super) async fn finish_foreground_resume(&mut self) {
        if !self.flags.paused_for_foreground_content {
            return;
        }
        self.flags.paused_for_foreground_content = false;
        let interrupted_playback = std::mem::take(&mut self.flags.resume_after_content);

        if !interrupted_playback
            || self.flags.user_stopped
            || self.flags.exhausted
            || self.deliberately_paused()
        {
            debug!("Foreground content ended; nothing to resume");
            return;
        }
        info!("Foreground content ended; resuming stream");
        self.resume_playback("Resuming...").await;
    }

    pub(super) fn set_backgrounded(&mut self, backgrounded: bool) {
        if self.flags.backgrounded != backgrounded {
            info!(
                "App moved to the {}",
                if backgrounded { "background" } else { "foreground" }
            );
        }
        self.flags.backgrounded = backgrounded;
    }

    pub(super) async fn handle_focus(&mut self, event: FocusEvent) {
        let current = self.status.status();
        match event {
            FocusEvent::InterruptionBegin => {
                if matches!(current, PlaybackStatus::Idle | PlaybackStatus::Paused) {
                    return;
                }
                info!("Audio interruption began");
                self.flags.paused_by_interruption = true;
                self.suspend().await;
            }
            FocusEvent::InterruptionEnd { resumable } => {
                if !self.flags.paused_by_interruption {
                    return;
                }
                self.flags.paused_by_interruption = false;

                if !resumable {
                    info!("Audio interruption ended; not resumable");
                    self.flags.paused_by_user = true;
                } else if self.flags.user_stopped
                    || self.flags.paused_for_foreground_content
                    || self.flags.paused_by_user
                {
                    debug!("Audio interruption ended; staying paused");
                } else {
                    info!("Audio interruption ended; resuming");
                    self.resume_playback("Resuming...").await;
                }
            }
            FocusEvent::BecomingNoisy => {
                if current == PlaybackStatus::Idle {
                    return;
                }
                info!("Audio output becoming noisy; pausing");
                self.flags.paused_by_interruption = false;
                self.flags.paused_by_user = true;
                if current != PlaybackStatus::Paused {
                    self.suspend().await;
                }
            }
        }
    }
}
