//! Core playback engine - actor state, event loop and player access
//!
//! **Responsibilities:**
//! - PlaybackEngine struct definition and initialization
//! - The `select!` loop that serializes every input
//! - Player lifecycle (create, command with timeout, dispose)
//! - Shutdown
//!
//! Command handling lives in `commands.rs`, player event classification in
//! `events.rs`, reconnect/restart/terminal logic in `recovery.rs` and session
//! bookkeeping in `session.rs`.

use super::{EngineCommand, EngineDiagnostics};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::platform::{WakeLock, WakeLockController};
use crate::player::{PlayerEvent, PlayerEventSender, PlayerFactory, StreamPlayer};
use crate::playback::buffer_health::BufferHealthMonitor;
use crate::playback::reconnect::ReconnectionScheduler;
use crate::playback::status::{EngineStatus, StatusPublisher};
use crate::playback::timers::{TimerFired, TimerKind, Timers};
use crate::probe::ConnectivityProbe;
use crate::telemetry::{Session, TelemetryReporter, TelemetrySink, TracingSink};
use onair_common::events::{EventBus, PlaybackStatus};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Pluggable collaborators handed over by the builder
pub(super) struct Collaborators {
    pub(super) factory: Arc<dyn PlayerFactory>,
    pub(super) probe: Option<Arc<dyn ConnectivityProbe>>,
    pub(super) wake_lock: Option<Arc<dyn WakeLock>>,
    pub(super) telemetry: Option<Arc<dyn TelemetrySink>>,
}

/// Receiving ends of the actor's inputs
pub(super) struct EngineInputs {
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    player_events: mpsc::UnboundedReceiver<(u64, PlayerEvent)>,
    timers: mpsc::UnboundedReceiver<TimerFired>,
    probes: mpsc::UnboundedReceiver<(u64, Result<()>)>,
}

/// Flags that gate automatic recovery
#[derive(Debug, Default)]
pub(super) struct EngineFlags {
    /// Explicit stop; nothing restarts until the next play
    pub(super) user_stopped: bool,
    /// Host app is playing its own content
    pub(super) paused_for_foreground_content: bool,
    /// The foreground pause interrupted live playback, so its end resumes
    pub(super) resume_after_content: bool,
    /// User pause or headphones unplugged; never auto-resumes
    pub(super) paused_by_user: bool,
    /// Audio-focus interruption; may auto-resume
    pub(super) paused_by_interruption: bool,
    pub(super) backgrounded: bool,
    /// Terminal failure surfaced; waiting for play
    pub(super) exhausted: bool,
    pub(super) restart_in_flight: bool,
    /// Next ready signal refills buffer health (explicit play, full restart)
    pub(super) fresh_connection: bool,
}

/// Player command dispatched under the command timeout
#[derive(Debug)]
pub(super) enum PlayerCommand {
    SetUrl(String),
    Play,
    Pause,
    Stop,
    SetVolume(f32),
}

impl PlayerCommand {
    fn name(&self) -> &'static str {
        match self {
            PlayerCommand::SetUrl(_) => "set_url",
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::Stop => "stop",
            PlayerCommand::SetVolume(_) => "set_volume",
        }
    }
}

/// Playback engine actor
pub struct PlaybackEngine {
    pub(super) config: EngineConfig,
    pub(super) stream_url: String,

    pub(super) factory: Arc<dyn PlayerFactory>,
    pub(super) player: Option<Arc<dyn StreamPlayer>>,
    /// Generation of the current player; events tagged otherwise are stale
    pub(super) player_generation: u64,
    pub(super) player_tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
    /// URL and volume have been handed to the current player
    pub(super) source_loaded: bool,
    pub(super) volume: f32,

    pub(super) probe: Option<Arc<dyn ConnectivityProbe>>,
    pub(super) probe_tx: mpsc::UnboundedSender<(u64, Result<()>)>,
    pub(super) probe_generation: u64,
    pub(super) probe_in_flight: bool,

    pub(super) timers: Timers,
    pub(super) status: StatusPublisher,
    pub(super) monitor: BufferHealthMonitor,
    pub(super) scheduler: ReconnectionScheduler,
    pub(super) wake_lock: WakeLockController,
    pub(super) telemetry: TelemetryReporter,
    pub(super) session: Option<Session>,
    pub(super) flags: EngineFlags,
}

impl PlaybackEngine {
    pub(super) fn new(
        config: EngineConfig,
        stream_url: String,
        collaborators: Collaborators,
        volume: f32,
        event_capacity: usize,
        commands: mpsc::UnboundedReceiver<EngineCommand>,
    ) -> (Self, EngineInputs, watch::Receiver<EngineStatus>, Weak<EventBus>) {
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();

        let wake_lock = WakeLockController::new(collaborators.wake_lock, config.timeouts.bridge());
        let (status, status_rx) =
            StatusPublisher::new(EngineStatus::initial(volume, wake_lock.state()), event_capacity);
        let events = status.event_bus();

        let telemetry = TelemetryReporter::new(
            collaborators
                .telemetry
                .unwrap_or_else(|| Arc::new(TracingSink)),
        );

        let engine = Self {
            monitor: BufferHealthMonitor::new(config.buffering.clone()),
            scheduler: ReconnectionScheduler::new(config.reconnect.clone()),
            config,
            stream_url,
            factory: collaborators.factory,
            player: None,
            player_generation: 0,
            player_tx,
            source_loaded: false,
            volume,
            probe: collaborators.probe,
            probe_tx,
            probe_generation: 0,
            probe_in_flight: false,
            timers: Timers::new(timer_tx),
            status,
            wake_lock,
            telemetry,
            session: None,
            flags: EngineFlags::default(),
        };

        let inputs = EngineInputs {
            commands,
            player_events: player_rx,
            timers: timer_rx,
            probes: probe_rx,
        };

        (engine, inputs, status_rx, events)
    }

    /// Actor main loop. Returns after disposal; dropping `self` closes the
    /// status channel and the event bus.
    pub(super) async fn run(mut self, mut inputs: EngineInputs) {
        info!("Playback engine started");

        loop {
            tokio::select! {
                biased;

                command = inputs.commands.recv() => match command {
                    Some(EngineCommand::Dispose(ack)) => {
                        self.shutdown().await;
                        drop(self);
                        let _ = ack.send(());
                        info!("Playback engine disposed");
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All engine handles dropped");
                        self.shutdown().await;
                        return;
                    }
                },

                Some((generation, event)) = inputs.player_events.recv() => {
                    self.handle_player_event(generation, event).await;
                }

                Some(fired) = inputs.timers.recv() => {
                    if self.timers.accept(fired) {
                        self.handle_timer(fired.kind).await;
                    } else {
                        trace!("Ignoring stale {:?} timer", fired.kind);
                    }
                }

                Some((generation, result)) = inputs.probes.recv() => {
                    self.handle_probe_result(generation, result).await;
                }
            }

            self.refresh_background_grace();
        }
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        debug!("Command: {:?}", command);
        match command {
            EngineCommand::Play => self.play().await,
            EngineCommand::Pause => self.pause().await,
            EngineCommand::Stop => self.stop().await,
            EngineCommand::SetVolume(volume) => self.set_volume(volume).await,
            EngineCommand::ForceRestart => self.force_restart().await,
            EngineCommand::PauseForForegroundContent => self.pause_for_foreground_content().await,
            EngineCommand::ResumeAfterForegroundContent => self.resume_after_foreground_content(),
            EngineCommand::SetBackgrounded(backgrounded) => self.set_backgrounded(backgrounded),
            EngineCommand::Focus(event) => self.handle_focus(event).await,
            EngineCommand::Diagnostics(reply) => {
                let _ = reply.send(self.diagnostics());
            }
            // Handled by the run loop
            EngineCommand::Dispose(_) => {}
        }
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        trace!("{:?} timer fired", kind);
        match kind {
            TimerKind::Reconnect => self.on_reconnect_timer().await,
            TimerKind::BufferCheck => self.on_buffer_check().await,
            TimerKind::Heartbeat => self.on_heartbeat(),
            TimerKind::RestartPause => self.finish_restart().await,
            TimerKind::ForegroundResume => self.finish_foreground_resume().await,
            TimerKind::BackgroundGrace => self.on_background_grace(),
        }
    }

    /// True for any pause that must not be undone by recovery
    pub(super) fn deliberately_paused(&self) -> bool {
        self.flags.paused_by_user || self.flags.paused_by_interruption
    }

    pub(super) fn recovery_blocked(&self) -> bool {
        self.flags.user_stopped
            || self.flags.paused_for_foreground_content
            || self.deliberately_paused()
            || self.flags.exhausted
    }

    // ========================================================================
    // Player access
    // ========================================================================

    /// Current player, building one from the factory if none is alive
    pub(super) fn ensure_player(&mut self) -> Result<Arc<dyn StreamPlayer>> {
        if let Some(player) = &self.player {
            return Ok(player.clone());
        }

        self.player_generation += 1;
        let events = PlayerEventSender::new(self.player_generation, self.player_tx.clone());
        let player = self.factory.create(events)?;
        debug!("Created player (generation {})", self.player_generation);

        self.player = Some(player.clone());
        self.source_loaded = false;
        Ok(player)
    }

    /// Send one command to the current player under the command timeout
    pub(super) async fn player_call(&self, command: PlayerCommand) -> Result<()> {
        let Some(player) = self.player.clone() else {
            return Err(Error::Player(format!("no player for {}", command.name())));
        };

        let name = command.name();
        let timeout = self.config.timeouts.player_command();
        let call = async move {
            match command {
                PlayerCommand::SetUrl(url) => player.set_url(&url).await,
                PlayerCommand::Play => player.play().await,
                PlayerCommand::Pause => player.pause().await,
                PlayerCommand::Stop => player.stop().await,
                PlayerCommand::SetVolume(volume) => player.set_volume(volume).await,
            }
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::PlayerTimeout {
                command: name,
                timeout,
            }),
        }
    }

    /// Best-effort command; failures are logged
    pub(super) async fn player_call_logged(&self, command: PlayerCommand) {
        if self.player.is_none() {
            return;
        }
        if let Err(e) = self.player_call(command).await {
            warn!("{}", e);
        }
    }

    /// Hand the source to the player (if needed) and start playback
    pub(super) async fn start_playback(&mut self) -> Result<()> {
        self.ensure_player()?;
        if !self.source_loaded {
            self.player_call(PlayerCommand::SetUrl(self.stream_url.clone()))
                .await?;
            self.player_call(PlayerCommand::SetVolume(self.volume)).await?;
            self.source_loaded = true;
        }
        self.player_call(PlayerCommand::Play).await
    }

    /// Release the current player. Events it still emits become stale.
    pub(super) async fn dispose_player(&mut self) {
        self.source_loaded = false;
        let Some(player) = self.player.take() else {
            return;
        };

        let timeout = self.config.timeouts.player_command();
        match tokio::time::timeout(timeout, player.dispose()).await {
            Ok(Ok(())) => debug!("Disposed player (generation {})", self.player_generation),
            Ok(Err(e)) => warn!("Player dispose failed: {}", e),
            Err(_) => warn!("Player dispose timed out after {:?}", timeout),
        }
    }

    // ========================================================================
    // Wake lock
    // ========================================================================

    pub(super) async fn acquire_wake_lock(&mut self) {
        let state = self.wake_lock.acquire().await;
        self.status.set_wake_lock(state);
    }

    pub(super) async fn release_wake_lock(&mut self) {
        let state = self.wake_lock.release().await;
        self.status.set_wake_lock(state);
    }

    pub(super) fn publish_buffer(&self) {
        self.status.set_buffer(
            self.monitor.health(),
            self.monitor.stability_score(),
            self.monitor.is_degraded(),
        );
    }

    fn diagnostics(&self) -> EngineDiagnostics {
        let retry = self.scheduler.state();
        EngineDiagnostics {
            stream_url: self.stream_url.clone(),
            player_generation: self.player_generation,
            player_active: self.player.is_some(),
            attempt_count: retry.attempt_count,
            consecutive_error_count: retry.consecutive_error_count,
            total_attempts: retry.total_attempts,
            backoff_pinned: retry.pinned,
            buffer_health: self.monitor.health(),
            stability_score: self.monitor.stability_score(),
            user_stopped: self.flags.user_stopped,
            paused_for_foreground_content: self.flags.paused_for_foreground_content,
            backgrounded: self.flags.backgrounded,
            exhausted: self.flags.exhausted,
            restart_in_flight: self.flags.restart_in_flight,
            probe_in_flight: self.probe_in_flight,
            session_id: self.session.as_ref().map(|s| s.id),
            session_reconnections: self
                .session
                .as_ref()
                .map(|s| s.total_reconnections)
                .unwrap_or(0),
            pending_timers: self
                .timers
                .pending()
                .into_iter()
                .map(|kind| format!("{:?}", kind))
                .collect(),
        }
    }

    /// Cancel everything, release the player and the wake lock, flush the
    /// session and publish `Idle`
    async fn shutdown(&mut self) {
        info!("Shutting down playback engine");
        self.flags.user_stopped = true;
        self.flags.restart_in_flight = false;
        self.timers.cancel_all();
        self.cancel_probe();
        self.monitor.abandon_episode();

        self.dispose_player().await;
        self.close_session("dispose");
        self.release_wake_lock().await;

        self.status.set_message("");
        self.status.set_status(PlaybackStatus::Idle);
    }
}
