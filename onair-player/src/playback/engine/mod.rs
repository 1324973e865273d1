//! Playback state machine
//!
//! The engine is a single actor task that owns every piece of mutable
//! playback state: the player, the buffer health monitor, the reconnection
//! scheduler, the timers, the session and the wake lock. Everything that can
//! change that state arrives as a message on one of four channels and is
//! handled to completion before the next message:
//!
//! - user commands (`EngineHandle`)
//! - raw player transitions (`PlayerEventSender`)
//! - timer firings (`Timers`)
//! - connectivity probe results
//!
//! Observers never touch the actor. They read the `EngineStatus` watch
//! channel or subscribe to the `StreamEvent` bus.
//!
//! The actor exits when `dispose` is called or when every handle has been
//! dropped. Either way it runs the same cleanup and then drops its senders,
//! which closes the status channel and the event bus exactly once.

mod commands;
mod core;
mod events;
mod recovery;
mod session;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::platform::{FocusEvent, WakeLock};
use crate::player::PlayerFactory;
use crate::playback::status::EngineStatus;
use crate::probe::ConnectivityProbe;
use crate::remote_config::{self, RemoteConfigSource};
use crate::telemetry::TelemetrySink;
use onair_common::events::{EventBus, StreamEvent};
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::info;
use uuid::Uuid;

use self::core::Collaborators;
pub use self::core::PlaybackEngine;

/// Default capacity of the `StreamEvent` broadcast bus
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Messages from handles to the actor
#[derive(Debug)]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
    SetVolume(f32),
    ForceRestart,
    PauseForForegroundContent,
    ResumeAfterForegroundContent,
    SetBackgrounded(bool),
    Focus(FocusEvent),
    Diagnostics(oneshot::Sender<EngineDiagnostics>),
    Dispose(oneshot::Sender<()>),
}

/// Internal counters, exposed for the status API and tests
#[derive(Debug, Clone, Serialize)]
pub struct EngineDiagnostics {
    pub stream_url: String,
    pub player_generation: u64,
    pub player_active: bool,
    pub attempt_count: u32,
    pub consecutive_error_count: u32,
    pub total_attempts: u32,
    pub backoff_pinned: bool,
    pub buffer_health: u8,
    pub stability_score: f64,
    pub user_stopped: bool,
    pub paused_for_foreground_content: bool,
    pub backgrounded: bool,
    pub exhausted: bool,
    pub restart_in_flight: bool,
    pub probe_in_flight: bool,
    pub session_id: Option<Uuid>,
    pub session_reconnections: u32,
    pub pending_timers: Vec<String>,
}

/// Cloneable handle to a running engine
///
/// Command methods return `Error::EngineClosed` once the engine is gone;
/// `dispose` is the exception and always succeeds.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    status: watch::Receiver<EngineStatus>,
    events: Weak<EventBus>,
    stream_url: Arc<str>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::EngineClosed)
    }

    pub fn play(&self) -> Result<()> {
        self.send(EngineCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    /// Volume in `[0.0, 1.0]`; out-of-range values are clamped
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(EngineCommand::SetVolume(volume))
    }

    /// Tear down and rebuild the player now
    pub fn force_restart(&self) -> Result<()> {
        self.send(EngineCommand::ForceRestart)
    }

    /// Host app is about to play its own content (ad, video)
    pub fn pause_for_foreground_content(&self) -> Result<()> {
        self.send(EngineCommand::PauseForForegroundContent)
    }

    pub fn resume_after_foreground_content(&self) -> Result<()> {
        self.send(EngineCommand::ResumeAfterForegroundContent)
    }

    pub fn set_backgrounded(&self, backgrounded: bool) -> Result<()> {
        self.send(EngineCommand::SetBackgrounded(backgrounded))
    }

    pub fn focus(&self, event: FocusEvent) -> Result<()> {
        self.send(EngineCommand::Focus(event))
    }

    /// Latest published status
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Status watch channel; closes when the engine exits
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    pub fn subscribe_events(&self) -> Result<broadcast::Receiver<StreamEvent>> {
        self.events
            .upgrade()
            .map(|bus| bus.subscribe())
            .ok_or(Error::EngineClosed)
    }

    pub async fn diagnostics(&self) -> Result<EngineDiagnostics> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Diagnostics(tx))?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// Stop the engine and release everything it holds. Idempotent.
    pub async fn dispose(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(EngineCommand::Dispose(tx)).is_err() {
            return Ok(());
        }
        // A dropped ack means another dispose won the race
        let _ = rx.await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Stream URL resolved at startup
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

/// Engine factory; see `PlaybackEngine::builder`
pub struct EngineBuilder {
    config: EngineConfig,
    stream_url: String,
    initial_volume: f32,
    event_capacity: usize,
    player_factory: Option<Arc<dyn PlayerFactory>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    remote_config: Option<Arc<dyn RemoteConfigSource>>,
    wake_lock: Option<Arc<dyn WakeLock>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl PlaybackEngine {
    /// Start building an engine for `stream_url` (used unless remote config
    /// overrides it)
    pub fn builder(config: EngineConfig, stream_url: impl Into<String>) -> EngineBuilder {
        EngineBuilder {
            config,
            stream_url: stream_url.into(),
            initial_volume: 1.0,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            player_factory: None,
            probe: None,
            remote_config: None,
            wake_lock: None,
            telemetry: None,
        }
    }
}

impl EngineBuilder {
    pub fn player_factory(mut self, factory: Arc<dyn PlayerFactory>) -> Self {
        self.player_factory = Some(factory);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn remote_config(mut self, source: Arc<dyn RemoteConfigSource>) -> Self {
        self.remote_config = Some(source);
        self
    }

    /// Platform wake lock; leave unset when the platform has none
    pub fn wake_lock(mut self, lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = Some(lock);
        self
    }

    pub fn telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Validate, resolve the stream URL and start the actor
    pub async fn spawn(self) -> Result<EngineHandle> {
        self.config.validate()?;
        let factory = self
            .player_factory
            .ok_or_else(|| Error::Config("no player factory configured".to_string()))?;

        let stream_url = remote_config::resolve_stream_url(
            self.remote_config.as_deref(),
            &self.stream_url,
            self.config.timeouts.remote_config(),
        )
        .await;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let collaborators = Collaborators {
            factory,
            probe: self.probe,
            wake_lock: self.wake_lock,
            telemetry: self.telemetry,
        };
        let (engine, inputs, status_rx, events) = PlaybackEngine::new(
            self.config,
            stream_url.clone(),
            collaborators,
            self.initial_volume,
            self.event_capacity,
            cmd_rx,
        );

        info!("Starting playback engine for {}", stream_url);
        tokio::spawn(engine.run(inputs));

        Ok(EngineHandle {
            commands: cmd_tx,
            status: status_rx,
            events,
            stream_url: stream_url.into(),
        })
    }
}
