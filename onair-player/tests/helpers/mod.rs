//! Test helpers for engine integration tests
//!
//! Provides scripted collaborators:
//! - MockPlayerFactory: records every player command, lets tests inject
//!   player events, and can make commands fail or hang
//! - RecordingSink: captures telemetry events
//! - MockWakeLock / MockProbe: platform and connectivity doubles
//!
//! All engine tests run on a paused clock, so timers fire as soon as the
//! runtime is otherwise idle.

#![allow(dead_code)]

use async_trait::async_trait;
use onair_common::events::{PlaybackStatus, StreamEvent};
use onair_player::config::EngineConfig;
use onair_player::error::{Error, Result};
use onair_player::platform::WakeLock;
use onair_player::player::{PlayerEvent, PlayerEventSender, PlayerFactory, ProcessingState, StreamPlayer};
use onair_player::probe::ConnectivityProbe;
use onair_player::telemetry::TelemetrySink;
use onair_player::playback::{EngineDiagnostics, EngineStatus};
use onair_player::{EngineHandle, PlaybackEngine};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const STREAM_URL: &str = "https://radio.example.org/live.mp3";

// ============================================================================
// Mock player
// ============================================================================

#[derive(Default)]
struct PlayerShared {
    commands: Mutex<Vec<(u64, String)>>,
    senders: Mutex<Vec<PlayerEventSender>>,
    fail_play: AtomicBool,
    fail_create: AtomicBool,
    hang: AtomicBool,
}

/// Factory handing out scripted players. Clones share state.
#[derive(Clone, Default)]
pub struct MockPlayerFactory {
    shared: Arc<PlayerShared>,
}

struct MockPlayer {
    generation: u64,
    shared: Arc<PlayerShared>,
}

impl MockPlayer {
    async fn record(&self, command: String) -> Result<()> {
        let is_play = command == "play";
        self.shared
            .commands
            .lock()
            .unwrap()
            .push((self.generation, command));

        if self.shared.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if is_play && self.shared.fail_play.load(Ordering::SeqCst) {
            return Err(Error::Player("PlatformException: source error".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StreamPlayer for MockPlayer {
    async fn set_url(&self, url: &str) -> Result<()> {
        self.record(format!("set_url:{}", url)).await
    }

    async fn play(&self) -> Result<()> {
        self.record("play".into()).await
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".into()).await
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop".into()).await
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(format!("set_volume:{:.2}", volume)).await
    }

    async fn dispose(&self) -> Result<()> {
        self.record("dispose".into()).await
    }
}

impl PlayerFactory for MockPlayerFactory {
    fn create(&self, events: PlayerEventSender) -> Result<Arc<dyn StreamPlayer>> {
        if self.shared.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Player("audio session unavailable".into()));
        }
        let player = MockPlayer {
            generation: events.generation(),
            shared: self.shared.clone(),
        };
        self.shared.senders.lock().unwrap().push(events);
        Ok(Arc::new(player))
    }
}

impl MockPlayerFactory {
    /// Commands issued so far, in order, without generations
    pub fn commands(&self) -> Vec<String> {
        self.shared
            .commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn players_created(&self) -> usize {
        self.shared.senders.lock().unwrap().len()
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.shared.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.shared.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.shared.hang.store(hang, Ordering::SeqCst);
    }

    /// Emit from the most recently created player
    pub fn emit(&self, event: PlayerEvent) {
        let senders = self.shared.senders.lock().unwrap();
        let sender = senders.last().expect("no player created yet");
        sender.send(event);
    }

    /// Emit from the `index`-th player ever created (0-based)
    pub fn emit_from(&self, index: usize, event: PlayerEvent) {
        let senders = self.shared.senders.lock().unwrap();
        senders[index].send(event);
    }

    pub fn ready(&self) {
        self.emit(state(true, ProcessingState::Ready));
    }

    pub fn paused_ready(&self) {
        self.emit(state(false, ProcessingState::Ready));
    }

    pub fn buffering(&self) {
        self.emit(state(true, ProcessingState::Buffering));
    }

    pub fn idle(&self) {
        self.emit(state(false, ProcessingState::Idle));
    }

    pub fn completed(&self) {
        self.emit(state(false, ProcessingState::Completed));
    }

    pub fn fault(&self, message: &str) {
        self.emit(PlayerEvent::Fault(message.to_string()));
    }
}

pub fn state(playing: bool, processing: ProcessingState) -> PlayerEvent {
    PlayerEvent::State {
        playing,
        processing,
    }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Value)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }

    pub fn last(&self, name: &str) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, name: &str, properties: Value) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Telemetry("analytics backend unavailable".into()));
        }
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), properties));
        Ok(())
    }
}

// ============================================================================
// Platform and probe doubles
// ============================================================================

#[derive(Default)]
pub struct MockWakeLock {
    pub acquired: AtomicU32,
    pub released: AtomicU32,
    pub fail: AtomicBool,
}

#[async_trait]
impl WakeLock for MockWakeLock {
    async fn acquire(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Platform("MissingPluginException".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Probe answering from a script; reachable once the script runs out
#[derive(Default)]
pub struct MockProbe {
    script: Mutex<VecDeque<bool>>,
    pub calls: AtomicU32,
}

impl MockProbe {
    pub fn scripted(results: &[bool]) -> Self {
        Self {
            script: Mutex::new(results.iter().copied().collect()),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for MockProbe {
    async fn check(&self, _url: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reachable = self.script.lock().unwrap().pop_front().unwrap_or(true);
        if reachable {
            Ok(())
        } else {
            Err(Error::Probe("no route to host".into()))
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: EngineHandle,
    pub player: MockPlayerFactory,
    pub telemetry: Arc<RecordingSink>,
    pub events: broadcast::Receiver<StreamEvent>,
}

pub async fn spawn_engine(config: EngineConfig) -> Harness {
    spawn_engine_with(config, |builder| builder).await
}

/// Spawn with extra builder customization (probe, wake lock, ...)
pub async fn spawn_engine_with<F>(config: EngineConfig, customize: F) -> Harness
where
    F: FnOnce(onair_player::playback::EngineBuilder) -> onair_player::playback::EngineBuilder,
{
    let player = MockPlayerFactory::default();
    let telemetry = Arc::new(RecordingSink::default());

    let builder = PlaybackEngine::builder(config, STREAM_URL)
        .player_factory(Arc::new(player.clone()))
        .telemetry_sink(telemetry.clone())
        .event_capacity(1024);
    let engine = customize(builder).spawn().await.expect("engine spawn");
    let events = engine.subscribe_events().expect("event bus");

    Harness {
        engine,
        player,
        telemetry,
        events,
    }
}

/// Let the engine drain its inbox (paused clock: advances 1 ms)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

impl Harness {
    pub fn status(&self) -> PlaybackStatus {
        self.engine.status().status
    }

    /// Wait (in virtual time) until the engine publishes `status`
    pub async fn wait_for(&self, status: PlaybackStatus) {
        self.wait_until(|s| s.status == status).await;
    }

    /// Wait (in virtual time) until the published status satisfies `pred`
    pub async fn wait_until<F>(&self, pred: F)
    where
        F: Fn(&EngineStatus) -> bool,
    {
        let mut rx = self.engine.watch_status();
        let reached = tokio::time::timeout(Duration::from_secs(600), async {
            rx.wait_for(|s| pred(s)).await.map(|_| ())
        })
        .await;
        assert!(
            matches!(reached, Ok(Ok(()))),
            "engine never reached the expected state; stuck at {:?}",
            self.engine.status()
        );
    }

    pub async fn diagnostics(&self) -> EngineDiagnostics {
        self.engine.diagnostics().await.expect("engine running")
    }

    /// Play and confirm playback with a ready signal
    pub async fn start_playing(&self) {
        self.engine.play().unwrap();
        settle().await;
        self.player.ready();
        self.wait_for(PlaybackStatus::Playing).await;
    }

    /// Drain all events published so far
    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Status transitions seen so far, as (old, new)
    pub fn transitions(&mut self) -> Vec<(PlaybackStatus, PlaybackStatus)> {
        self.drain_events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::StatusChanged {
                    old_status,
                    new_status,
                    ..
                } => Some((old_status, new_status)),
                _ => None,
            })
            .collect()
    }
}
