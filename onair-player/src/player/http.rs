//! Headless HTTP stream player
//!
//! Pulls the stream body with reqwest and reports connection state the way
//! a media player backend would. Bytes are discarded; this player exists so
//! the engine can be exercised against real stations without an audio
//! device.
//!
//! State mapping:
//! - request in progress → `Loading`
//! - response headers received, body flowing → `Ready`
//! - no bytes within the stall threshold → `Buffering` (until bytes resume)
//! - transport error → `Idle`
//! - end of body → `Completed`
//! - non-success HTTP status → `Fault`

use super::{PlayerEventSender, ProcessingState, StreamPlayer};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default time without data before reporting `Buffering`
pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Inner {
    url: Option<String>,
    volume: f32,
    pull: Option<JoinHandle<()>>,
}

pub struct HttpStreamPlayer {
    client: reqwest::Client,
    events: PlayerEventSender,
    stall_threshold: Duration,
    inner: Mutex<Inner>,
}

impl HttpStreamPlayer {
    pub fn new(client: reqwest::Client, events: PlayerEventSender) -> Self {
        Self {
            client,
            events,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            inner: Mutex::new(Inner {
                volume: 1.0,
                ..Default::default()
            }),
        }
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.stall_threshold = threshold;
        self
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    fn abort_pull(inner: &mut Inner) -> bool {
        match inner.pull.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl StreamPlayer for HttpStreamPlayer {
    async fn set_url(&self, url: &str) -> Result<()> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Player(format!("invalid stream URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Player(format!("unsupported scheme: {}", parsed.scheme())));
        }

        let mut inner = self.inner.lock().await;
        Self::abort_pull(&mut inner);
        inner.url = Some(url.to_string());
        debug!("Stream source set: {}", url);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.pull.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let url = inner
            .url
            .clone()
            .ok_or_else(|| Error::Player("play called before set_url".to_string()))?;

        info!("Opening stream: {}", url);
        inner.pull = Some(tokio::spawn(pull_stream(
            self.client.clone(),
            url,
            self.events.clone(),
            self.stall_threshold,
        )));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        // A live stream cannot be held open while paused; resume reconnects
        Self::abort_pull(&mut inner);
        self.events.state(false, ProcessingState::Ready);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        Self::abort_pull(&mut inner);
        self.events.state(false, ProcessingState::Idle);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner.lock().await.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if Self::abort_pull(&mut inner) {
            debug!("Stream connection closed on dispose");
        }
        inner.url = None;
        Ok(())
    }
}

impl Drop for HttpStreamPlayer {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.get_mut().pull.take() {
            handle.abort();
        }
    }
}

async fn pull_stream(
    client: reqwest::Client,
    url: String,
    events: PlayerEventSender,
    stall_threshold: Duration,
) {
    events.state(true, ProcessingState::Loading);

    let mut response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Stream connection failed: {}", e);
            events.state(false, ProcessingState::Idle);
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!("Stream returned HTTP {}", status);
        events.fault(format!("HTTP {}", status));
        return;
    }

    events.state(true, ProcessingState::Ready);
    let mut stalled = false;
    let mut received: u64 = 0;

    loop {
        match tokio::time::timeout(stall_threshold, response.chunk()).await {
            Ok(Ok(Some(bytes))) => {
                received += bytes.len() as u64;
                if stalled {
                    stalled = false;
                    events.state(true, ProcessingState::Ready);
                }
            }
            Ok(Ok(None)) => {
                info!("Stream ended after {} bytes", received);
                events.state(false, ProcessingState::Completed);
                return;
            }
            Ok(Err(e)) => {
                warn!("Stream read failed after {} bytes: {}", received, e);
                events.state(false, ProcessingState::Idle);
                return;
            }
            Err(_) => {
                if !stalled {
                    stalled = true;
                    debug!("No stream data for {:?}", stall_threshold);
                    events.state(true, ProcessingState::Buffering);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerEvent;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::sync::mpsc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn player() -> (HttpStreamPlayer, mpsc::UnboundedReceiver<(u64, PlayerEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = HttpStreamPlayer::new(reqwest::Client::new(), PlayerEventSender::new(1, tx));
        (player, rx)
    }

    async fn next_state(rx: &mut mpsc::UnboundedReceiver<(u64, PlayerEvent)>) -> PlayerEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("player event")
            .expect("channel open")
            .1
    }

    fn state(playing: bool, processing: ProcessingState) -> PlayerEvent {
        PlayerEvent::State {
            playing,
            processing,
        }
    }

    #[tokio::test]
    async fn test_finite_body_completes() {
        let base = serve(Router::new().route("/live", get(|| async { "not really audio" }))).await;
        let (player, mut rx) = player();

        player.set_url(&format!("{}/live", base)).await.unwrap();
        player.play().await.unwrap();

        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Loading));
        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Ready));
        assert_eq!(next_state(&mut rx).await, state(false, ProcessingState::Completed));
    }

    #[tokio::test]
    async fn test_http_error_is_fault() {
        let base = serve(Router::new().route("/live", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))).await;
        let (player, mut rx) = player();

        player.set_url(&format!("{}/live", base)).await.unwrap();
        player.play().await.unwrap();

        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Loading));
        match next_state(&mut rx).await {
            PlayerEvent::Fault(message) => assert!(message.contains("503")),
            other => panic!("Expected fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_stream_reports_buffering() {
        use axum::body::{Body, Bytes};
        use futures::stream::{self, StreamExt};

        let router = Router::new().route(
            "/live",
            get(|| async {
                let first = stream::once(async { Ok::<_, std::io::Error>(Bytes::from_static(b"ID3")) });
                Body::from_stream(first.chain(stream::pending()))
            }),
        );
        let base = serve(router).await;
        let (player, mut rx) = player();
        let player = player.with_stall_threshold(Duration::from_millis(200));

        player.set_url(&format!("{}/live", base)).await.unwrap();
        player.play().await.unwrap();

        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Loading));
        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Ready));
        assert_eq!(next_state(&mut rx).await, state(true, ProcessingState::Buffering));

        player.stop().await.unwrap();
        assert_eq!(next_state(&mut rx).await, state(false, ProcessingState::Idle));
    }

    #[tokio::test]
    async fn test_play_requires_url() {
        let (player, _rx) = player();
        assert!(player.play().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let (player, _rx) = player();
        assert!(player.set_url("file:///etc/passwd").await.is_err());
        assert!(player.set_url("not a url").await.is_err());
    }

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let (player, _rx) = player();
        player.set_volume(1.7).await.unwrap();
        assert_eq!(player.volume().await, 1.0);
    }

    #[tokio::test]
    async fn test_stop_reports_idle() {
        let (player, mut rx) = player();
        player.stop().await.unwrap();
        assert_eq!(next_state(&mut rx).await, state(false, ProcessingState::Idle));
    }
}
