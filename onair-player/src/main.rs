//! OnAir Player (onair-player) - Main entry point
//!
//! Headless stream player: resolves configuration, starts the resilience
//! engine against the configured station and exposes it over HTTP/SSE until
//! Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use onair_common::config::ConfigFileResolver;
use onair_player::api::{self, AppContext};
use onair_player::config::PlayerConfig;
use onair_player::player::{HttpStreamPlayer, PlayerEventSender, PlayerFactory, StreamPlayer};
use onair_player::probe::HttpProbe;
use onair_player::remote_config::HttpRemoteConfig;
use onair_player::telemetry::{HttpTelemetrySink, TelemetrySink, TracingSink};
use onair_player::PlaybackEngine;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for onair-player
#[derive(Parser, Debug)]
#[command(name = "onair-player")]
#[command(about = "Resilient internet radio stream player")]
#[command(version)]
struct Args {
    /// Config file (falls back to ONAIR_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ONAIR_PORT")]
    port: Option<u16>,

    /// Stream URL (overrides the config file)
    #[arg(long, env = "ONAIR_STREAM_URL")]
    stream_url: Option<String>,

    /// Start idle instead of connecting immediately
    #[arg(long)]
    no_autoplay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigFileResolver::new().resolve(args.config.as_deref());
    let config = PlayerConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config).context("Failed to initialize logging")?;

    let port = args.port.unwrap_or(config.bootstrap.port);
    let stream_url = args
        .stream_url
        .clone()
        .unwrap_or_else(|| config.bootstrap.stream_url_or_default());

    info!("Starting OnAir Player v{} on port {}", env!("CARGO_PKG_VERSION"), port);
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file; using built-in defaults"),
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("onair-player/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let player_client = client.clone();
    let factory: Arc<dyn PlayerFactory> = Arc::new(
        move |events: PlayerEventSender| -> onair_player::Result<Arc<dyn StreamPlayer>> {
            Ok(Arc::new(HttpStreamPlayer::new(player_client.clone(), events)))
        },
    );

    let telemetry: Arc<dyn TelemetrySink> = match &config.bootstrap.telemetry_url {
        Some(url) => {
            info!("Telemetry endpoint: {}", url);
            Arc::new(HttpTelemetrySink::spawn(
                client.clone(),
                url.clone(),
                config.engine.telemetry.queue_capacity,
            ))
        }
        None => Arc::new(TracingSink),
    };

    let mut builder = PlaybackEngine::builder(config.engine.clone(), stream_url)
        .player_factory(factory)
        .telemetry_sink(telemetry);
    if config.engine.probe.enabled {
        builder = builder.probe(Arc::new(HttpProbe::new(client.clone())));
    }
    if let Some(url) = &config.bootstrap.remote_config_url {
        builder = builder.remote_config(Arc::new(HttpRemoteConfig::new(client.clone(), url.clone())));
    }

    // No wake lock on desktop platforms
    let engine = builder
        .spawn()
        .await
        .context("Failed to initialize playback engine")?;
    info!("Playback engine initialized for {}", engine.stream_url());

    if !args.no_autoplay {
        engine.play().context("Failed to start playback")?;
    }

    let ctx = AppContext {
        engine: engine.clone(),
        port,
    };
    api::run(ctx, shutdown_signal()).await.context("Server error")?;

    engine.dispose().await.context("Failed to dispose engine")?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &PlayerConfig) -> Result<()> {
    let level = &config.bootstrap.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "onair_player={level},onair_common={level},tower_http={level}",
            level = level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match &config.bootstrap.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
