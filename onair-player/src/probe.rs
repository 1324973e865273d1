//! Connectivity probe
//!
//! Optional pre-check run before each incremental reconnect. An unreachable
//! result counts as a failed attempt; the engine reschedules instead of
//! handing a dead URL to the player.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `Ok(())` if the stream host answered
    async fn check(&self, url: &str) -> Result<()>;
}

/// HEAD request against the stream URL. Any status below 500 counts as
/// reachable: many stream servers answer HEAD with 4xx while serving GET.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn check(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::Probe(e.to_string()))?;

        let status = response.status();
        debug!("Probe {} -> {}", url, status);
        if status.is_server_error() {
            return Err(Error::Probe(format!("server error: {}", status)));
        }
        Ok(())
    }
}

/// Run a probe under a hard timeout
pub async fn probe_with_timeout(
    probe: &dyn ConnectivityProbe,
    url: &str,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, probe.check(url)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Probe(format!("no answer within {:?}", timeout))),
    }
}
