//! Remote configuration collaborator
//!
//! The station URL can be overridden remotely. It is resolved once before
//! the first connect; a slow, failing or malformed answer falls back to the
//! locally configured URL.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    /// Remote stream URL, `None` if the remote has no override
    async fn stream_url(&self) -> Result<Option<String>>;
}

/// GET a JSON document with a `stream_url` key
pub struct HttpRemoteConfig {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RemoteDocument {
    #[serde(default)]
    stream_url: Option<String>,
}

impl HttpRemoteConfig {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RemoteConfigSource for HttpRemoteConfig {
    async fn stream_url(&self) -> Result<Option<String>> {
        let document: RemoteDocument = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::RemoteConfig(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::RemoteConfig(format!("invalid document: {}", e)))?;

        Ok(document.stream_url.filter(|s| !s.trim().is_empty()))
    }
}

/// Resolve the stream URL, never failing
pub async fn resolve_stream_url(
    source: Option<&dyn RemoteConfigSource>,
    fallback: &str,
    timeout: Duration,
) -> String {
    let Some(source) = source else {
        return fallback.to_string();
    };

    match tokio::time::timeout(timeout, source.stream_url()).await {
        Ok(Ok(Some(url))) if is_stream_url(&url) => {
            info!("Using remote stream URL: {}", url);
            url
        }
        Ok(Ok(Some(url))) => {
            warn!("Ignoring remote stream URL with unsupported scheme: {}", url);
            fallback.to_string()
        }
        Ok(Ok(None)) => fallback.to_string(),
        Ok(Err(e)) => {
            warn!("Remote config unavailable, using {}: {}", fallback, e);
            fallback.to_string()
        }
        Err(_) => {
            warn!("Remote config timed out after {:?}, using {}", timeout, fallback);
            fallback.to_string()
        }
    }
}

fn is_stream_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
