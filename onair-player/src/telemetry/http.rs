//! HTTP telemetry sink
//!
//! Events are queued on a bounded channel and POSTed by a background task,
//! so `emit` never waits on the network. When the queue is full the event
//! is dropped and the caller gets an error (which the reporter logs).

use super::TelemetrySink;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use onair_common::time;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct TelemetryRecord {
    event: String,
    timestamp: DateTime<Utc>,
    properties: Value,
}

pub struct HttpTelemetrySink {
    tx: mpsc::Sender<TelemetryRecord>,
    worker: JoinHandle<()>,
}

impl HttpTelemetrySink {
    /// Start the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(client: reqwest::Client, endpoint: impl Into<String>, capacity: usize) -> Self {
        let endpoint = endpoint.into();
        let (tx, mut rx) = mpsc::channel::<TelemetryRecord>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let result = client
                    .post(&endpoint)
                    .json(&record)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status());
                match result {
                    Ok(_) => debug!("Telemetry '{}' delivered", record.event),
                    Err(e) => warn!("Telemetry '{}' delivery failed: {}", record.event, e),
                }
            }
            debug!("Telemetry delivery task stopped");
        });

        Self { tx, worker }
    }
}

impl TelemetrySink for HttpTelemetrySink {
    fn emit(&self, name: &str, properties: Value) -> Result<()> {
        let record = TelemetryRecord {
            event: name.to_string(),
            timestamp: time::now(),
            properties,
        };
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Telemetry("queue full".to_string()),
            mpsc::error::TrySendError::Closed(_) => {
                Error::Telemetry("delivery task stopped".to_string())
            }
        })
    }
}

impl Drop for HttpTelemetrySink {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn collect(State(received): State<Received>, Json(body): Json<Value>) {
        received.lock().await.push(body);
    }

    #[tokio::test]
    async fn test_events_are_posted() {
        let received: Received = Arc::default();
        let router = Router::new()
            .route("/events", post(collect))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let sink = HttpTelemetrySink::spawn(
            reqwest::Client::new(),
            format!("http://{}/events", addr),
            8,
        );
        sink.emit("heartbeat", json!({"continuous_minutes": 3})).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while received.lock().await.is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "telemetry not delivered");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let body = received.lock().await[0].clone();
        assert_eq!(body["event"], "heartbeat");
        assert_eq!(body["properties"]["continuous_minutes"], 3);
    }
}
