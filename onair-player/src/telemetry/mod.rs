//! Session and telemetry reporting
//!
//! Telemetry is observational: the engine reports every stage of recovery
//! and every session boundary, but a failing sink never affects playback.
//! `TelemetryReporter` is the engine-facing wrapper that swallows (and logs)
//! sink failures.

pub mod http;
pub mod session;

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub use http::HttpTelemetrySink;
pub use session::Session;

/// Event names emitted by the engine
pub mod names {
    pub const SESSION_STARTED: &str = "session_started";
    pub const SESSION_ENDED: &str = "session_ended";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const STREAM_DROPPED: &str = "stream_dropped";
    pub const BUFFERING_ESCALATED: &str = "buffering_escalated";
    pub const RECONNECT_SCHEDULED: &str = "reconnect_scheduled";
    pub const RECONNECT_ATTEMPT: &str = "reconnect_attempt";
    pub const PROBE_FAILED: &str = "probe_failed";
    pub const RECONNECT_SUCCEEDED: &str = "reconnect_succeeded";
    pub const RESTART_STARTED: &str = "restart_started";
    pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, name: &str, properties: Value) -> Result<()>;
}

/// Logs events through `tracing`; the default when no endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, name: &str, properties: Value) -> Result<()> {
        info!(target: "onair_player::telemetry", event = name, %properties, "telemetry");
        Ok(())
    }
}

/// Failure-swallowing front for a sink
#[derive(Clone)]
pub struct TelemetryReporter {
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryReporter {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub fn report(&self, name: &str, properties: Value) {
        if let Err(e) = self.sink.emit(name, properties) {
            warn!("Telemetry event '{}' dropped: {}", name, e);
        }
    }
}

impl Default for TelemetryReporter {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl TelemetrySink for Recording {
        fn emit(&self, name: &str, _properties: Value) -> Result<()> {
            self.0.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    struct Broken;

    impl TelemetrySink for Broken {
        fn emit(&self, _name: &str, _properties: Value) -> Result<()> {
            Err(Error::Telemetry("analytics backend unavailable".into()))
        }
    }

    #[test]
    fn test_reporter_forwards_events() {
        let sink = Arc::new(Recording::default());
        let reporter = TelemetryReporter::new(sink.clone());
        reporter.report(names::HEARTBEAT, json!({"continuous_minutes": 1}));
        assert_eq!(*sink.0.lock().unwrap(), vec![names::HEARTBEAT.to_string()]);
    }

    #[test]
    fn test_reporter_swallows_failures() {
        let reporter = TelemetryReporter::new(Arc::new(Broken));
        reporter.report(names::STREAM_DROPPED, json!({}));
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingSink.emit(names::SESSION_STARTED, json!({"id": 1})).is_ok());
    }
}
