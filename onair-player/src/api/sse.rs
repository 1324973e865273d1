//! Server-Sent Events (SSE) stream of engine events
//!
//! Each `StreamEvent` becomes one SSE message whose `event` field is the
//! variant name and whose data is the JSON-serialized event. The stream ends
//! when the engine is disposed.

use super::AppContext;
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /api/v1/events
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let rx = ctx
        .engine
        .subscribe_events()
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    debug!("New SSE client connected");

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged: the client missed some events but stays connected
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
