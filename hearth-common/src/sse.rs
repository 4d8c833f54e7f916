//! Server-Sent Events (SSE) utilities
//!
//! Bridges the broadcast event bus to HTTP consumers. Used by hearth-he to
//! expose engine progress and tier transitions as a live stream.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Create an SSE stream over the event bus
///
/// Each `HeatEvent` is serialized to JSON and sent as a `HeatEvent` SSE
/// event. A lagged subscriber (bus buffer overrun) skips the missed events
/// and keeps streaming; the events are advisory, the stores are the source
/// of truth.
pub fn create_event_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        // Initial connected status for connection monitoring UIs
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok(Event::default().event("HeatEvent").data(json));
                    }
                    Err(e) => {
                        warn!("SSE: failed to serialize event: {}", e);
                    }
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!("SSE: {} subscriber lagged, {} events dropped", service_name, missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
