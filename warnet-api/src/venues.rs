use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use warnet_catalog::PcSlot;

use crate::state::AppState;

/// GET /v1/venues/{venue_id}/pcs
/// Countdowns are refreshed to the current instant before returning.
pub async fn list_pcs(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> Json<Vec<PcSlot>> {
    Json(state.orchestrator.pcs(&venue_id).await)
}

/// GET /v1/venues/{venue_id}/events
/// Server-sent stream of the venue's domain events, named by topic.
pub async fn venue_events(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let venue_id = venue_id.clone();
        async move {
            match result {
                Ok(event) if event.venue_id() == venue_id => {
                    match Event::default().event(event.topic()).json_data(&event) {
                        Ok(sse) => Some(Ok(sse)),
                        Err(e) => {
                            tracing::error!("Failed to encode {} for SSE: {}", event.topic(), e);
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("SSE subscriber for {} lagged: {}", venue_id, e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
