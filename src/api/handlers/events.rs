use crate::{types::Result, AppState};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// Stream a session's progress events over SSE
///
/// A subscriber attaching mid-run receives events from its attach point
/// forward. The stream ends when the session reaches a terminal state.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/events",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 404, description = "Unknown session")
    ),
    tag = "sessions"
)]
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    // Confirms the session exists before subscribing
    state.store.snapshot(id).await?;
    let receiver = state.emitter.subscribe(id);

    let stream = async_stream::stream! {
        let Some(mut receiver) = receiver else {
            // Channel already closed: the session finished. Nothing
            // more will be published.
            return;
        };
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    match Event::default().json_data(&event) {
                        Ok(sse_event) => yield Ok(sse_event),
                        Err(e) => {
                            tracing::warn!(session_id = %id, error = %e, "unserializable event dropped");
                        }
                    }
                }
                // Slow subscriber fell behind the bounded channel;
                // skip the dropped events and continue
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id = %id, skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
