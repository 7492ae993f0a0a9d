//! `GET /api/evaluate/:id/stream` (`spec.md` §4.11, §6.1 SSE wire format).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use repodoc_domain::events::EventEnvelope;
use repodoc_domain::value_objects::JobId;

use crate::state::AppState;

/// Stream one job's event log: historical events first, then live events
/// until the job reaches a terminal state (`spec.md` §4.11). Each event is
/// wrapped in an [`EventEnvelope`] so the SSE `data:` payload carries
/// `jobId` and `timestamp` alongside the type-specific fields, per
/// `spec.md` §6.1's wire format note.
pub async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<JobId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.event_bus.subscribe(job_id);
    let stream = events.map(|event| {
        let name = event.wire_name();
        let envelope = EventEnvelope::new(event);
        let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_owned());
        Ok(Event::default().event(name).data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
