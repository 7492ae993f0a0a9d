//! The SSE Bus port: per-job typed event stream with back-fill
//! (`spec.md` §4.11, H2).

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::events::DomainEvent;
use crate::value_objects::JobId;

/// Publish/subscribe over one job's event log.
///
/// `publish` appends to a bounded, append-only log and fans out to current
/// subscribers, never blocking on a slow subscriber (`spec.md` §4.11
/// backpressure note). `subscribe` immediately replays the existing log in
/// order, then streams new events until the job reaches a terminal state.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append `event` to `job_id`'s log and notify current subscribers.
    async fn publish(&self, job_id: JobId, event: DomainEvent);

    /// Subscribe to `job_id`'s log: historical events first, then live
    /// events until a terminal event closes the stream.
    fn subscribe(&self, job_id: JobId) -> BoxStream<'static, DomainEvent>;
}
