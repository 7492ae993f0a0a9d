//! In-memory `EventBus`: one bounded ring plus a broadcast channel per job
//! (`spec.md` §4.11, `SPEC_FULL.md` H2).

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::BoxStream;
use repodoc_domain::events::DomainEvent;
use repodoc_domain::ports::EventBus;
use repodoc_domain::value_objects::JobId;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

struct JobLog {
    history: VecDeque<DomainEvent>,
    sender: broadcast::Sender<DomainEvent>,
}

/// Publish/subscribe over per-job event logs, backed by one bounded
/// `VecDeque` ring plus a `tokio::sync::broadcast` channel per job id.
/// Publishing never blocks on a slow subscriber: a lagging receiver only
/// misses live events it hasn't polled yet, never stalls the publisher.
pub struct SseBus {
    logs: DashMap<JobId, Mutex<JobLog>>,
    ring_capacity: usize,
}

impl SseBus {
    /// Build a bus whose per-job ring holds at most `ring_capacity` events.
    #[must_use]
    pub fn new(ring_capacity: usize) -> Self {
        Self { logs: DashMap::new(), ring_capacity: ring_capacity.max(1) }
    }
}

impl Default for SseBus {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl EventBus for SseBus {
    async fn publish(&self, job_id: JobId, event: DomainEvent) {
        let entry = self
            .logs
            .entry(job_id)
            .or_insert_with(|| Mutex::new(JobLog { history: VecDeque::new(), sender: broadcast::channel(BROADCAST_CAPACITY).0 }));
        let mut log = entry.lock().expect("job log mutex poisoned");
        if log.history.len() >= self.ring_capacity {
            log.history.pop_front();
        }
        log.history.push_back(event.clone());
        let _ = log.sender.send(event);
    }

    fn subscribe(&self, job_id: JobId) -> BoxStream<'static, DomainEvent> {
        let entry = self
            .logs
            .entry(job_id)
            .or_insert_with(|| Mutex::new(JobLog { history: VecDeque::new(), sender: broadcast::channel(BROADCAST_CAPACITY).0 }));
        let log = entry.lock().expect("job log mutex poisoned");
        let history: Vec<DomainEvent> = log.history.iter().cloned().collect();
        let already_terminal = history.iter().any(DomainEvent::is_terminal);
        let mut receiver = log.sender.subscribe();
        drop(log);

        Box::pin(async_stream::stream! {
            for event in history {
                yield event;
            }
            if already_terminal {
                return;
            }
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn job_started(job_id: JobId) -> DomainEvent {
        DomainEvent::JobStarted { job_id }
    }

    fn job_completed(job_id: JobId) -> DomainEvent {
        DomainEvent::JobCompleted { job_id, percentage: 100 }
    }

    #[tokio::test]
    async fn subscribe_replays_history_then_streams_live_events() {
        let bus = SseBus::default();
        let job_id = JobId::new();
        bus.publish(job_id, job_started(job_id)).await;

        let mut stream = bus.subscribe(job_id);
        let first = stream.next().await.expect("history event");
        assert!(matches!(first, DomainEvent::JobStarted { .. }));

        bus.publish(job_id, job_completed(job_id)).await;
        let second = stream.next().await.expect("live event");
        assert!(second.is_terminal());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn subscribe_after_terminal_event_only_replays_and_closes() {
        let bus = SseBus::default();
        let job_id = JobId::new();
        bus.publish(job_id, job_started(job_id)).await;
        bus.publish(job_id, job_completed(job_id)).await;

        let events: Vec<DomainEvent> = bus.subscribe(job_id).collect().await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn ring_drops_oldest_past_capacity() {
        let bus = SseBus::new(2);
        let job_id = JobId::new();
        for _ in 0..5 {
            bus.publish(job_id, job_started(job_id)).await;
        }
        bus.publish(job_id, job_completed(job_id)).await;
        let events: Vec<DomainEvent> = bus.subscribe(job_id).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.last().unwrap().is_terminal());
    }
}
