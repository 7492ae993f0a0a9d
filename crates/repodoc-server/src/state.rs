//! Shared state handed to every handler (`SPEC_FULL.md` §6, grounded on the
//! teacher pack's `ServerState` shape in
//! `examples/5dlabs-cto/crates/healer/src/ci/server.rs`: one struct bundling
//! every collaborator, built once and wrapped in `Arc`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use repodoc_domain::ports::{EventBus, JobStore};
use repodoc_domain::value_objects::{JobId, RemediationId};
use repodoc_infrastructure::config::AppConfig;
use repodoc_infrastructure::job_manager::JobManager;

/// Everything an HTTP handler needs: the Job Manager, the event bus
/// (duplicated from the Job Manager's own handle for direct SSE
/// subscription), the storage collaborator, loaded configuration, and a
/// readiness flag flipped once the worker pools are up.
pub struct AppState {
    /// Drives job admission, cancellation, and lookup.
    pub job_manager: Arc<JobManager>,
    /// Persisted evaluation/remediation records.
    pub store: Arc<dyn JobStore>,
    /// Per-job event log, subscribed to directly by the SSE endpoints.
    pub event_bus: Arc<dyn EventBus>,
    /// Loaded application configuration.
    pub config: AppConfig,
    /// Flips to `true` once the Job Manager's worker pools have been spawned.
    ready: AtomicBool,
    /// Tracks the most recent post-remediation re-evaluation job per
    /// remediation id, so `POST /api/remediation/:id/evaluate` can report
    /// `already_exists` instead of queuing a duplicate (`spec.md` §6).
    pub post_remediation_jobs: DashMap<RemediationId, JobId>,
}

impl AppState {
    /// Build state around an already-spawned Job Manager.
    #[must_use]
    pub fn new(job_manager: Arc<JobManager>, store: Arc<dyn JobStore>, event_bus: Arc<dyn EventBus>, config: AppConfig) -> Self {
        Self {
            job_manager,
            store,
            event_bus,
            config,
            ready: AtomicBool::new(false),
            post_remediation_jobs: DashMap::new(),
        }
    }

    /// Mark the service ready to accept traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether the service has finished starting up.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Build the SSE URL for a job of either kind. The stream endpoint is
    /// keyed purely by job id (`spec.md` §6 `GET /api/evaluate/:id/stream`);
    /// a remediation job's events are reachable the same way.
    #[must_use]
    pub fn sse_url(&self, job_id: JobId) -> String {
        format!("/api/evaluate/{job_id}/stream")
    }
}
