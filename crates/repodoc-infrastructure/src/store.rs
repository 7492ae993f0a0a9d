//! In-memory `JobStore` (`spec.md` §4.10 persistence hooks,
//! `SPEC_FULL.md` H1): evaluation and remediation records keyed by id,
//! held for the life of the process only.

use async_trait::async_trait;
use dashmap::DashMap;
use repodoc_domain::error::Result;
use repodoc_domain::ports::{EvaluationRecord, JobStore, RemediationRecord};
use repodoc_domain::value_objects::{EvaluationId, RemediationId};

/// A `JobStore` backed by two `DashMap`s. Nothing survives a restart: this
/// is why, at startup, any remediation record left in `running` status is
/// abandoned rather than resumed (`SPEC_FULL.md` §9 Open Question).
#[derive(Default)]
pub struct InMemoryJobStore {
    evaluations: DashMap<EvaluationId, EvaluationRecord>,
    remediations: DashMap<RemediationId, RemediationRecord>,
}

impl InMemoryJobStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every remediation record still in `running` status as
    /// abandoned, returning how many were changed. Called once at startup,
    /// since the Job Manager's live job map never survives a restart and a
    /// `running` record left behind can only mean the process died mid-job.
    pub fn abandon_running_remediations(&self) -> usize {
        let mut count = 0;
        for mut entry in self.remediations.iter_mut() {
            if entry.status == "running" {
                entry.status = "failed".to_owned();
                count += 1;
            }
        }
        count
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save_evaluation(&self, record: EvaluationRecord) -> Result<EvaluationId> {
        let id = record.id;
        self.evaluations.insert(id, record);
        Ok(id)
    }

    async fn load_evaluation(&self, id: EvaluationId) -> Result<Option<EvaluationRecord>> {
        Ok(self.evaluations.get(&id).map(|entry| entry.clone()))
    }

    async fn save_remediation(&self, record: RemediationRecord) -> Result<RemediationId> {
        let id = record.id;
        self.remediations.insert(id, record);
        Ok(id)
    }

    async fn load_remediation(&self, id: RemediationId) -> Result<Option<RemediationRecord>> {
        Ok(self.remediations.get(&id).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repodoc_domain::entities::{
        EvaluationBody, EvaluationMetadata, EvaluationResult, ProjectContext, UsageTotals,
    };
    use repodoc_domain::value_objects::EvaluationMode;

    fn evaluation_record() -> EvaluationRecord {
        EvaluationRecord {
            id: EvaluationId::new(),
            repository_url: "https://example.com/acme/repo.git".to_owned(),
            git_branch: None,
            git_commit_sha: None,
            created_at: Utc::now(),
            result: EvaluationResult {
                metadata: EvaluationMetadata {
                    generated_at: Utc::now(),
                    provider: "random".to_owned(),
                    mode: EvaluationMode::Independent,
                    total_files: 0,
                    project_context: ProjectContext::unknown(),
                    usage: UsageTotals::default(),
                    failed_evaluators: Vec::new(),
                    curation: None,
                },
                body: EvaluationBody::Independent { files: std::collections::HashMap::new() },
                cross_file_issues: Vec::new(),
            },
            cost_usd: 0.0,
            duration_ms: 0,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryJobStore::new();
        let record = evaluation_record();
        let id = store.save_evaluation(record.clone()).await.unwrap();
        let loaded = store.load_evaluation(id).await.unwrap().expect("present");
        assert_eq!(loaded.repository_url, record.repository_url);
    }

    #[tokio::test]
    async fn load_unknown_id_returns_none() {
        let store = InMemoryJobStore::new();
        assert!(store.load_evaluation(EvaluationId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abandon_running_remediations_only_touches_running_records() {
        let store = InMemoryJobStore::new();
        let mut running = RemediationRecord {
            id: RemediationId::new(),
            evaluation_id: EvaluationId::new(),
            created_at: Utc::now(),
            status: "running".to_owned(),
            full_patch: None,
            file_changes: None,
            total_additions: 0,
            total_deletions: 0,
            summary: None,
            phase_stats: None,
        };
        let mut completed = running.clone();
        completed.id = RemediationId::new();
        completed.status = "completed".to_owned();

        store.save_remediation(running.clone()).await.unwrap();
        store.save_remediation(completed.clone()).await.unwrap();

        let changed = store.abandon_running_remediations();
        assert_eq!(changed, 1);

        running.status = "failed".to_owned();
        assert_eq!(store.load_remediation(running.id).await.unwrap().unwrap().status, "failed");
        assert_eq!(store.load_remediation(completed.id).await.unwrap().unwrap().status, "completed");
    }
}
