//! Process entrypoint: loads configuration, wires the Job Manager's
//! collaborators, and serves the HTTP API (`spec.md` §6, `SPEC_FULL.md` H1-H3).

mod cli;

use std::sync::Arc;

use clap::Parser;
use repodoc_application::{EvaluationOrchestrator, RemediationOrchestrator};
use repodoc_infrastructure::config::ConfigLoader;
use repodoc_infrastructure::evaluators::built_in_evaluators;
use repodoc_infrastructure::git_workspace::CliGitWorkspace;
use repodoc_infrastructure::job_manager::{JobManager, OrchestratorConfig};
use repodoc_infrastructure::line_counter::CliLineCounter;
use repodoc_infrastructure::logging::{init_logging, log_config_loaded};
use repodoc_infrastructure::providers::cli_provider::CLI_PROVIDER_SPECS;
use repodoc_infrastructure::providers::random_provider::RandomProvider;
use repodoc_infrastructure::sse_bus::SseBus;
use repodoc_infrastructure::store::InMemoryJobStore;
use repodoc_server::AppState;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let json_logs = args.json_logs || std::env::var_os("REPODOC_JSON_LOGS").is_some();
    init_logging(json_logs);

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load()?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    log_config_loaded(&config.bind_address, config.queues.capacity, &config.default_provider);

    ensure_providers_linked();

    let event_bus: Arc<dyn repodoc_domain::ports::EventBus> = Arc::new(SseBus::new(config.defaults.sse_ring_capacity));
    let in_memory_store = InMemoryJobStore::new();
    let abandoned = in_memory_store.abandon_running_remediations();
    if abandoned > 0 {
        tracing::warn!(abandoned, "marked leftover running remediations as failed at startup");
    }
    let store: Arc<dyn repodoc_domain::ports::JobStore> = Arc::new(in_memory_store);

    let evaluation_orchestrator =
        Arc::new(EvaluationOrchestrator::new(Arc::new(CliGitWorkspace::new()), Arc::new(CliLineCounter::default()), event_bus.clone()));
    let remediation_orchestrator = Arc::new(RemediationOrchestrator::new(Arc::new(CliGitWorkspace::new()), event_bus.clone()));

    let manager = JobManager::spawn(
        config.queues,
        Arc::new(built_in_evaluators()),
        evaluation_orchestrator,
        remediation_orchestrator,
        OrchestratorConfig::default(),
        event_bus.clone(),
        store.clone(),
    );

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(manager, store, event_bus, config));

    repodoc_server::run_server(state, &bind_address).await?;
    Ok(())
}

/// Touch both provider submodules so their `linkme::distributed_slice`
/// entries are present in the final binary regardless of link-time
/// dead-code elimination (mirrors `RandomProvider::ensure_registered`'s own
/// rationale, generalized to the CLI-backed providers too).
fn ensure_providers_linked() {
    RandomProvider::ensure_registered();
    tracing::debug!(count = CLI_PROVIDER_SPECS.len(), "cli provider specs linked");
}
