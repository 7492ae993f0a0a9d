//! Port implementations for the repository documentation evaluation and
//! remediation engine: providers, git workspace, line counting, the SSE
//! event bus, the in-memory job store, the Job Manager, configuration, and
//! logging.

pub mod config;
pub mod evaluators;
pub mod git_workspace;
pub mod job_manager;
pub mod line_counter;
pub mod logging;
pub mod providers;
pub mod sse_bus;
pub mod store;
