//! HTTP surface for the repository documentation evaluation and
//! remediation engine (`spec.md` §6, `H3`): thin request/response binding
//! over the Job Manager and SSE Bus. No orchestration logic lives here.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

pub use routes::build_router;
pub use state::AppState;

/// Bind and serve the HTTP surface until the process is terminated.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run_server(state: std::sync::Arc<AppState>, bind_address: &str) -> repodoc_domain::error::Result<()> {
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|err| repodoc_domain::error::Error::internal(format!("binding {bind_address}: {err}")))?;
    tracing::info!(bind_address, "repodoc server listening");
    state.mark_ready();
    axum::serve(listener, app)
        .await
        .map_err(|err| repodoc_domain::error::Error::internal(format!("server error: {err}")))?;
    Ok(())
}
