//! Process entrypoint flags (`SPEC_FULL.md` §1.1 ambient stack). The HTTP
//! API in `spec.md` §6 is the engine's only in-scope external interface —
//! this binary exists to boot that server, not to re-implement the
//! out-of-scope CLI collaborator named in `spec.md` §1.

use std::path::PathBuf;

use clap::Parser;

/// Start the repository documentation evaluation and remediation server.
#[derive(Debug, Parser)]
#[command(name = "repodoc")]
#[command(about = "Repository documentation evaluation and remediation server")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file. Falls back to `REPODOC_CONFIG`,
    /// then built-in defaults (`repodoc_infrastructure::config::ConfigLoader`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured bind address (`host:port`).
    #[arg(long)]
    pub bind: Option<String>,

    /// Emit structured JSON logs instead of the compact human-readable
    /// format. Defaults to on when `REPODOC_JSON_LOGS` is set.
    #[arg(long)]
    pub json_logs: bool,
}
