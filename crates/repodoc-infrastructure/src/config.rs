//! Typed application configuration, loaded from TOML with environment
//! overrides (`SPEC_FULL.md` §1.1 ambient stack).

use std::env;
use std::path::{Path, PathBuf};

use repodoc_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Queue capacities and worker pool sizes for the Job Manager
/// (`spec.md` §4.10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded queue capacity per lane.
    pub capacity: usize,
    /// Worker pool size for evaluation jobs.
    pub evaluation_workers: usize,
    /// Worker pool size for remediation jobs.
    pub remediation_workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 10, evaluation_workers: 2, remediation_workers: 1 }
    }
}

/// Defaults applied to an admitted job when the request omits them
/// (`spec.md` §6 environment inputs).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Default per-provider-invocation timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Default evaluator concurrency.
    pub concurrency: u32,
    /// Default SSE ring size per job (`spec.md` §4.11 backpressure note).
    pub sse_ring_capacity: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self { timeout_ms: 120_000, concurrency: 4, sse_ring_capacity: 500 }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Job Manager queue/worker tuning.
    pub queues: QueueConfig,
    /// Per-job defaults.
    pub defaults: DefaultsConfig,
    /// Name of the provider used when a request omits one.
    pub default_provider: String,
    /// Address the HTTP server binds to.
    pub bind_address: String,
}

impl AppConfig {
    /// Reject configurations that would make the service unusable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a capacity or pool size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.queues.capacity == 0 {
            return Err(Error::Config { message: "queues.capacity must be at least 1".to_owned() });
        }
        if self.queues.evaluation_workers == 0 || self.queues.remediation_workers == 0 {
            return Err(Error::Config {
                message: "queues.evaluation_workers and queues.remediation_workers must be at least 1".to_owned(),
            });
        }
        if self.defaults.concurrency == 0 {
            return Err(Error::Config { message: "defaults.concurrency must be at least 1".to_owned() });
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queues: QueueConfig::default(),
            defaults: DefaultsConfig::default(),
            default_provider: "random".to_owned(),
            bind_address: "127.0.0.1:8080".to_owned(),
        }
    }
}

/// Loads [`AppConfig`] from an explicit path, `REPODOC_CONFIG`, or the
/// process defaults, then applies single-value environment overrides.
///
/// Resolution order: explicit path → `REPODOC_CONFIG` env var → built-in
/// defaults (`SPEC_FULL.md` §1.1, mirroring the teacher's `ConfigLoader`
/// explicit-path-then-env resolution without the YAML/Loco environment
/// layering, which this engine has no use for).
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with no explicit path set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit configuration file path, overriding env resolution.
    #[must_use]
    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed, or
    /// fails validation.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match self.resolve_path() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|err| Error::Config { message: format!("reading {}: {err}", path.display()) })?;
                toml::from_str(&content)
                    .map_err(|err| Error::Config { message: format!("parsing {}: {err}", path.display()) })?
            }
            None => AppConfig::default(),
        };

        apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        env::var_os("REPODOC_CONFIG").map(PathBuf::from)
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(value) = env_usize("REPODOC_QUEUE_CAPACITY") {
        config.queues.capacity = value;
    }
    if let Some(value) = env_usize("REPODOC_EVALUATION_WORKERS") {
        config.queues.evaluation_workers = value;
    }
    if let Some(value) = env_usize("REPODOC_REMEDIATION_WORKERS") {
        config.queues.remediation_workers = value;
    }
    if let Ok(value) = env::var("REPODOC_DEFAULT_PROVIDER") {
        config.default_provider = value;
    }
    if let Ok(value) = env::var("REPODOC_BIND_ADDRESS") {
        config.bind_address = value;
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let mut config = AppConfig::default();
        config.queues.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loader_with_missing_path_falls_back_to_defaults() {
        let loader = ConfigLoader::new().with_config_path("/nonexistent/repodoc.toml");
        assert!(loader.load().is_err());
    }

    #[test]
    fn loader_with_no_path_and_no_env_var_uses_defaults() {
        let config = ConfigLoader::new().load().expect("defaults are always valid");
        assert_eq!(config.default_provider, "random");
    }

    #[test]
    fn loader_parses_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("repodoc.toml");
        std::fs::write(&path, "default_provider = \"claude\"\n[queues]\ncapacity = 25\n").unwrap();
        let config = ConfigLoader::new().with_config_path(&path).load().expect("load");
        assert_eq!(config.default_provider, "claude");
        assert_eq!(config.queues.capacity, 25);
    }
}
