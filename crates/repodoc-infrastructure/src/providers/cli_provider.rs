//! `CliProvider`: invokes an external AI assistant CLI as a subprocess
//! (`spec.md` §4.1, `SPEC_FULL.md` §4.1).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use repodoc_domain::error::{Error, Result};
use repodoc_domain::events::DomainEvent;
use repodoc_domain::ports::provider::{InvokeOptions, InvokeResponse, Provider, RetryContext, RetryPolicy, TokenUsage};
use repodoc_domain::registry::ProviderRegistryEntry;
use tokio::process::Command;

/// How to shell out to one AI assistant CLI: the binary to run and the
/// argv template around the rendered prompt.
#[derive(Debug, Clone)]
pub struct CliProviderSpec {
    /// Stable registry name (`spec.md` §6 `provider` field).
    pub name: &'static str,
    /// Binary located on `PATH`.
    pub binary: &'static str,
    /// Extra argv entries preceding the prompt argument.
    pub extra_args: &'static [&'static str],
}

/// Every provider that ships as a CLI wrapper, by name.
pub const CLI_PROVIDER_SPECS: &[CliProviderSpec] = &[
    CliProviderSpec { name: "claude", binary: "claude", extra_args: &["-p"] },
    CliProviderSpec { name: "codex", binary: "codex", extra_args: &["exec"] },
    CliProviderSpec { name: "opencode", binary: "opencode", extra_args: &["run"] },
    CliProviderSpec { name: "cursor", binary: "cursor-agent", extra_args: &["-p"] },
    CliProviderSpec { name: "github-copilot", binary: "gh", extra_args: &["copilot", "suggest"] },
];

/// A `Provider` that shells out to a configured AI assistant CLI binary,
/// passing the prompt as the final argument and reading its stdout as the
/// result text. Cost and token usage are not reported by these CLIs, so
/// both are left at zero.
pub struct CliProvider {
    spec: CliProviderSpec,
}

impl CliProvider {
    /// Build a provider over the given binary spec.
    #[must_use]
    pub fn new(spec: CliProviderSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Provider for CliProvider {
    fn name(&self) -> &str {
        self.spec.name
    }

    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<InvokeResponse> {
        let start = Instant::now();
        let mut command = Command::new(self.spec.binary);
        command.args(self.spec.extra_args).arg(prompt).current_dir(&options.cwd);
        if !options.write_mode {
            command.env("REPODOC_READ_ONLY", "1");
        }

        let child = command.kill_on_drop(true).output();

        let output = tokio::select! {
            result = tokio::time::timeout(options.timeout, child) => result
                .map_err(|_| Error::SubprocessTimeout {
                    command: self.spec.binary.to_owned(),
                    elapsed_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
                })?
                .map_err(|err| Error::Subprocess { command: self.spec.binary.to_owned(), stderr: err.to_string() })?,
            () = options.cancellation.cancelled() => return Err(Error::Cancelled),
        };

        if !output.status.success() {
            return Err(Error::Subprocess {
                command: self.spec.binary.to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(InvokeResponse {
            result_text: String::from_utf8_lossy(&output.stdout).into_owned(),
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn invoke_with_retry(
        &self,
        prompt: &str,
        options: &InvokeOptions,
        policy: RetryPolicy,
        retry_context: &RetryContext,
    ) -> Result<InvokeResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.invoke(prompt, options).await {
                Ok(response) => return Ok(response),
                Err(err) if matches!(err, Error::SubprocessTimeout { .. }) => {
                    retry_context
                        .event_bus
                        .publish(
                            retry_context.job_id,
                            DomainEvent::EvaluatorTimeout {
                                job_id: retry_context.job_id,
                                evaluator_name: retry_context.evaluator_name.clone(),
                                timeout_ms: u64::try_from(options.timeout.as_millis()).unwrap_or(u64::MAX),
                            },
                        )
                        .await;
                    if attempt >= policy.max_attempts {
                        return Err(err);
                    }
                    tokio::time::sleep(backoff(policy.base_backoff, attempt)).await;
                }
                Err(err) if attempt < policy.max_attempts && err.category().is_retryable() => {
                    tracing::warn!(provider = self.spec.name, attempt, max = policy.max_attempts, error = %err, "retrying provider invocation");
                    retry_context
                        .event_bus
                        .publish(
                            retry_context.job_id,
                            DomainEvent::EvaluatorRetry {
                                job_id: retry_context.job_id,
                                evaluator_name: retry_context.evaluator_name.clone(),
                                attempt,
                                max: policy.max_attempts,
                                error: err.to_string(),
                                remaining: policy.max_attempts - attempt,
                            },
                        )
                        .await;
                    tokio::time::sleep(backoff(policy.base_backoff, attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.as_millis().saturating_mul(1u128 << (attempt - 1).min(20));
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_millis((exp as f64 * jitter) as u64)
}

fn factory(spec: &'static CliProviderSpec) -> Arc<dyn Provider> {
    Arc::new(CliProvider::new(spec.clone()))
}

macro_rules! register_cli_provider {
    ($ident:ident, $index:expr) => {
        #[linkme::distributed_slice(repodoc_domain::registry::PROVIDERS)]
        static $ident: ProviderRegistryEntry = ProviderRegistryEntry {
            name: CLI_PROVIDER_SPECS[$index].name,
            description: "AI assistant CLI provider",
            factory: || factory(&CLI_PROVIDER_SPECS[$index]),
        };
    };
}

register_cli_provider!(CLAUDE_PROVIDER_ENTRY, 0);
register_cli_provider!(CODEX_PROVIDER_ENTRY, 1);
register_cli_provider!(OPENCODE_PROVIDER_ENTRY, 2);
register_cli_provider!(CURSOR_PROVIDER_ENTRY, 3);
register_cli_provider!(GITHUB_COPILOT_PROVIDER_ENTRY, 4);

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::BoxStream;
    use repodoc_domain::events::DomainEvent;
    use repodoc_domain::ports::EventBus;
    use repodoc_domain::value_objects::JobId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEventBus {
        events: Mutex<Vec<DomainEvent>>,
    }

    #[async_trait]
    impl EventBus for RecordingEventBus {
        async fn publish(&self, _job_id: JobId, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn subscribe(&self, _job_id: JobId) -> BoxStream<'static, DomainEvent> {
            Box::pin(futures::stream::empty())
        }
    }

    #[test]
    fn backoff_grows_with_attempt_and_stays_within_jitter_bounds() {
        let base = Duration::from_millis(100);
        for attempt in 1..=4 {
            let delay = backoff(base, attempt);
            let expected_center = base.as_millis() as f64 * 2f64.powi(attempt as i32 - 1);
            assert!(delay.as_millis() as f64 >= expected_center * 0.5 - 1.0);
            assert!(delay.as_millis() as f64 <= expected_center * 1.5 + 1.0);
        }
    }

    #[tokio::test]
    async fn invoke_with_missing_binary_is_a_subprocess_error() {
        let provider = CliProvider::new(CliProviderSpec { name: "missing", binary: "definitely-not-a-real-binary", extra_args: &[] });
        let options = InvokeOptions {
            cwd: PathBuf::from("."),
            write_mode: false,
            timeout: Duration::from_secs(5),
            cancellation: tokio_util::sync::CancellationToken::new(),
        };
        let err = provider.invoke("hello", &options).await.expect_err("should fail");
        assert!(matches!(err, Error::Subprocess { .. }));
    }

    #[tokio::test]
    async fn invoke_with_retry_publishes_a_retry_event_per_failed_attempt() {
        let provider = CliProvider::new(CliProviderSpec { name: "missing", binary: "definitely-not-a-real-binary", extra_args: &[] });
        let options = InvokeOptions {
            cwd: PathBuf::from("."),
            write_mode: false,
            timeout: Duration::from_secs(5),
            cancellation: tokio_util::sync::CancellationToken::new(),
        };
        let bus = Arc::new(RecordingEventBus::default());
        let job_id = JobId::from_name("retry-test");
        let retry_context = RetryContext { job_id, evaluator_name: "eval-A".to_owned(), event_bus: bus.clone() };
        let policy = RetryPolicy { max_attempts: 3, base_backoff: Duration::from_millis(1) };

        let err = provider
            .invoke_with_retry("hello", &options, policy, &retry_context)
            .await
            .expect_err("should exhaust retries");
        assert!(matches!(err, Error::Subprocess { .. }));

        let recorded = bus.events.lock().unwrap();
        assert_eq!(recorded.len(), 2, "should retry twice before exhausting 3 attempts");
        for event in recorded.iter() {
            assert!(matches!(event, DomainEvent::EvaluatorRetry { .. }));
        }
    }
}
