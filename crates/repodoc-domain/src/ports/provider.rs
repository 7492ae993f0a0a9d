//! The Provider port: invoking an external AI CLI (`spec.md` §4.1, L1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::ports::event_bus::EventBus;
use crate::value_objects::JobId;

/// Token usage reported by one provider invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt that were not served from cache.
    pub input: u64,
    /// Tokens in the response.
    pub output: u64,
    /// Tokens written to a prompt cache, if the provider supports one.
    pub cache_create: u64,
    /// Tokens served from a prompt cache, if the provider supports one.
    pub cache_read: u64,
}

impl TokenUsage {
    /// Total tokens billed for this invocation.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cache_create + self.cache_read
    }
}

/// Options controlling one provider invocation (`spec.md` §4.1 capability set).
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Working directory the invocation runs in; required so relative
    /// file operations under `write_mode` target the ephemeral clone.
    pub cwd: std::path::PathBuf,
    /// `false`: read-only analysis. `true`: the provider may mutate files
    /// under `cwd`.
    pub write_mode: bool,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Cooperative cancellation; when triggered the child process is
    /// killed and the call returns [`crate::error::Error::Cancelled`]
    /// within a bounded grace period (`spec.md` §4.1 contract: ≤2s).
    pub cancellation: CancellationToken,
}

/// The result of one successful provider invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// The provider's raw text response.
    pub result_text: String,
    /// Token usage for this invocation.
    pub usage: TokenUsage,
    /// Normalized cost in USD for this invocation.
    pub cost_usd: f64,
    /// Wall-clock duration of this invocation, in milliseconds.
    pub duration_ms: u64,
}

/// Retry policy for [`Provider::invoke_with_retry`] (`spec.md` §4.5).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff duration; attempt `n` sleeps `base * 2^(n-1)` with
    /// jitter in `[0.5, 1.5]`.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Who a retry attempt belongs to, so [`Provider::invoke_with_retry`] can
/// publish `evaluator.retry`/`evaluator.timeout` per attempt rather than
/// only once after every attempt is exhausted (`spec.md` §4.1).
#[derive(Clone)]
pub struct RetryContext {
    /// Job this invocation belongs to.
    pub job_id: JobId,
    /// Evaluator id attributed in the published events.
    pub evaluator_name: String,
    /// Event sink the retry loop publishes to.
    pub event_bus: Arc<dyn EventBus>,
}

/// An external AI CLI, invoked with a prompt and working directory
/// (`spec.md` §4.1).
///
/// Implementors must honor `cwd`, must treat `write_mode == false` as
/// read-only, and must propagate `cancellation` to the underlying child
/// process.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable registry name for this provider.
    fn name(&self) -> &str;

    /// Invoke the provider once with no retry.
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<InvokeResponse>;

    /// Invoke the provider, retrying on transient failures per `policy`
    /// (`spec.md` §4.5 retry policy: retry on network/timeout/transient
    /// provider errors; never on invalid-prompt or auth failures). Each
    /// retried attempt publishes `evaluator.retry` and each per-attempt
    /// timeout publishes `evaluator.timeout` through `retry_context`.
    async fn invoke_with_retry(
        &self,
        prompt: &str,
        options: &InvokeOptions,
        policy: RetryPolicy,
        retry_context: &RetryContext,
    ) -> Result<InvokeResponse>;
}
