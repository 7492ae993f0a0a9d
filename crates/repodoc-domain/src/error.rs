//! Error handling types shared by every layer of the engine.

use thiserror::Error;

/// Result type alias for operations that can fail.
pub type Result<T> = std::result::Result<T, Error>;

/// Error category taxonomy, shared by the event bus (`job.failed.code`) and
/// the HTTP surface (status code mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Operation exceeded its configured limit; usually retryable.
    Timeout,
    /// The AI response did not contain the expected JSON shape.
    Parsing,
    /// A read/write to disk failed.
    FileSystem,
    /// The upstream AI CLI tool failed.
    Provider,
    /// Clone or checkout of the target repository failed.
    Repository,
    /// Admission was rejected because the queue is at capacity.
    Queue,
    /// The referenced job/evaluation/remediation id is unknown.
    NotFound,
    /// The request was malformed.
    Invalid,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Anything else; logged with full detail server-side.
    Internal,
}

impl ErrorCategory {
    /// Stable machine-readable code, as carried in `job.failed.code` and the
    /// HTTP error body.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Parsing => "PARSE_ERROR",
            Self::FileSystem => "FS_ERROR",
            Self::Provider => "PROVIDER_ERROR",
            Self::Repository => "REPO_ERROR",
            Self::Queue => "QUEUE_FULL",
            Self::NotFound => "NOT_FOUND",
            Self::Invalid => "INVALID_REQUEST",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether a failure in this category should be retried by the provider
    /// retry policy (`spec.md` §4.1).
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Provider | Self::FileSystem)
    }
}

/// Main error type for the repository documentation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },

    /// JSON parsing or serialization error.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The AI response did not contain the expected `issues`/`actions` JSON block.
    #[error("failed to extract expected JSON block: {message}")]
    ResponseParse {
        /// What was expected and why extraction failed.
        message: String,
    },

    /// A subprocess (git, cloc, or the AI CLI) exited with a failure.
    #[error("subprocess '{command}' failed: {stderr}")]
    Subprocess {
        /// Program name that was invoked.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A subprocess did not finish within its allotted timeout.
    #[error("subprocess '{command}' timed out after {elapsed_ms}ms")]
    SubprocessTimeout {
        /// Program name that was invoked.
        command: String,
        /// Elapsed time before the timeout fired.
        elapsed_ms: u64,
    },

    /// An in-flight operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Cloning the target repository failed.
    #[error("repository clone failed: {message}")]
    CloneFailed {
        /// Description of the failure, usually the git stderr.
        message: String,
    },

    /// A named provider is not registered.
    #[error("unknown provider '{name}'; available providers: {available:?}")]
    ProviderNotFound {
        /// The name that was requested.
        name: String,
        /// Names of providers that are registered.
        available: Vec<String>,
    },

    /// A resource (job, evaluation, remediation) was not found.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// The request was invalid.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what made the request invalid.
        message: String,
    },

    /// Admission was rejected because the target queue is full.
    #[error("queue is at capacity ({capacity} jobs)")]
    QueueFull {
        /// The queue's configured capacity.
        capacity: usize,
    },

    /// Configuration failed to load or validate.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Catch-all for failures that do not fit another category.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::Io`] from any displayable source.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Build an [`Error::Internal`] from any displayable source.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error into the taxonomy used by events and the HTTP layer.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SubprocessTimeout { .. } => ErrorCategory::Timeout,
            Self::ResponseParse { .. } | Self::Json { .. } => ErrorCategory::Parsing,
            Self::Io { .. } => ErrorCategory::FileSystem,
            Self::Subprocess { .. } | Self::ProviderNotFound { .. } => ErrorCategory::Provider,
            Self::CloneFailed { .. } => ErrorCategory::Repository,
            Self::QueueFull { .. } => ErrorCategory::Queue,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidRequest { .. } | Self::Config { .. } => ErrorCategory::Invalid,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            message: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_timeout_as_retryable() {
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::Provider.is_retryable());
        assert!(!ErrorCategory::Invalid.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn error_category_codes_are_stable() {
        assert_eq!(ErrorCategory::Queue.code(), "QUEUE_FULL");
        assert_eq!(ErrorCategory::NotFound.code(), "NOT_FOUND");
        assert_eq!(ErrorCategory::Cancelled.code(), "CANCELLED");
    }

    #[test]
    fn clone_failed_categorizes_as_repository() {
        let err = Error::CloneFailed {
            message: "fatal: repository not found".to_owned(),
        };
        assert_eq!(err.category(), ErrorCategory::Repository);
    }
}
