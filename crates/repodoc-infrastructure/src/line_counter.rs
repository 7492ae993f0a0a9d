//! `LineCounter` over the `tokei` CLI (`spec.md` §4.3 step 1): a bounded
//! subprocess whose failure is always non-fatal to its caller.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use repodoc_domain::error::{Error, Result};
use repodoc_domain::ports::{LineCountReport, LineCounter};
use tokio::process::Command;

/// Counts lines by shelling out to `tokei --output json`.
pub struct CliLineCounter {
    binary: String,
}

impl CliLineCounter {
    /// Build a counter invoking the given binary (`tokei` by default).
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for CliLineCounter {
    fn default() -> Self {
        Self::new("tokei")
    }
}

#[async_trait]
impl LineCounter for CliLineCounter {
    async fn count(&self, root: &Path, timeout: Duration) -> Result<LineCountReport> {
        let mut command = Command::new(&self.binary);
        command.arg(root).args(["--output", "json"]);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| Error::SubprocessTimeout {
                command: self.binary.clone(),
                elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|err| Error::Subprocess { command: self.binary.clone(), stderr: err.to_string() })?;

        if !output.status.success() {
            return Err(Error::Subprocess {
                command: self.binary.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_tokei_json(&output.stdout)
    }
}

fn parse_tokei_json(stdout: &[u8]) -> Result<LineCountReport> {
    let value: serde_json::Value = serde_json::from_slice(stdout).map_err(Error::from)?;
    let object = value.as_object().ok_or_else(|| Error::ResponseParse {
        message: "tokei output was not a JSON object".to_owned(),
    })?;

    let mut report = LineCountReport::default();
    for (language, stats) in object {
        let Some(lines) = stats.get("code").and_then(serde_json::Value::as_u64) else { continue };
        report.total_lines += lines;
        report.by_language.insert(language.clone(), lines);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tokei_json_sums_per_language_code_lines() {
        let stdout = br#"{"Rust": {"code": 120}, "Markdown": {"code": 40}}"#;
        let report = parse_tokei_json(stdout).expect("parse");
        assert_eq!(report.total_lines, 160);
        assert_eq!(report.by_language.get("Rust"), Some(&120));
    }

    #[test]
    fn parse_tokei_json_rejects_non_object_output() {
        let err = parse_tokei_json(b"[1,2,3]").expect_err("should fail");
        assert_eq!(err.category(), repodoc_domain::ErrorCategory::Parsing);
    }

    #[tokio::test]
    async fn count_on_missing_binary_is_a_subprocess_error() {
        let counter = CliLineCounter::new("definitely-not-a-real-binary");
        let err = counter.count(Path::new("."), Duration::from_secs(5)).await.expect_err("should fail");
        assert_eq!(err.category(), repodoc_domain::ErrorCategory::Provider);
    }
}
