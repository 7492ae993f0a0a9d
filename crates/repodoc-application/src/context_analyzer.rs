//! Context Analyzer: gathers project-wide context before evaluation
//! (`spec.md` §4.3).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use repodoc_domain::entities::{LineCountSummary, ProjectContext};
use repodoc_domain::events::DomainEvent;
use repodoc_domain::ports::{EventBus, InvokeOptions, LineCounter, Provider};
use repodoc_domain::value_objects::JobId;
use tokio_util::sync::CancellationToken;

use crate::constants::{FOLDER_ENUMERATION_DEPTH, MAX_KEY_FOLDERS, SKIP_DIRS};

const PROMPT_TEMPLATE: &str = "\
Analyze this repository and report its languages, frameworks, architecture, and patterns.

Line counts:
{{CLOC_OUTPUT}}

Repository structure:
{{REPO_STRUCTURE}}

Key folders:
{{FOLDER_LIST}}

Respond with:
Languages: <comma-separated>
Frameworks: <comma-separated>
Architecture: <short summary>
Patterns: <short summary>
Key Folders:
- <folder>
";

/// Gathers languages/frameworks/architecture/patterns context for an
/// evaluation run. Never fails the job; any error downgrades to an
/// all-"Unknown" [`ProjectContext`] (`spec.md` §4.3).
pub struct ContextAnalyzer {
    line_counter: Arc<dyn LineCounter>,
    event_bus: Arc<dyn EventBus>,
}

impl ContextAnalyzer {
    /// Build a new analyzer over the given line-count tool and event sink.
    #[must_use]
    pub fn new(line_counter: Arc<dyn LineCounter>, event_bus: Arc<dyn EventBus>) -> Self {
        Self { line_counter, event_bus }
    }

    /// Run the analysis pipeline against `root`.
    pub async fn analyze(
        &self,
        job_id: JobId,
        root: &Path,
        timeout: Duration,
        known_doc_paths: Vec<String>,
        provider: Arc<dyn Provider>,
        cancellation: CancellationToken,
    ) -> ProjectContext {
        match self.try_analyze(job_id, root, timeout, &known_doc_paths, provider, cancellation).await {
            Ok(context) => context,
            Err(err) => {
                self.event_bus
                    .publish(
                        job_id,
                        DomainEvent::ContextWarning {
                            job_id,
                            message: err.to_string(),
                        },
                    )
                    .await;
                ProjectContext {
                    known_doc_paths,
                    ..ProjectContext::unknown()
                }
            }
        }
    }

    async fn try_analyze(
        &self,
        job_id: JobId,
        root: &Path,
        timeout: Duration,
        known_doc_paths: &[String],
        provider: Arc<dyn Provider>,
        cancellation: CancellationToken,
    ) -> repodoc_domain::error::Result<ProjectContext> {
        self.event_bus.publish(job_id, DomainEvent::ContextCloc { job_id, completed: false }).await;
        self.event_bus.publish(job_id, DomainEvent::ContextFolders { job_id, completed: false }).await;

        let (cloc_result, folders) = tokio::join!(
            self.line_counter.count(root, timeout),
            async { enumerate_folders(root) }
        );

        self.event_bus.publish(job_id, DomainEvent::ContextCloc { job_id, completed: true }).await;
        self.event_bus.publish(job_id, DomainEvent::ContextFolders { job_id, completed: true }).await;

        let (line_count_summary, line_count_available, cloc_output) = match cloc_result {
            Ok(report) => (
                Some(LineCountSummary {
                    total_lines: report.total_lines,
                    by_language: report.by_language,
                }),
                true,
                format!("{} total lines", report.total_lines),
            ),
            Err(err) => {
                self.event_bus
                    .publish(
                        job_id,
                        DomainEvent::ContextWarning {
                            job_id,
                            message: format!("line-count tool unavailable: {err}"),
                        },
                    )
                    .await;
                (None, false, "unavailable".to_owned())
            }
        };

        let key_folders: Vec<String> = folders.into_iter().take(MAX_KEY_FOLDERS).collect();
        let prompt = PROMPT_TEMPLATE
            .replace("{{CLOC_OUTPUT}}", &cloc_output)
            .replace("{{REPO_STRUCTURE}}", &describe_structure(root))
            .replace("{{FOLDER_LIST}}", &key_folders.join("\n"));

        self.event_bus.publish(job_id, DomainEvent::ContextAnalysis { job_id, completed: false }).await;
        let options = InvokeOptions {
            cwd: root.to_path_buf(),
            write_mode: false,
            timeout,
            cancellation,
        };
        let response = provider.invoke(&prompt, &options).await?;
        self.event_bus.publish(job_id, DomainEvent::ContextAnalysis { job_id, completed: true }).await;

        Ok(parse_response(&response.result_text, key_folders, known_doc_paths.to_vec(), line_count_summary, line_count_available))
    }
}

fn enumerate_folders(root: &Path) -> Vec<String> {
    let mut folders = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(FOLDER_ENUMERATION_DEPTH)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .is_none_or(|name| !SKIP_DIRS.contains(&name))
        })
        .filter_map(std::result::Result::ok)
    {
        if entry.file_type().is_dir() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            folders.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    folders.sort();
    folders
}

fn describe_structure(root: &Path) -> String {
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .filter_map(|e| e.file_name().into_string().ok())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn parse_response(
    text: &str,
    key_folders: Vec<String>,
    known_doc_paths: Vec<String>,
    line_count_summary: Option<LineCountSummary>,
    line_count_available: bool,
) -> ProjectContext {
    let mut languages = None;
    let mut frameworks = None;
    let mut architecture = None;
    let mut patterns = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Languages:") {
            languages = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("Frameworks:") {
            frameworks = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("Architecture:") {
            architecture = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("Patterns:") {
            patterns = Some(value.trim().to_owned());
        }
    }

    ProjectContext {
        languages: languages.unwrap_or_else(|| "Unknown".to_owned()),
        frameworks: frameworks.unwrap_or_else(|| "Unknown".to_owned()),
        architecture: architecture.unwrap_or_else(|| "Unknown".to_owned()),
        patterns: patterns.unwrap_or_else(|| "Unknown".to_owned()),
        raw_response_text: text.to_owned(),
        line_count_summary,
        key_folders,
        known_doc_paths,
        line_count_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_fields_and_defaults_unmatched_to_unknown() {
        let text = "Languages: Rust, Markdown\nFrameworks: Tokio\nKey Folders:\n- src\n";
        let ctx = parse_response(text, vec!["src".to_owned()], vec![], None, false);
        assert_eq!(ctx.languages, "Rust, Markdown");
        assert_eq!(ctx.frameworks, "Tokio");
        assert_eq!(ctx.architecture, "Unknown");
        assert_eq!(ctx.patterns, "Unknown");
    }
}
