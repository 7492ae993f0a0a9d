//! Curator: selects the top-K issues of one type by impact, never mutating
//! them (`spec.md` §4.9).

use std::sync::Arc;
use std::time::Duration;

use repodoc_domain::entities::{CurationBlock, Issue};
use repodoc_domain::ports::{InvokeOptions, Provider};
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_CURATION_THRESHOLD;

/// Curates one issue-type's findings down to the top `limit` by impact.
pub struct Curator {
    provider: Arc<dyn Provider>,
}

impl Curator {
    /// Build a curator over the given provider.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// `true` when `count` issues of one type should be curated at all
    /// (`spec.md` §4.6 curation gate: skip when count <= threshold).
    #[must_use]
    pub fn should_curate(count: usize, threshold: usize) -> bool {
        count > threshold
    }

    /// Default curation threshold (`spec.md` §4.6).
    #[must_use]
    pub fn default_threshold() -> usize {
        DEFAULT_CURATION_THRESHOLD
    }

    /// Select the top `limit` issues from `issues` by provider-ranked
    /// impact, falling back to a deterministic sort on parse failure.
    pub async fn curate(
        &self,
        issues: &[Issue],
        limit: usize,
        cwd: &std::path::Path,
        timeout: Duration,
        cancellation: CancellationToken,
    ) -> CurationBlock {
        let prompt = build_prompt(issues, limit);
        let options = InvokeOptions {
            cwd: cwd.to_path_buf(),
            write_mode: false,
            timeout,
            cancellation,
        };

        let start = std::time::Instant::now();
        let outcome = self.provider.invoke(&prompt, &options).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(response) => match parse_selection(&response.result_text, issues.len(), limit) {
                Some((indices, rationale)) => CurationBlock {
                    curated_issues: indices.into_iter().map(|i| issues[i].clone()).collect(),
                    total_reviewed: issues.len(),
                    ordering_rationale: rationale,
                    cost_usd: response.cost_usd,
                    duration_ms: response.duration_ms,
                },
                None => fallback_curation(issues, limit, elapsed_ms, 0.0),
            },
            Err(_) => fallback_curation(issues, limit, elapsed_ms, 0.0),
        }
    }
}

fn build_prompt(issues: &[Issue], limit: usize) -> String {
    let mut prompt = format!(
        "Select the top {limit} of the following {} issues, ranked by impact. \
         Respond with JSON: {{\"selected\": [indices], \"rationale\": \"...\"}}.\n\n",
        issues.len()
    );
    for (i, issue) in issues.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, issue.common().primary_text()));
    }
    prompt
}

fn parse_selection(text: &str, total: usize, limit: usize) -> Option<(Vec<usize>, String)> {
    let value = crate::json_block::extract_json_object(text, "selected")?;
    let indices: Vec<usize> = value
        .get("selected")?
        .as_array()?
        .iter()
        .filter_map(serde_json::Value::as_u64)
        .map(|n| (n as usize).saturating_sub(1))
        .filter(|&i| i < total)
        .take(limit)
        .collect();
    if indices.is_empty() {
        return None;
    }
    let rationale = value
        .get("rationale")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();
    Some((indices, rationale))
}

/// Deterministic fallback: sort by severity/impact-level descending, take
/// the first `limit` (`spec.md` §4.9: "On parse failure...").
fn fallback_curation(issues: &[Issue], limit: usize, duration_ms: u64, cost_usd: f64) -> CurationBlock {
    let mut indexed: Vec<usize> = (0..issues.len()).collect();
    indexed.sort_by(|&a, &b| {
        issues[b]
            .representative_score()
            .total_cmp(&issues[a].representative_score())
    });
    indexed.truncate(limit);

    CurationBlock {
        curated_issues: indexed.into_iter().map(|i| issues[i].clone()).collect(),
        total_reviewed: issues.len(),
        ordering_rationale: "fallback: sorted by severity/impact descending".to_owned(),
        cost_usd,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodoc_domain::entities::{FileLocation, IssueCommon, Location};

    fn error(primary: &str, severity: u8) -> Issue {
        Issue::Error {
            common: IssueCommon {
                category: "docs".to_owned(),
                problem: Some(primary.to_owned()),
                description: None,
                title: None,
                location: Location::Single(FileLocation {
                    file: Some("AGENTS.md".to_owned()),
                    start_line: 1,
                    end_line: 2,
                }),
                snippet: None,
                fix: None,
                evaluator_name: "eval-A".to_owned(),
                affected_files: None,
                is_phantom_file: false,
            },
            severity,
        }
    }

    #[test]
    fn should_curate_only_above_threshold() {
        assert!(!Curator::should_curate(30, 30));
        assert!(Curator::should_curate(31, 30));
    }

    #[test]
    fn fallback_curation_picks_highest_severity_first() {
        let issues = vec![error("low", 2), error("high", 9), error("mid", 5)];
        let block = fallback_curation(&issues, 2, 0, 0.0);
        assert_eq!(block.curated_issues.len(), 2);
        match &block.curated_issues[0] {
            Issue::Error { severity, .. } => assert_eq!(*severity, 9),
            Issue::Suggestion { .. } => panic!("expected error"),
        }
    }

    #[test]
    fn parse_selection_ignores_out_of_range_indices() {
        let text = "{\"selected\": [1, 99, 2], \"rationale\": \"top two\"}";
        let (indices, rationale) = parse_selection(text, 2, 2).expect("parse");
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(rationale, "top two");
    }
}
