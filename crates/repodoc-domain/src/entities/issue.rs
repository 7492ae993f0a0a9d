//! Issue entities: the unit of finding produced by an evaluator and carried
//! through deduplication, curation, and remediation.

use serde::{Deserialize, Serialize};

/// A single-file or cross-file code location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// A location anchored to one file.
    Single(FileLocation),
    /// A cross-file location (used by cross-file evaluators).
    Multiple(Vec<FileLocation>),
}

impl Location {
    /// All file-anchored locations this value covers, flattened.
    #[must_use]
    pub fn entries(&self) -> Vec<&FileLocation> {
        match self {
            Self::Single(loc) => vec![loc],
            Self::Multiple(locs) => locs.iter().collect(),
        }
    }
}

/// A span of lines in a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLocation {
    /// Path relative to the repository root. Absent for evaluator-wide findings.
    #[serde(default)]
    pub file: Option<String>,
    /// First line of the span, 1-indexed.
    pub start_line: u32,
    /// Last line of the span, 1-indexed, inclusive.
    pub end_line: u32,
}

impl FileLocation {
    /// Whether this location overlaps `other` within `tolerance` lines, in the
    /// same file (`spec.md` §4.8 location clustering).
    #[must_use]
    pub fn overlaps(&self, other: &Self, tolerance: u32) -> bool {
        if self.file != other.file {
            return false;
        }
        let a_start = self.start_line.saturating_sub(tolerance);
        let a_end = self.end_line.saturating_add(tolerance);
        a_start <= other.end_line && other.start_line <= a_end
    }
}

/// Severity bucket shared by the 1..10 integer severity scale and the
/// High/Medium/Low suggestion scale — the one place the integer<->bucket
/// mapping from `spec.md` §3 lives (`spec.md` §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityBucket {
    /// Highest-priority bucket.
    High,
    /// Middle bucket.
    Medium,
    /// Lowest-priority bucket.
    Low,
}

/// Suggestion impact level, as reported directly by suggestion-type evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    /// High impact.
    High,
    /// Medium impact.
    Medium,
    /// Low impact.
    Low,
}

impl ImpactLevel {
    /// Numeric weight used when a curator fallback needs to rank suggestions
    /// alongside severity-scored errors (`spec.md` §4.9).
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::High => 9,
            Self::Medium => 6,
            Self::Low => 3,
        }
    }

    /// The severity bucket this impact level maps to.
    #[must_use]
    pub fn bucket(self) -> SeverityBucket {
        match self {
            Self::High => SeverityBucket::High,
            Self::Medium => SeverityBucket::Medium,
            Self::Low => SeverityBucket::Low,
        }
    }
}

/// Map an integer severity (1..=10) to its bucket (`spec.md` §3 invariant):
/// `>=8` high, `6..=7` medium, `<=5` low.
#[must_use]
pub fn severity_bucket(severity: u8) -> SeverityBucket {
    if severity >= 8 {
        SeverityBucket::High
    } else if severity >= 6 {
        SeverityBucket::Medium
    } else {
        SeverityBucket::Low
    }
}

/// Shared fields common to both issue variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCommon {
    /// Free-form evaluator-assigned category.
    pub category: String,
    /// Problem statement; at least one of `problem`/`description`/`title` is present upstream.
    #[serde(default)]
    pub problem: Option<String>,
    /// Alternate description field some evaluators emit instead of `problem`.
    #[serde(default)]
    pub description: Option<String>,
    /// Alternate title field some evaluators emit instead of `problem`.
    #[serde(default)]
    pub title: Option<String>,
    /// Where the issue was found.
    pub location: Location,
    /// Offending excerpt, when available.
    #[serde(default)]
    pub snippet: Option<String>,
    /// Suggested fix, when available.
    #[serde(default)]
    pub fix: Option<String>,
    /// Name of the evaluator that produced this issue, attached by the aggregator.
    #[serde(default)]
    pub evaluator_name: String,
    /// Other files this issue affects, for cross-file findings.
    #[serde(default)]
    pub affected_files: Option<Vec<String>>,
    /// Whether the issue's target file does not yet exist on disk.
    #[serde(default)]
    pub is_phantom_file: bool,
}

impl IssueCommon {
    /// First non-empty primary text field, used by deduplication's text
    /// similarity stage (`spec.md` §4.8).
    #[must_use]
    pub fn primary_text(&self) -> &str {
        for candidate in [&self.problem, &self.description, &self.title] {
            if let Some(text) = candidate {
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
        &self.category
    }

    /// Completeness bonus contributors used when picking a cluster
    /// representative (`spec.md` §4.8): +5 for each of problem/fix/snippet
    /// present, plus description length / 100.
    #[must_use]
    pub fn completeness_bonus(&self) -> f64 {
        let mut bonus = 0.0;
        if self.problem.is_some() {
            bonus += 5.0;
        }
        if self.fix.is_some() {
            bonus += 5.0;
        }
        if self.snippet.is_some() {
            bonus += 5.0;
        }
        if let Some(desc) = &self.description {
            bonus += desc.len() as f64 / 100.0;
        }
        bonus
    }
}

/// A finding reported by an evaluator: either an `Error` (a defect) or a
/// `Suggestion` (an improvement opportunity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Issue {
    /// A defect in the evaluated documentation.
    Error {
        /// Fields shared with [`Issue::Suggestion`].
        #[serde(flatten)]
        common: IssueCommon,
        /// Severity on a 1..=10 scale; bucketed via [`severity_bucket`].
        severity: u8,
    },
    /// An improvement opportunity that is not a defect.
    Suggestion {
        /// Fields shared with [`Issue::Error`].
        #[serde(flatten)]
        common: IssueCommon,
        /// Coarse impact bucket as reported by the evaluator.
        impact_level: ImpactLevel,
    },
}

impl Issue {
    /// Shared fields, regardless of variant.
    #[must_use]
    pub fn common(&self) -> &IssueCommon {
        match self {
            Self::Error { common, .. } | Self::Suggestion { common, .. } => common,
        }
    }

    /// Mutable access to shared fields.
    pub fn common_mut(&mut self) -> &mut IssueCommon {
        match self {
            Self::Error { common, .. } | Self::Suggestion { common, .. } => common,
        }
    }

    /// This issue's severity bucket, unifying the integer and impact scales.
    #[must_use]
    pub fn bucket(&self) -> SeverityBucket {
        match self {
            Self::Error { severity, .. } => severity_bucket(*severity),
            Self::Suggestion { impact_level, .. } => impact_level.bucket(),
        }
    }

    /// Score used to pick a cluster representative during deduplication
    /// (`spec.md` §4.8): severity*10 for errors, {High:80,Medium:50,Low:30}
    /// for suggestions, plus completeness bonuses.
    #[must_use]
    pub fn representative_score(&self) -> f64 {
        let base = match self {
            Self::Error { severity, .. } => f64::from(*severity) * 10.0,
            Self::Suggestion { impact_level, .. } => match impact_level {
                ImpactLevel::High => 80.0,
                ImpactLevel::Medium => 50.0,
                ImpactLevel::Low => 30.0,
            },
        };
        base + self.common().completeness_bonus()
    }

    /// True when this issue carries a non-empty `affected_files` list, the
    /// marker for cross-file evaluator output (`spec.md` §4.6).
    #[must_use]
    pub fn is_cross_file(&self) -> bool {
        self.common()
            .affected_files
            .as_ref()
            .is_some_and(|files| !files.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(file: &str, start: u32, end: u32) -> Location {
        Location::Single(FileLocation {
            file: Some(file.to_owned()),
            start_line: start,
            end_line: end,
        })
    }

    fn error(severity: u8, primary: &str) -> Issue {
        Issue::Error {
            common: IssueCommon {
                category: "docs".to_owned(),
                problem: Some(primary.to_owned()),
                description: None,
                title: None,
                location: single("AGENTS.md", 10, 20),
                snippet: None,
                fix: None,
                evaluator_name: "eval-A".to_owned(),
                affected_files: None,
                is_phantom_file: false,
            },
            severity,
        }
    }

    #[rstest::rstest]
    #[case(10, SeverityBucket::High)]
    #[case(8, SeverityBucket::High)]
    #[case(7, SeverityBucket::Medium)]
    #[case(6, SeverityBucket::Medium)]
    #[case(5, SeverityBucket::Low)]
    #[case(1, SeverityBucket::Low)]
    fn severity_bucket_mapping(#[case] severity: u8, #[case] expected: SeverityBucket) {
        assert_eq!(severity_bucket(severity), expected);
    }

    #[test]
    fn impact_level_maps_to_weight_and_bucket() {
        assert_eq!(ImpactLevel::High.weight(), 9);
        assert_eq!(ImpactLevel::Medium.weight(), 6);
        assert_eq!(ImpactLevel::Low.weight(), 3);
        assert_eq!(ImpactLevel::High.bucket(), SeverityBucket::High);
    }

    #[test]
    fn file_location_overlap_respects_tolerance_and_file() {
        let a = FileLocation {
            file: Some("AGENTS.md".to_owned()),
            start_line: 10,
            end_line: 20,
        };
        let near = FileLocation {
            file: Some("AGENTS.md".to_owned()),
            start_line: 24,
            end_line: 30,
        };
        let far = FileLocation {
            file: Some("AGENTS.md".to_owned()),
            start_line: 100,
            end_line: 110,
        };
        let other_file = FileLocation {
            file: Some("README.md".to_owned()),
            start_line: 10,
            end_line: 20,
        };
        assert!(a.overlaps(&near, 5));
        assert!(!a.overlaps(&far, 5));
        assert!(!a.overlaps(&other_file, 5));
    }

    #[test]
    fn primary_text_prefers_problem_then_description_then_title() {
        let issue = error(9, "vague setup instructions");
        assert_eq!(issue.common().primary_text(), "vague setup instructions");
    }

    #[test]
    fn representative_score_rewards_completeness() {
        let bare = error(8, "x");
        let mut rich = error(8, "x");
        rich.common_mut().fix = Some("do this instead".to_owned());
        rich.common_mut().snippet = Some("```\nfoo\n```".to_owned());
        assert!(rich.representative_score() > bare.representative_score());
    }

    #[test]
    fn is_cross_file_requires_nonempty_affected_files() {
        let mut issue = error(5, "x");
        assert!(!issue.is_cross_file());
        issue.common_mut().affected_files = Some(vec![]);
        assert!(!issue.is_cross_file());
        issue.common_mut().affected_files = Some(vec!["b.md".to_owned()]);
        assert!(issue.is_cross_file());
    }
}
