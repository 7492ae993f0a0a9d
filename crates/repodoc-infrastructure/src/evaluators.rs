//! Built-in evaluator catalogue (`spec.md` §4.5 input, §1 Non-goals: "the
//! concrete prompt text of individual evaluators" is out of scope — these
//! are the minimal stand-ins that make the engine runnable end to end,
//! grounded on the shape `EvaluatorDefinition` already declares in
//! `repodoc_application::evaluator_runner`).

use repodoc_application::evaluator_runner::{EvaluatorDefinition, EvaluatorIssueKind};

/// The evaluator set `repodoc` loads at startup. Not a stand-in for a
/// configuration feature — the engine has no external catalogue loader,
/// this is the whole catalogue.
#[must_use]
pub fn built_in_evaluators() -> Vec<EvaluatorDefinition> {
    vec![
        EvaluatorDefinition {
            name: "stale-instructions".to_owned(),
            prompt_template: "Review {{FILE_PATH}} against the project context below and report any \
                instructions that no longer match the codebase.\n\nProject context:\n{{PROJECT_CONTEXT}}\n\n\
                File content:\n{{FILE_CONTENT}}"
                .to_owned(),
            default_severity: 6,
            cross_file: false,
            issue_kind: EvaluatorIssueKind::Errors,
        },
        EvaluatorDefinition {
            name: "broken-commands".to_owned(),
            prompt_template: "Check every shell command in {{FILE_PATH}} against the project context \
                and flag commands that would fail in this repository.\n\nProject context:\n{{PROJECT_CONTEXT}}\n\n\
                File content:\n{{FILE_CONTENT}}"
                .to_owned(),
            default_severity: 8,
            cross_file: false,
            issue_kind: EvaluatorIssueKind::Errors,
        },
        EvaluatorDefinition {
            name: "missing-coverage".to_owned(),
            prompt_template: "Compare {{FILE_PATH}} against the project context and suggest instructions \
                for any significant workflow it omits.\n\nProject context:\n{{PROJECT_CONTEXT}}\n\n\
                File content:\n{{FILE_CONTENT}}"
                .to_owned(),
            default_severity: 4,
            cross_file: false,
            issue_kind: EvaluatorIssueKind::Suggestions,
        },
        EvaluatorDefinition {
            name: "cross-file-consistency".to_owned(),
            prompt_template: "Given the project context below, identify instruction files that \
                contradict one another or duplicate guidance that should be consolidated.\n\n\
                Project context:\n{{PROJECT_CONTEXT}}"
                .to_owned(),
            default_severity: 5,
            cross_file: true,
            issue_kind: EvaluatorIssueKind::Both,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_catalogue_is_non_empty_and_names_are_unique() {
        let evaluators = built_in_evaluators();
        assert!(!evaluators.is_empty());
        let mut names: Vec<&str> = evaluators.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), evaluators.len());
    }

    #[test]
    fn every_template_references_file_content_or_is_cross_file() {
        for evaluator in built_in_evaluators() {
            assert!(evaluator.cross_file || evaluator.prompt_template.contains("{{FILE_CONTENT}}"));
        }
    }
}
