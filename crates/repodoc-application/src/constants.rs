//! Constants shared by the application-layer use cases.

/// Directories skipped during file discovery and folder enumeration
/// (`spec.md` §4.3 step 1, §4.4): vendor/build/IDE noise that is never a
/// documentation source.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "vendor",
    ".idea",
    ".vscode",
    "__pycache__",
    ".venv",
];

/// Depth folder enumeration walks to for the Context Analyzer's
/// `{{FOLDER_LIST}}` substitution (`spec.md` §4.3 step 1).
pub const FOLDER_ENUMERATION_DEPTH: usize = 3;

/// Cap on key folders surfaced to evaluators as context (`spec.md` §4.3 outputs).
pub const MAX_KEY_FOLDERS: usize = 20;

/// Canonical (source-of-truth) documentation filenames recognized by
/// discovery (`spec.md` §4.4).
pub const CANONICAL_FILENAMES: &[&str] = &["AGENTS.md"];

/// Alias documentation filenames that may point at a canonical file in the
/// same directory (`spec.md` §4.4).
pub const ALIAS_FILENAMES: &[&str] = &["CLAUDE.md"];

/// Default number of issues above which curation runs for one issue type
/// (`spec.md` §4.6 curation gate).
pub const DEFAULT_CURATION_THRESHOLD: usize = 30;

/// Default location-overlap tolerance in lines used by the deduplicator
/// (`spec.md` §4.8 step 1).
pub const DEFAULT_LOCATION_TOLERANCE: u32 = 5;

/// Default text-similarity threshold above which a pair is marked similar
/// (`spec.md` §4.8 step 2).
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Default size of an execute-phase batch (`spec.md` §4.7 batching note).
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default per-provider-call retry attempts (`spec.md` §4.1 retry policy).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
