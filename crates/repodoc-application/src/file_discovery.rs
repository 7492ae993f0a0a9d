//! File Discovery: locate AGENTS.md-class files and their CLAUDE.md-class
//! aliases (`spec.md` §4.4).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use repodoc_domain::entities::{is_reference_pointer, ColocatedPair};
use repodoc_domain::error::Result;
use walkdir::WalkDir;

use crate::constants::{ALIAS_FILENAMES, CANONICAL_FILENAMES, SKIP_DIRS};

/// One documentation file found under the repository root.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the repository root.
    pub relative_path: String,
    /// Whether this path is one of the canonical filenames.
    pub is_canonical: bool,
    /// File content at discovery time.
    pub content: String,
    /// Whether `content` is a reference pointer rather than real content.
    pub is_reference_pointer: bool,
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    /// Every documentation file found, canonical and alias.
    pub files: Vec<DiscoveredFile>,
    /// Directories containing both a canonical file and an alias.
    pub colocated_pairs: Vec<ColocatedPair>,
}

/// Walk `root` to depth-unbounded, collecting AGENTS.md/CLAUDE.md-class
/// files and pairing up directories that contain both.
pub struct FileDiscovery;

impl FileDiscovery {
    /// Discover documentation files under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a discovered file cannot be read.
    pub fn discover(root: &Path) -> Result<DiscoveryResult> {
        let mut by_directory: BTreeMap<PathBuf, DirEntry> = BTreeMap::new();
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e.path(), root))
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let is_canonical = CANONICAL_FILENAMES.contains(&file_name);
            let is_alias = ALIAS_FILENAMES.contains(&file_name);
            if !is_canonical && !is_alias {
                continue;
            }

            let absolute = entry.path();
            let relative = absolute
                .strip_prefix(root)
                .unwrap_or(absolute)
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read_to_string(absolute)?;
            let pointer = is_reference_pointer(&content);

            let directory = absolute
                .parent()
                .map(|p| p.strip_prefix(root).unwrap_or(p).to_path_buf())
                .unwrap_or_default();
            let slot = by_directory.entry(directory).or_default();
            if is_canonical {
                slot.canonical = Some(relative.clone());
            } else {
                slot.alias = Some((relative.clone(), pointer));
            }

            files.push(DiscoveredFile {
                relative_path: relative,
                is_canonical,
                content,
                is_reference_pointer: pointer,
            });
        }

        let colocated_pairs = by_directory
            .into_iter()
            .filter_map(|(directory, slot)| {
                let canonical_path = slot.canonical?;
                let (alias_path, already_consolidated) = slot.alias?;
                Some(ColocatedPair {
                    directory: directory.to_string_lossy().replace('\\', "/"),
                    canonical_path,
                    alias_path,
                    already_consolidated,
                })
            })
            .collect();

        Ok(DiscoveryResult { files, colocated_pairs })
    }
}

#[derive(Default)]
struct DirEntry {
    canonical: Option<String>,
    alias: Option<(String, bool)>,
}

fn is_skipped_dir(path: &Path, root: &Path) -> bool {
    if path == root {
        return false;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| SKIP_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_colocated_pair_and_flags_reference_pointer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("docs");
        fs::create_dir_all(&sub).expect("mkdir");
        fs::write(sub.join("AGENTS.md"), "# Real instructions\n").expect("write");
        fs::write(sub.join("CLAUDE.md"), "@AGENTS.md\n").expect("write");

        let result = FileDiscovery::discover(dir.path()).expect("discover");
        assert_eq!(result.colocated_pairs.len(), 1);
        let pair = &result.colocated_pairs[0];
        assert_eq!(pair.canonical_path, "docs/AGENTS.md");
        assert_eq!(pair.alias_path, "docs/CLAUDE.md");
        assert!(pair.already_consolidated);
    }

    #[test]
    fn unpaired_canonical_file_produces_no_pair() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("AGENTS.md"), "# instructions").expect("write");

        let result = FileDiscovery::discover(dir.path()).expect("discover");
        assert_eq!(result.files.len(), 1);
        assert!(result.colocated_pairs.is_empty());
    }

    #[test]
    fn skips_vendor_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vendor = dir.path().join("node_modules");
        fs::create_dir_all(&vendor).expect("mkdir");
        fs::write(vendor.join("AGENTS.md"), "noise").expect("write");

        let result = FileDiscovery::discover(dir.path()).expect("discover");
        assert!(result.files.is_empty());
    }
}
