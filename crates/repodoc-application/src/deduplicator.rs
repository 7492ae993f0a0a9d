//! Issue Deduplication Engine: location clustering + text similarity +
//! union-find (`spec.md` §4.8).

use std::collections::HashMap;

use repodoc_domain::entities::Issue;

use crate::constants::{DEFAULT_LOCATION_TOLERANCE, DEFAULT_SIMILARITY_THRESHOLD};

/// Technology tokens the entity-candidate pass looks for in issue text
/// (`spec.md` §4.8 output: "groups sharing a detected technology token like
/// database/ORM/IP address").
const ENTITY_TOKENS: &[&str] = &[
    "postgres", "postgresql", "mysql", "sqlite", "mongodb", "redis", "dynamodb",
    "prisma", "sequelize", "typeorm", "hibernate", "diesel",
    "docker", "kubernetes", "graphql", "grpc", "rabbitmq", "kafka",
];

/// One equivalence class of issues judged to be the same finding.
#[derive(Debug, Clone)]
pub struct IssueCluster {
    /// Index into the original input of the chosen representative.
    pub representative: usize,
    /// Indices of every issue folded into this cluster, representative
    /// included.
    pub members: Vec<usize>,
    /// Human-readable explanation of why these issues were judged the same
    /// finding (`spec.md` §8 scenario 2: must name the location match and
    /// the text-similarity percent that triggered the merge).
    pub reason: String,
}

/// A group of issues whose primary text shares a detected technology token
/// (`spec.md` §4.8 output: `entityCandidates[]`).
#[derive(Debug, Clone)]
pub struct EntityCandidate {
    /// The token every member's text contains, e.g. `"postgres"`.
    pub entity: String,
    /// Indices of issues mentioning this entity.
    pub members: Vec<usize>,
}

/// A location-overlap cluster with no text match inside it — surfaced for a
/// future semantic dedup pass (`spec.md` §4.8 output: `locationCandidates`).
#[derive(Debug, Clone)]
pub struct LocationCandidate {
    /// Indices of issues whose locations overlapped but whose text did not.
    pub members: Vec<usize>,
}

/// Output of one deduplication pass.
#[derive(Debug, Clone, Default)]
pub struct DeduplicationOutput {
    /// Indices kept as representatives, one per equivalence class.
    pub kept: Vec<usize>,
    /// Indices folded into a kept representative.
    pub removed: Vec<usize>,
    /// Every equivalence class found.
    pub clusters: Vec<IssueCluster>,
    /// Location-only clusters with no confirmed text match.
    pub location_candidates: Vec<LocationCandidate>,
    /// Groups of issues sharing a detected technology token.
    pub entity_candidates: Vec<EntityCandidate>,
}

/// Tunable knobs for one deduplication pass.
#[derive(Debug, Clone, Copy)]
pub struct DeduplicationConfig {
    /// Line tolerance for location overlap (`spec.md` §4.8 step 1).
    pub location_tolerance: u32,
    /// Minimum combined similarity score to mark a pair similar
    /// (`spec.md` §4.8 step 2).
    pub similarity_threshold: f64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            location_tolerance: DEFAULT_LOCATION_TOLERANCE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Deduplicate `issues`, preserving the invariant
/// `kept.len() + removed.len() == issues.len()` (`spec.md` §4.8 invariant).
#[must_use]
pub fn deduplicate(issues: &[Issue], config: DeduplicationConfig) -> DeduplicationOutput {
    let location_clusters = cluster_by_location(issues, config.location_tolerance);

    let mut kept = Vec::new();
    let mut removed = Vec::new();
    let mut clusters = Vec::new();
    let mut location_candidates = Vec::new();

    for cluster_indices in location_clusters {
        if cluster_indices.len() == 1 {
            kept.push(cluster_indices[0]);
            clusters.push(IssueCluster {
                representative: cluster_indices[0],
                members: cluster_indices,
                reason: "No overlapping issues found at this location".to_owned(),
            });
            continue;
        }

        let classes = union_find_by_similarity(issues, &cluster_indices, config.similarity_threshold);
        let mut any_merged = false;
        for (class, similarity) in classes {
            if class.len() > 1 {
                any_merged = true;
            }
            let representative = pick_representative(issues, &class);
            kept.push(representative);
            for &idx in &class {
                if idx != representative {
                    removed.push(idx);
                }
            }
            let reason = if class.len() > 1 {
                format!(
                    "Same location (within {} lines); {}% text similarity",
                    config.location_tolerance,
                    (similarity.unwrap_or(config.similarity_threshold) * 100.0).round() as u32,
                )
            } else {
                "Same location as other issues but text did not match closely enough to merge".to_owned()
            };
            clusters.push(IssueCluster { representative, members: class, reason });
        }
        if !any_merged {
            location_candidates.push(LocationCandidate { members: cluster_indices });
        }
    }

    let entity_candidates = detect_entity_candidates(issues);

    DeduplicationOutput {
        kept,
        removed,
        clusters,
        location_candidates,
        entity_candidates,
    }
}

fn detect_entity_candidates(issues: &[Issue]) -> Vec<EntityCandidate> {
    let mut by_entity: HashMap<String, Vec<usize>> = HashMap::new();

    for (index, issue) in issues.iter().enumerate() {
        let text = issue.common().primary_text().to_lowercase();
        for &token in ENTITY_TOKENS {
            if text.contains(token) {
                by_entity.entry(token.to_owned()).or_default().push(index);
            }
        }
        for ip in find_ipv4_tokens(&text) {
            by_entity.entry(ip).or_default().push(index);
        }
    }

    let mut candidates: Vec<EntityCandidate> = by_entity
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(entity, members)| EntityCandidate { entity, members })
        .collect();
    candidates.sort_by(|a, b| a.entity.cmp(&b.entity));
    candidates
}

fn find_ipv4_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '"' | '\'' | '(' | ')'))
        .filter(|word| is_ipv4(word))
        .map(str::to_owned)
        .collect()
}

fn is_ipv4(word: &str) -> bool {
    let parts: Vec<&str> = word.split('.').collect();
    parts.len() == 4 && parts.iter().all(|part| !part.is_empty() && part.parse::<u8>().is_ok())
}

fn cluster_by_location(issues: &[Issue], tolerance: u32) -> Vec<Vec<usize>> {
    let mut visited = vec![false; issues.len()];
    let mut clusters = Vec::new();

    for i in 0..issues.len() {
        if visited[i] {
            continue;
        }
        let mut cluster = vec![i];
        visited[i] = true;
        for j in (i + 1)..issues.len() {
            if visited[j] {
                continue;
            }
            if locations_overlap(issues, i, j, tolerance) {
                cluster.push(j);
                visited[j] = true;
            }
        }
        clusters.push(cluster);
    }
    clusters
}

fn locations_overlap(issues: &[Issue], a: usize, b: usize, tolerance: u32) -> bool {
    let a_locs = issues[a].common().location.entries();
    let b_locs = issues[b].common().location.entries();
    a_locs
        .iter()
        .any(|loc_a| b_locs.iter().any(|loc_b| loc_a.overlaps(loc_b, tolerance)))
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Groups `cluster`'s members into union-find equivalence classes by text
/// similarity, alongside the average of the pairwise similarity scores that
/// triggered each class's unions (`None` for a class with no qualifying
/// pair, i.e. a singleton).
fn union_find_by_similarity(issues: &[Issue], cluster: &[usize], threshold: f64) -> Vec<(Vec<usize>, Option<f64>)> {
    let local_len = cluster.len();
    let mut uf = UnionFind::new(local_len);
    let mut qualifying_pairs = Vec::new();

    for (a, &local_a) in cluster.iter().enumerate() {
        for (b, &local_b) in cluster.iter().enumerate().skip(a + 1) {
            let text_a = issues[local_a].common().primary_text().to_lowercase();
            let text_b = issues[local_b].common().primary_text().to_lowercase();
            let score = combined_similarity(&text_a, &text_b);
            if score >= threshold {
                uf.union(a, b);
                qualifying_pairs.push((a, score));
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for (local, &global) in cluster.iter().enumerate() {
        let root = uf.find(local);
        groups.entry(root).or_default().push(global);
    }

    let mut scores_by_root: HashMap<usize, Vec<f64>> = HashMap::new();
    for (local, score) in qualifying_pairs {
        scores_by_root.entry(uf.find(local)).or_default().push(score);
    }

    groups
        .into_iter()
        .map(|(root, members)| {
            let similarity = scores_by_root.get(&root).map(|scores| scores.iter().sum::<f64>() / scores.len() as f64);
            (members, similarity)
        })
        .collect()
}

fn pick_representative(issues: &[Issue], class: &[usize]) -> usize {
    class
        .iter()
        .copied()
        .max_by(|&a, &b| {
            issues[a]
                .representative_score()
                .total_cmp(&issues[b].representative_score())
        })
        .unwrap_or(class[0])
}

/// Weighted text similarity: `0.6 * levenshtein_sim + 0.4 * jaccard_sim`
/// (`spec.md` §4.8 step 2).
fn combined_similarity(a: &str, b: &str) -> f64 {
    0.6 * levenshtein_similarity(a, b) + 0.4 * jaccard_similarity(a, b)
}

fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let distance = levenshtein_distance(a, b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cur = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j + 1])
            };
            prev_diag = cur;
        }
    }
    row[b.len()]
}

fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodoc_domain::entities::{FileLocation, IssueCommon, Location};

    fn error_at(primary: &str, start: u32, end: u32, severity: u8) -> Issue {
        Issue::Error {
            common: IssueCommon {
                category: "docs".to_owned(),
                problem: Some(primary.to_owned()),
                description: None,
                title: None,
                location: Location::Single(FileLocation {
                    file: Some("AGENTS.md".to_owned()),
                    start_line: start,
                    end_line: end,
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
    fn keeps_plus_removed_equals_input_size() {
        let issues = vec![
            error_at("setup instructions are vague", 10, 12, 8),
            error_at("setup instructions are vague and unclear", 11, 13, 6),
            error_at("unrelated issue about licensing", 50, 52, 4),
        ];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        assert_eq!(output.kept.len() + output.removed.len(), issues.len());
    }

    #[test]
    fn near_duplicate_text_in_overlapping_location_merges() {
        let issues = vec![
            error_at("setup instructions are vague", 10, 12, 8),
            error_at("setup instructions are vague", 11, 13, 6),
        ];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        assert_eq!(output.kept.len(), 1);
        assert_eq!(output.removed.len(), 1);
        // Higher severity (8) should be kept as representative.
        assert_eq!(issues[output.kept[0]].representative_score().round() as i64, 80);
    }

    #[test]
    fn distant_locations_never_cluster() {
        let issues = vec![error_at("a", 1, 2, 5), error_at("a", 500, 502, 5)];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        assert_eq!(output.kept.len(), 2);
        assert!(output.removed.is_empty());
    }

    #[test]
    fn overlapping_location_with_distinct_text_becomes_location_candidate() {
        let issues = vec![
            error_at("missing install steps entirely", 10, 12, 7),
            error_at("broken hyperlink to contributing guide", 11, 13, 3),
        ];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        assert_eq!(output.location_candidates.len(), 1);
        assert_eq!(output.kept.len(), 2);
    }

    #[test]
    fn merged_cluster_reason_names_the_location_match_and_similarity_percent() {
        let issues = vec![
            error_at("vague setup instructions", 10, 20, 5),
            error_at("setup instructions vague", 10, 20, 5),
            error_at("unclear setup", 10, 20, 5),
        ];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        assert_eq!(output.kept.len(), 1);
        assert_eq!(output.removed.len(), 2);
        assert_eq!(output.clusters.len(), 1);
        let cluster = &output.clusters[0];
        assert!(cluster.reason.contains("Same location"), "reason was: {}", cluster.reason);
        let percent: u32 = cluster
            .reason
            .split_whitespace()
            .find_map(|word| word.strip_suffix('%').and_then(|digits| digits.parse().ok()))
            .expect("reason should contain a percent figure");
        assert!(percent >= 75, "expected similarity percent >= 75, got {percent}");
    }

    #[test]
    fn entity_candidates_group_issues_mentioning_the_same_technology() {
        let issues = vec![
            error_at("the postgres connection string is wrong", 1, 2, 5),
            error_at("migration script assumes postgres is running locally", 40, 41, 3),
            error_at("unrelated formatting nit", 80, 81, 2),
        ];
        let output = deduplicate(&issues, DeduplicationConfig::default());
        let postgres = output
            .entity_candidates
            .iter()
            .find(|c| c.entity == "postgres")
            .expect("postgres entity candidate should be detected");
        assert_eq!(postgres.members, vec![0, 1]);
    }

    #[test]
    fn levenshtein_similarity_of_identical_strings_is_one() {
        assert!((levenshtein_similarity("same text", "same text") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_similarity_ignores_word_order() {
        let score = jaccard_similarity("missing setup steps", "setup steps missing");
        assert!((score - 1.0).abs() < f64::EPSILON);
    }
}
