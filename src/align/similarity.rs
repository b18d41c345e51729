//! Pairwise similarity scoring between one entity and one doc anchor
//!
//! Combines an embedding term with heuristic signals:
//! - name-overlap: token-set similarity between entity name and heading
//! - path-overlap: shared leading path segments
//! - kind-affinity: fixed boost when the heading follows the documentation
//!   convention for the entity's kind
//!
//! Scores are pure functions of their inputs, so results are reproducible
//! across runs absent any input change.

use super::{
    cosine_similarity, EMBEDDING_WEIGHT, HEURISTIC_WEIGHT, KIND_WEIGHT, NAME_WEIGHT,
    NEUTRAL_EMBEDDING, PATH_WEIGHT,
};
use crate::model::{CodeEntity, DocPage, EntityKind, Heading};
use std::collections::BTreeSet;

/// One scoring target: a doc page plus an optional heading.
///
/// `heading: None` means the whole page (anchor "").
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub doc: &'a DocPage,
    pub heading: Option<&'a Heading>,
}

impl<'a> Candidate<'a> {
    /// Anchor slug this candidate maps to; empty for the whole page
    pub fn anchor(&self) -> &str {
        self.heading.map(|h| h.anchor.as_str()).unwrap_or("")
    }

    /// Text the entity name is matched against
    fn target_text(&self) -> &str {
        self.heading.map(|h| h.text.as_str()).unwrap_or(&self.doc.title)
    }

    /// Anchor-level embedding with page-level fallback
    fn embedding(&self) -> Option<&[f32]> {
        self.heading
            .and_then(|h| h.embedding.as_deref())
            .or(self.doc.embedding.as_deref())
    }
}

/// Evidence breakdown for one scored pair; every component is in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub embedding: f64,
    pub name_overlap: f64,
    pub path_overlap: f64,
    pub kind_affinity: f64,
    pub heuristic: f64,
    pub score: f64,
}

/// Computes compatibility scores for entity/anchor pairs
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one entity against one candidate anchor
    pub fn score(&self, entity: &CodeEntity, candidate: &Candidate<'_>) -> ScoreBreakdown {
        let embedding = match (entity.embedding.as_deref(), candidate.embedding()) {
            // Absent embeddings are neutral, not zero, so heuristics alone
            // can still produce a match
            (Some(e), Some(d)) => ((cosine_similarity(e, d) + 1.0) / 2.0).clamp(0.0, 1.0),
            _ => NEUTRAL_EMBEDDING,
        };

        let name_overlap = name_overlap(&entity.name, candidate.target_text());
        let path_overlap = path_overlap(&entity.path, &candidate.doc.path);
        let kind_affinity = kind_affinity(entity.kind, candidate);

        let heuristic = NAME_WEIGHT * name_overlap
            + PATH_WEIGHT * path_overlap
            + KIND_WEIGHT * kind_affinity;

        let score =
            (EMBEDDING_WEIGHT * embedding + HEURISTIC_WEIGHT * heuristic).clamp(0.0, 1.0);

        ScoreBreakdown {
            embedding,
            name_overlap,
            path_overlap,
            kind_affinity,
            heuristic,
            score,
        }
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an identifier or heading into lowercase tokens.
///
/// Splits on camelCase humps, snake_case, kebab-case and punctuation;
/// single-character fragments are dropped.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let mut current = String::new();

    let flush = |current: &mut String, tokens: &mut BTreeSet<String>| {
        if current.len() > 1 {
            tokens.insert(current.to_ascii_lowercase());
        }
        current.clear();
    };

    let mut prev_lower = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower {
                flush(&mut current, &mut tokens);
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            current.push(ch);
        } else {
            prev_lower = false;
            flush(&mut current, &mut tokens);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

/// Token-set similarity between an entity name and a heading/title.
///
/// Ratio of the entity's name tokens that appear in the target text.
fn name_overlap(entity_name: &str, target: &str) -> f64 {
    let entity_tokens = tokenize(entity_name);
    if entity_tokens.is_empty() {
        return 0.0;
    }
    let target_tokens = tokenize(target);
    let shared = entity_tokens.intersection(&target_tokens).count();
    shared as f64 / entity_tokens.len() as f64
}

/// Shared leading path segments over the longer path's segment count
fn path_overlap(entity_path: &str, doc_path: &str) -> f64 {
    let a: Vec<&str> = entity_path.split('/').filter(|s| !s.is_empty()).collect();
    let b: Vec<&str> = doc_path.split('/').filter(|s| !s.is_empty()).collect();

    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 0.0;
    }

    let common = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count();

    common as f64 / max_len as f64
}

const HTTP_VERBS: &[&str] = &["get", "post", "put", "delete", "patch", "head", "options"];
const CONFIG_SECTIONS: &[&str] = &[
    "configuration",
    "config",
    "environment",
    "options",
    "settings",
    "usage",
    "variables",
    "cli",
    "commands",
    "flags",
];

/// Fixed lookup boosting headings that follow the kind's doc convention.
///
/// A pure boost: 1.0 when the heading matches the convention, 0 otherwise,
/// so a pair with no signal at all stays below the mentions band.
fn kind_affinity(kind: EntityKind, candidate: &Candidate<'_>) -> f64 {
    let text = candidate.target_text();
    let aligned = match kind {
        EntityKind::Endpoint => {
            let tokens = tokenize(text);
            HTTP_VERBS.iter().any(|v| tokens.contains(*v)) || text.contains('/')
        }
        EntityKind::Env | EntityKind::Flag | EntityKind::Cli => {
            let mut tokens = tokenize(text);
            tokens.extend(tokenize(&candidate.doc.title));
            CONFIG_SECTIONS.iter().any(|s| tokens.contains(*s))
        }
        EntityKind::Function | EntityKind::Class | EntityKind::Type => {
            has_identifier_token(text)
        }
    };

    if aligned {
        1.0
    } else {
        0.0
    }
}

/// Whether a heading contains an identifier-shaped word (camelCase hump,
/// underscore, dotted path or call parens)
fn has_identifier_token(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        if word.contains("()") || word.contains("::") || word.contains('_') {
            return true;
        }
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        word.contains('.')
            || (word.chars().any(|c| c.is_lowercase())
                && word.chars().skip(1).any(|c| c.is_uppercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocPage, HeadingLevel, Visibility};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entity(kind: EntityKind, name: &str, path: &str) -> CodeEntity {
        CodeEntity {
            id: "e1".to_string(),
            project_id: "p1".to_string(),
            kind,
            name: name.to_string(),
            path: path.to_string(),
            language: "typescript".to_string(),
            signature: None,
            spec: None,
            visibility: Visibility::Public,
            version: 1,
            embedding: None,
        }
    }

    fn page(path: &str, title: &str, headings: Vec<Heading>) -> DocPage {
        DocPage {
            id: "d1".to_string(),
            project_id: "p1".to_string(),
            path: path.to_string(),
            title: title.to_string(),
            headings,
            links: Vec::new(),
            code_blocks: Vec::new(),
            commit: None,
            last_updated: Utc::now(),
            frontmatter: BTreeMap::new(),
            version: 1,
            embedding: None,
        }
    }

    fn heading(text: &str, anchor: &str) -> Heading {
        Heading {
            level: HeadingLevel::H2,
            text: text.to_string(),
            anchor: anchor.to_string(),
            line: 1,
            embedding: None,
        }
    }

    #[test]
    fn test_tokenize_splits_identifiers() {
        let tokens = tokenize("getUserById");
        assert!(tokens.contains("get"));
        assert!(tokens.contains("user"));
        assert!(tokens.contains("by"));
        assert!(tokens.contains("id"));

        let tokens = tokenize("MAX_RETRY_COUNT");
        assert!(tokens.contains("max"));
        assert!(tokens.contains("retry"));
        assert!(tokens.contains("count"));

        let tokens = tokenize("Get User");
        assert!(tokens.contains("get"));
        assert!(tokens.contains("user"));
    }

    #[test]
    fn test_name_overlap_matches_heading() {
        assert!((name_overlap("getUser", "Get User") - 1.0).abs() < 1e-9);
        assert!(name_overlap("getUser", "Delete Account") < 0.5);
        assert_eq!(name_overlap("", "Get User"), 0.0);
    }

    #[test]
    fn test_path_overlap() {
        assert!(path_overlap("api/users.ts", "api/users.md") > 0.0);
        assert_eq!(path_overlap("src/auth.rs", "docs/guide.md"), 0.0);
        let full = path_overlap("api/users", "api/users");
        assert!((full - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_affinity_endpoint() {
        let p = page("docs/api.md", "API", vec![heading("GET /users/:id", "get-users-id")]);
        let c = Candidate {
            doc: &p,
            heading: Some(&p.headings[0]),
        };
        assert_eq!(kind_affinity(EntityKind::Endpoint, &c), 1.0);

        let p2 = page("docs/guide.md", "Guide", vec![heading("Overview", "overview")]);
        let c2 = Candidate {
            doc: &p2,
            heading: Some(&p2.headings[0]),
        };
        assert_eq!(kind_affinity(EntityKind::Endpoint, &c2), 0.0);
    }

    #[test]
    fn test_kind_affinity_env_under_configuration() {
        let p = page(
            "docs/config.md",
            "Configuration",
            vec![heading("DATABASE_URL", "database-url")],
        );
        let c = Candidate {
            doc: &p,
            heading: Some(&p.headings[0]),
        };
        assert_eq!(kind_affinity(EntityKind::Env, &c), 1.0);
    }

    #[test]
    fn test_score_within_bounds() {
        let scorer = SimilarityScorer::new();
        let mut e = entity(EntityKind::Function, "getUser", "api/users.ts");
        let mut p = page("docs/api.md", "API", vec![heading("getUser()", "getuser")]);

        // No embeddings: neutral term
        let b = scorer.score(&e, &Candidate { doc: &p, heading: Some(&p.headings[0]) });
        assert!(b.score >= 0.0 && b.score <= 1.0);
        assert_eq!(b.embedding, NEUTRAL_EMBEDDING);

        // Opposed embeddings still clamp into [0, 1]
        e.embedding = Some(vec![1.0, 0.0]);
        p.headings[0].embedding = Some(vec![-1.0, 0.0]);
        let b = scorer.score(&e, &Candidate { doc: &p, heading: Some(&p.headings[0]) });
        assert!(b.score >= 0.0 && b.score <= 1.0);
        assert!(b.embedding.abs() < 1e-9);
    }

    #[test]
    fn test_anchor_embedding_falls_back_to_page() {
        let scorer = SimilarityScorer::new();
        let mut e = entity(EntityKind::Function, "getUser", "api/users.ts");
        e.embedding = Some(vec![1.0, 0.0]);

        let mut p = page("docs/api.md", "API", vec![heading("getUser", "getuser")]);
        p.embedding = Some(vec![1.0, 0.0]);

        let b = scorer.score(&e, &Candidate { doc: &p, heading: Some(&p.headings[0]) });
        // identical vectors -> (1 + 1) / 2 = 1.0
        assert!((b.embedding - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_matching_pair_reaches_describes_band() {
        let scorer = SimilarityScorer::new();
        let mut e = entity(EntityKind::Function, "getUser", "api/users.ts");
        e.embedding = Some(vec![0.9, 0.1, 0.0]);

        let mut h = heading("getUser", "getuser");
        h.embedding = Some(vec![0.9, 0.1, 0.0]);
        let p = page("api/users.md", "API", vec![h]);

        let b = scorer.score(&e, &Candidate { doc: &p, heading: Some(&p.headings[0]) });
        assert!(b.score >= super::super::DESCRIBES_MIN, "score was {}", b.score);
    }
}
