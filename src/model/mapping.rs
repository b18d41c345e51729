//! Mapping records: scored entity -> doc anchor edges
//!
//! Mappings are derived data. The full set for a project is recomputed on
//! every pipeline run and replaces the previous set; the only human
//! actions are pinning/overriding (out of scope here) or a rerun.

use super::entity::Visibility;
use serde::{Deserialize, Serialize};

/// Strength/role of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Primary authoritative coverage; at most one per entity
    Describes,
    /// Secondary coverage
    References,
    /// Incidental mention
    Mentions,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Describes => write!(f, "describes"),
            Relation::References => write!(f, "references"),
            Relation::Mentions => write!(f, "mentions"),
        }
    }
}

/// A directed, scored edge from a code entity to a doc anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub project_id: String,
    pub entity_id: String,
    pub doc_id: String,
    /// Heading anchor slug; empty string means the whole page
    pub anchor: String,
    /// Combined similarity score in [0, 1]
    pub score: f64,
    pub relation: Relation,
    /// Visibility of the subject entity, propagated unchanged so the
    /// export boundary can exclude private subjects
    pub subject_visibility: Visibility,
}

impl Mapping {
    /// Whether this mapping targets the whole page rather than an anchor
    pub fn is_whole_page(&self) -> bool {
        self.anchor.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_ordering() {
        // Describes sorts before References sorts before Mentions
        assert!(Relation::Describes < Relation::References);
        assert!(Relation::References < Relation::Mentions);
    }

    #[test]
    fn test_whole_page() {
        let m = Mapping {
            project_id: "p1".to_string(),
            entity_id: "e1".to_string(),
            doc_id: "d1".to_string(),
            anchor: String::new(),
            score: 0.9,
            relation: Relation::Describes,
            subject_visibility: Visibility::Public,
        };
        assert!(m.is_whole_page());
    }
}
