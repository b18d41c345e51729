//! Gap records: detected documentation problems
//!
//! Gaps are created by the classifier and re-identified across runs by a
//! natural key, so repeated runs update a persistent gap instead of
//! duplicating it. Status is the only field a human mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of documentation problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Missing,
    Partial,
    Stale,
    BrokenLink,
    IncorrectSample,
    OrphanDoc,
    OutdatedScreenshot,
}

impl std::fmt::Display for GapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapKind::Missing => write!(f, "missing"),
            GapKind::Partial => write!(f, "partial"),
            GapKind::Stale => write!(f, "stale"),
            GapKind::BrokenLink => write!(f, "broken_link"),
            GapKind::IncorrectSample => write!(f, "incorrect_sample"),
            GapKind::OrphanDoc => write!(f, "orphan_doc"),
            GapKind::OutdatedScreenshot => write!(f, "outdated_screenshot"),
        }
    }
}

/// Severity of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GapSeverity {
    /// Fixed monotonic weight used by the priority formula
    pub fn weight(self) -> f64 {
        match self {
            GapSeverity::Low => 1.0,
            GapSeverity::Medium => 2.0,
            GapSeverity::High => 4.0,
            GapSeverity::Critical => 8.0,
        }
    }
}

impl std::fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapSeverity::Low => write!(f, "low"),
            GapSeverity::Medium => write!(f, "medium"),
            GapSeverity::High => write!(f, "high"),
            GapSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle status of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    Investigating,
    Resolved,
    WontFix,
}

impl std::fmt::Display for GapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapStatus::Open => write!(f, "open"),
            GapStatus::Investigating => write!(f, "investigating"),
            GapStatus::Resolved => write!(f, "resolved"),
            GapStatus::WontFix => write!(f, "wont_fix"),
        }
    }
}

/// Who moved a gap into its current resolved state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Human,
    Pipeline,
}

/// A detected documentation problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Storage handle, stable across runs for the same natural key
    pub id: String,
    pub project_id: String,
    pub kind: GapKind,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
    /// Anchor the problem is pinned to, when one applies
    #[serde(default)]
    pub anchor: Option<String>,
    pub severity: GapSeverity,
    /// Non-negative ranking score; see gaps::priority
    pub priority: f64,
    pub reason: String,
    pub status: GapStatus,
    /// Set when status is Resolved; WontFix is always a human action
    #[serde(default)]
    pub resolved_by: Option<Actor>,
    #[serde(default)]
    pub resolution_reason: Option<String>,
    pub first_detected: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Gap {
    /// Natural key identifying this gap across runs.
    ///
    /// At least one of entity_id/doc_id must be set; the subject is the
    /// entity when present, otherwise the doc.
    pub fn key(&self) -> GapKey {
        GapKey {
            project_id: self.project_id.clone(),
            kind: self.kind,
            subject_id: self
                .entity_id
                .clone()
                .or_else(|| self.doc_id.clone())
                .unwrap_or_default(),
            anchor: self.anchor.clone().unwrap_or_default(),
        }
    }

    /// Whether the pipeline may still rewrite this gap's fields
    pub fn is_active(&self) -> bool {
        matches!(self.status, GapStatus::Open | GapStatus::Investigating)
    }
}

/// Natural key for a gap: (project, kind, subject id, anchor)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GapKey {
    pub project_id: String,
    pub kind: GapKind,
    pub subject_id: String,
    pub anchor: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(kind: GapKind, entity: Option<&str>, doc: Option<&str>) -> Gap {
        Gap {
            id: "g1".to_string(),
            project_id: "p1".to_string(),
            kind,
            entity_id: entity.map(String::from),
            doc_id: doc.map(String::from),
            anchor: None,
            severity: GapSeverity::High,
            priority: 4.0,
            reason: "test".to_string(),
            status: GapStatus::Open,
            resolved_by: None,
            resolution_reason: None,
            first_detected: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_severity_weights_monotonic() {
        assert!(GapSeverity::Low.weight() < GapSeverity::Medium.weight());
        assert!(GapSeverity::Medium.weight() < GapSeverity::High.weight());
        assert!(GapSeverity::High.weight() < GapSeverity::Critical.weight());
        assert_eq!(GapSeverity::Critical.weight(), 8.0);
    }

    #[test]
    fn test_natural_key_prefers_entity() {
        let g = gap(GapKind::Partial, Some("e1"), Some("d1"));
        assert_eq!(g.key().subject_id, "e1");

        let g = gap(GapKind::OrphanDoc, None, Some("d1"));
        assert_eq!(g.key().subject_id, "d1");
    }

    #[test]
    fn test_active_status() {
        let mut g = gap(GapKind::Missing, Some("e1"), None);
        assert!(g.is_active());
        g.status = GapStatus::WontFix;
        assert!(!g.is_active());
    }
}
