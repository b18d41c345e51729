//! Drift detection
//!
//! Compares code-derived truth against documentation content and produces
//! drift observations for the gap classifier:
//! - Schema drift and sample divergence (spec vs mapped doc content)
//! - Broken links (internal anchor resolution, bounded external probing)
//! - Staleness (doc older than its described entities' last change)
//! - Orphan docs and unmapped entities (project-wide sweeps)

pub mod detector;
pub mod links;
pub mod schema;

pub use detector::{DriftDetector, DriftInput, DriftOutcome};
pub use links::{check_external, check_internal, HttpProber, LinkProber};
pub use schema::SchemaDiff;

use serde::{Deserialize, Serialize};

/// Kind of drift observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// Spec field present on one side and absent on the other
    SchemaDrift,
    /// Doc code block shows a value diverging from the current spec
    SampleDivergence,
    /// Link target does not exist
    BrokenLink,
    /// Doc older than its described entities' last change
    Stale,
    /// Doc page with zero inbound mappings
    OrphanDoc,
    /// Public/internal entity with no describes mapping
    UnmappedEntity,
    /// Image reference on a doc whose described entity's UI changed
    OutdatedScreenshot,
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftKind::SchemaDrift => write!(f, "schema_drift"),
            DriftKind::SampleDivergence => write!(f, "sample_divergence"),
            DriftKind::BrokenLink => write!(f, "broken_link"),
            DriftKind::Stale => write!(f, "stale"),
            DriftKind::OrphanDoc => write!(f, "orphan_doc"),
            DriftKind::UnmappedEntity => write!(f, "unmapped_entity"),
            DriftKind::OutdatedScreenshot => write!(f, "outdated_screenshot"),
        }
    }
}

/// One drift observation: kind, subject, evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftObservation {
    pub kind: DriftKind,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub doc_id: Option<String>,
    /// Anchor or link target the observation is pinned to
    #[serde(default)]
    pub anchor: Option<String>,
    pub evidence: String,
}

/// Outcome of probing a link target.
///
/// Timeout and transport failure are values, not errors: an unreachable
/// check is Unknown, never Broken, so transient network issues cannot
/// produce false positives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Valid,
    Broken,
    Unknown,
}

/// A per-subject failure inside a drift stage.
///
/// Isolated to the subject: the rest of the run continues and the error
/// surfaces in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub subject: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_kind_display() {
        assert_eq!(DriftKind::SchemaDrift.to_string(), "schema_drift");
        assert_eq!(DriftKind::OutdatedScreenshot.to_string(), "outdated_screenshot");
    }
}
