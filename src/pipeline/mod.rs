//! Pipeline orchestration
//!
//! Runs the alignment stages in order for one project (full or delta
//! mode), reconciles against the previous run's snapshot and assembles the
//! run summary. A run is a pure function of (inputs, snapshot, mode, now,
//! config): running it twice on unchanged inputs yields identical mapping
//! and gap sets.

pub mod orchestrator;

pub use orchestrator::Orchestrator;

use crate::model::{DocKey, EntityKey, Gap, GapKind, GapSeverity, Mapping};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Fatal engine failures; everything else recovers locally into the run
/// summary's error list
#[derive(Debug, Error)]
pub enum EngineError {
    /// The project has neither entities nor docs; an explicit failure so
    /// an incomplete scan never looks like a clean, empty project
    #[error("project '{0}' has no entities and no documentation pages")]
    NoInput(String),

    /// The run was cancelled (project deleted, or superseded by a newer
    /// run); no output was written
    #[error("run cancelled")]
    Cancelled,
}

/// Pipeline execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Recompute mappings and gaps from the complete current sets
    Full,
    /// Restrict scoring to entities/docs with version above the
    /// watermark; sweeps still run project-wide
    Delta { watermark: u64 },
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Full => write!(f, "full"),
            RunMode::Delta { watermark } => write!(f, "delta@{watermark}"),
        }
    }
}

/// Everything a project run consumes from collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInputs {
    pub project_id: String,
    #[serde(default)]
    pub entities: Vec<crate::model::CodeEntity>,
    #[serde(default)]
    pub docs: Vec<crate::model::DocPage>,
    /// Per-entity last-changed timestamps from version-control history
    #[serde(default)]
    pub change_evidence: BTreeMap<String, DateTime<Utc>>,
    /// Per-entity usage frequency for the priority usage weight
    #[serde(default)]
    pub usage: BTreeMap<String, f64>,
    /// Entity ids whose UI/screens changed since the docs' screenshots
    #[serde(default)]
    pub ui_changed: BTreeSet<String>,
}

/// The previous run's persisted state, passed in explicitly so the
/// pipeline stays unit-testable with in-memory fixtures
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Natural key -> storage id for entities of the previous scan
    pub entity_ids: BTreeMap<EntityKey, String>,
    /// Natural key -> storage id for docs of the previous scan
    pub doc_ids: BTreeMap<DocKey, String>,
    pub mappings: Vec<Mapping>,
    pub gaps: Vec<Gap>,
}

/// One recovered failure inside a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub stage: String,
    pub subject: String,
    pub message: String,
}

/// Result summary; always produced, even on partial failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub project_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mapping_count: usize,
    pub gaps_by_kind: BTreeMap<GapKind, usize>,
    pub gaps_by_severity: BTreeMap<GapSeverity, usize>,
    pub errors: Vec<RunError>,
}

/// Complete output of one run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub mappings: Vec<Mapping>,
    pub gaps: Vec<Gap>,
    pub summary: RunSummary,
    /// Snapshot for the next run to diff against
    pub snapshot: Snapshot,
}

/// Cooperative cancellation handle.
///
/// A superseded or cancelled run checks this between stages and aborts
/// without writing partial output.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
