//! DocAlign - code-to-documentation alignment and gap detection engine
//!
//! This library computes a best-effort mapping between code entities and
//! documentation anchors, detects and classifies documentation gaps from
//! that mapping plus drift signals, and produces a priority-ranked,
//! reproducible gap list.

pub mod align;
pub mod cli;
pub mod config;
pub mod drift;
pub mod gaps;
pub mod model;
pub mod pipeline;
pub mod storage;

/// Re-export commonly used types
pub use align::{Mapper, SimilarityScorer};
pub use config::EngineConfig;
pub use drift::{DriftDetector, DriftObservation};
pub use gaps::GapClassifier;
pub use model::{CodeEntity, DocPage, Gap, Mapping};
pub use pipeline::{Orchestrator, ProjectInputs, RunMode, Snapshot};
pub use storage::Database;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docalign";
