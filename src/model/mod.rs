//! Core record types for the alignment engine
//!
//! Everything the pipeline consumes or produces is defined here:
//! - Code entities and documentation pages (inputs, replaced per scan)
//! - Mappings (derived entity -> doc anchor edges)
//! - Gaps (detected documentation problems)

pub mod doc;
pub mod entity;
pub mod gap;
pub mod mapping;

pub use doc::{CodeBlock, DocKey, DocLink, DocPage, Heading, HeadingLevel};
pub use entity::{CodeEntity, EntityKey, EntityKind, Param, Signature, Visibility};
pub use gap::{Actor, Gap, GapKey, GapKind, GapSeverity, GapStatus};
pub use mapping::{Mapping, Relation};

use sha2::{Digest, Sha256};

/// Compute a stable hex digest for content
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
