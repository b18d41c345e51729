//! Documentation page records
//!
//! A `DocPage` is one parsed documentation file: its headings (anchors),
//! outbound links, code blocks and frontmatter. Pages are replaced
//! wholesale on each doc scan, keyed by (project, path).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Heading level in documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1 = 1,
    H2 = 2,
    H3 = 3,
    H4 = 4,
    H5 = 5,
    H6 = 6,
}

impl std::fmt::Display for HeadingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H{}", *self as u8)
    }
}

/// A heading within a doc page; the anchor slug is a mapping target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
    /// Slug used as the in-page anchor (e.g. "get-user")
    pub anchor: String,
    pub line: usize,
    /// Anchor-level embedding; the page embedding is the fallback
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// An outbound link found in a doc page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocLink {
    /// Target: `path#anchor` for internal links, a full URL for external
    pub url: String,
    pub line: usize,
    pub external: bool,
}

impl DocLink {
    /// Whether the link points at an image asset
    pub fn is_image(&self) -> bool {
        let target = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        let ext = target.rsplit('.').next().unwrap_or("");
        matches!(
            ext.to_ascii_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp"
        )
    }
}

/// A fenced code block found in a doc page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub language: Option<String>,
    pub code: String,
    pub line: usize,
}

/// One documentation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocPage {
    /// Storage handle; stable across scans only while the natural key is
    pub id: String,
    pub project_id: String,
    /// File path relative to the docs root
    pub path: String,
    pub title: String,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default)]
    pub links: Vec<DocLink>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
    /// Last-known commit hash touching this page
    #[serde(default)]
    pub commit: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub frontmatter: BTreeMap<String, String>,
    /// Scan sequence number; delta runs select pages above a watermark
    #[serde(default)]
    pub version: u64,
    /// Page-level embedding, used when no anchor-level embedding exists
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl DocPage {
    /// Natural identity across re-scans
    pub fn key(&self) -> DocKey {
        DocKey {
            project_id: self.project_id.clone(),
            path: self.path.clone(),
        }
    }

    /// Look up a heading by anchor slug
    pub fn heading(&self, anchor: &str) -> Option<&Heading> {
        self.headings.iter().find(|h| h.anchor == anchor)
    }
}

/// Natural key for a doc page: (project, path)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocKey {
    pub project_id: String,
    pub path: String,
}

impl std::fmt::Display for DocKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.project_id, self.path)
    }
}
