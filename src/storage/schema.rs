//! SQLite schema for the alignment engine

/// Database schema, applied on open
pub const SCHEMA: &str = r#"
-- Natural-key index for code entities: stable identity across re-scans
CREATE TABLE IF NOT EXISTS entity_index (
    project_id TEXT NOT NULL,
    path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    id TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (project_id, path, name, kind)
);

-- Natural-key index for doc pages
CREATE TABLE IF NOT EXISTS doc_index (
    project_id TEXT NOT NULL,
    path TEXT NOT NULL,
    id TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (project_id, path)
);

-- Derived mapping set; replaced wholesale per run
CREATE TABLE IF NOT EXISTS mappings (
    project_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    anchor TEXT NOT NULL DEFAULT '',
    score REAL NOT NULL,
    relation TEXT NOT NULL,
    subject_visibility TEXT NOT NULL,
    PRIMARY KEY (project_id, entity_id, doc_id, anchor)
);

CREATE INDEX IF NOT EXISTS idx_mappings_doc ON mappings(project_id, doc_id);

-- Gap set; one row per natural key
CREATE TABLE IF NOT EXISTS gaps (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    entity_id TEXT,
    doc_id TEXT,
    anchor TEXT,
    severity TEXT NOT NULL,
    priority REAL NOT NULL,
    reason TEXT NOT NULL,
    status TEXT NOT NULL,
    resolved_by TEXT,
    resolution_reason TEXT,
    first_detected TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_gaps_natural_key
    ON gaps(project_id, kind, coalesce(entity_id, doc_id, ''), coalesce(anchor, ''));

CREATE INDEX IF NOT EXISTS idx_gaps_status ON gaps(project_id, status);

-- Run summaries
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    mapping_count INTEGER NOT NULL,
    gaps_by_kind TEXT NOT NULL,
    gaps_by_severity TEXT NOT NULL,
    errors TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_project ON runs(project_id, started_at);
"#;
