//! SQLite persistence for cross-run state
//!
//! The engine itself is a pure computation; this layer keeps what the
//! next run needs to diff against:
//! - Natural-key indexes (entity/doc identity across re-scans)
//! - The current mapping and gap sets per project
//! - Run summaries
//!
//! `commit_run` swaps a run's complete output in atomically; a cancelled
//! or superseded run never leaves partial rows.

mod schema;

pub use schema::SCHEMA;

use crate::model::{
    Actor, DocKey, EntityKey, EntityKind, Gap, GapKind, GapSeverity, GapStatus, Mapping,
    Relation, Visibility,
};
use crate::pipeline::{RunOutput, RunSummary, Snapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    // ==================== Snapshot ====================

    /// Load the previous run's state for a project
    pub fn load_snapshot(&self, project_id: &str) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        let mut stmt = self
            .conn
            .prepare("SELECT path, name, kind, id FROM entity_index WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (path, name, kind, id) = row?;
            snapshot.entity_ids.insert(
                EntityKey {
                    project_id: project_id.to_string(),
                    path,
                    name,
                    kind: parse_entity_kind(&kind),
                },
                id,
            );
        }

        let mut stmt = self
            .conn
            .prepare("SELECT path, id FROM doc_index WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (path, id) = row?;
            snapshot.doc_ids.insert(
                DocKey {
                    project_id: project_id.to_string(),
                    path,
                },
                id,
            );
        }

        snapshot.mappings = self.mappings_for_project(project_id)?;
        snapshot.gaps = self.gaps_for_project(project_id)?;

        Ok(snapshot)
    }

    /// Persist a run's complete output in one transaction.
    ///
    /// The project's mapping and gap sets are replaced wholesale; the
    /// natural-key indexes are rebuilt from the run's snapshot.
    pub fn commit_run(&mut self, output: &RunOutput) -> Result<()> {
        let project_id = output.summary.project_id.clone();
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM entity_index WHERE project_id = ?1",
            params![project_id],
        )?;
        for (key, id) in &output.snapshot.entity_ids {
            tx.execute(
                r#"
                INSERT INTO entity_index (project_id, path, name, kind, id, version, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 0, datetime('now'))
                "#,
                params![key.project_id, key.path, key.name, key.kind.to_string(), id],
            )?;
        }

        tx.execute(
            "DELETE FROM doc_index WHERE project_id = ?1",
            params![project_id],
        )?;
        for (key, id) in &output.snapshot.doc_ids {
            tx.execute(
                r#"
                INSERT INTO doc_index (project_id, path, id, version, updated_at)
                VALUES (?1, ?2, ?3, 0, datetime('now'))
                "#,
                params![key.project_id, key.path, id],
            )?;
        }

        tx.execute(
            "DELETE FROM mappings WHERE project_id = ?1",
            params![project_id],
        )?;
        for mapping in &output.mappings {
            tx.execute(
                r#"
                INSERT INTO mappings (
                    project_id, entity_id, doc_id, anchor, score, relation, subject_visibility
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    mapping.project_id,
                    mapping.entity_id,
                    mapping.doc_id,
                    mapping.anchor,
                    mapping.score,
                    mapping.relation.to_string(),
                    mapping.subject_visibility.to_string(),
                ],
            )?;
        }

        tx.execute("DELETE FROM gaps WHERE project_id = ?1", params![project_id])?;
        for gap in &output.gaps {
            tx.execute(
                r#"
                INSERT INTO gaps (
                    id, project_id, kind, entity_id, doc_id, anchor, severity,
                    priority, reason, status, resolved_by, resolution_reason,
                    first_detected, last_seen
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    gap.id,
                    gap.project_id,
                    gap.kind.to_string(),
                    gap.entity_id,
                    gap.doc_id,
                    gap.anchor,
                    gap.severity.to_string(),
                    gap.priority,
                    gap.reason,
                    gap.status.to_string(),
                    gap.resolved_by.map(actor_str),
                    gap.resolution_reason,
                    gap.first_detected.to_rfc3339(),
                    gap.last_seen.to_rfc3339(),
                ],
            )?;
        }

        insert_run_summary(&tx, &output.summary)?;

        tx.commit().context("Failed to commit run output")?;
        Ok(())
    }

    // ==================== Mappings ====================

    /// Get all mappings for a project, canonically ordered
    pub fn mappings_for_project(&self, project_id: &str) -> Result<Vec<Mapping>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT project_id, entity_id, doc_id, anchor, score, relation, subject_visibility
            FROM mappings WHERE project_id = ?1
            ORDER BY entity_id, score DESC, doc_id, anchor
            "#,
        )?;

        let rows = stmt.query_map(params![project_id], |row| {
            Ok(MappingRow {
                project_id: row.get(0)?,
                entity_id: row.get(1)?,
                doc_id: row.get(2)?,
                anchor: row.get(3)?,
                score: row.get(4)?,
                relation: row.get(5)?,
                subject_visibility: row.get(6)?,
            })
        })?;

        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row?.into_mapping());
        }

        Ok(mappings)
    }

    // ==================== Gaps ====================

    /// Get all gaps for a project, highest priority first
    pub fn gaps_for_project(&self, project_id: &str) -> Result<Vec<Gap>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, project_id, kind, entity_id, doc_id, anchor, severity,
                   priority, reason, status, resolved_by, resolution_reason,
                   first_detected, last_seen
            FROM gaps WHERE project_id = ?1
            ORDER BY priority DESC, kind, id
            "#,
        )?;

        let rows = stmt.query_map(params![project_id], |row| {
            Ok(GapRow {
                id: row.get(0)?,
                project_id: row.get(1)?,
                kind: row.get(2)?,
                entity_id: row.get(3)?,
                doc_id: row.get(4)?,
                anchor: row.get(5)?,
                severity: row.get(6)?,
                priority: row.get(7)?,
                reason: row.get(8)?,
                status: row.get(9)?,
                resolved_by: row.get(10)?,
                resolution_reason: row.get(11)?,
                first_detected: row.get(12)?,
                last_seen: row.get(13)?,
            })
        })?;

        let mut gaps = Vec::new();
        for row in rows {
            gaps.push(row?.into_gap());
        }

        Ok(gaps)
    }

    /// Record a human status decision on a gap.
    ///
    /// Status is the only field a human mutates; resolution is attributed
    /// to `Actor::Human` so the pipeline never undoes it.
    pub fn set_gap_status(
        &self,
        gap_id: &str,
        status: GapStatus,
        reason: Option<&str>,
    ) -> Result<bool> {
        let resolved_by = match status {
            GapStatus::Resolved | GapStatus::WontFix => Some(actor_str(Actor::Human)),
            _ => None,
        };

        let count = self
            .conn
            .execute(
                r#"
                UPDATE gaps
                SET status = ?1, resolved_by = ?2, resolution_reason = ?3
                WHERE id = ?4
                "#,
                params![status.to_string(), resolved_by, reason, gap_id],
            )
            .context("Failed to update gap status")?;

        Ok(count > 0)
    }

    // ==================== Runs ====================

    /// Latest run summaries for a project
    pub fn runs_for_project(&self, project_id: &str, limit: usize) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT run_id, project_id, mode, started_at, finished_at,
                   mapping_count, gaps_by_kind, gaps_by_severity, errors
            FROM runs WHERE project_id = ?1
            ORDER BY started_at DESC LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![project_id, limit as i64], |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                project_id: row.get(1)?,
                mode: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                mapping_count: row.get(5)?,
                gaps_by_kind: row.get(6)?,
                gaps_by_severity: row.get(7)?,
                errors: row.get(8)?,
            })
        })?;

        let mut runs = Vec::new();
        for row in rows {
            if let Ok(summary) = row?.into_summary() {
                runs.push(summary);
            }
        }

        Ok(runs)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let mappings: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM mappings", [], |row| row.get(0))?;

        let gaps: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM gaps", [], |row| row.get(0))?;

        let open_gaps: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM gaps WHERE status IN ('open', 'investigating')",
            [],
            |row| row.get(0),
        )?;

        let runs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            mappings: mappings as usize,
            gaps: gaps as usize,
            open_gaps: open_gaps as usize,
            runs: runs as usize,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub mappings: usize,
    pub gaps: usize,
    pub open_gaps: usize,
    pub runs: usize,
}

fn insert_run_summary(tx: &rusqlite::Transaction<'_>, summary: &RunSummary) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO runs (
            run_id, project_id, mode, started_at, finished_at,
            mapping_count, gaps_by_kind, gaps_by_severity, errors
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            summary.run_id,
            summary.project_id,
            summary.mode.to_string(),
            summary.started_at.to_rfc3339(),
            summary.finished_at.to_rfc3339(),
            summary.mapping_count as i64,
            serde_json::to_string(&summary.gaps_by_kind)?,
            serde_json::to_string(&summary.gaps_by_severity)?,
            serde_json::to_string(&summary.errors)?,
        ],
    )?;
    Ok(())
}

// Internal row types for database mapping

struct MappingRow {
    project_id: String,
    entity_id: String,
    doc_id: String,
    anchor: String,
    score: f64,
    relation: String,
    subject_visibility: String,
}

impl MappingRow {
    fn into_mapping(self) -> Mapping {
        Mapping {
            project_id: self.project_id,
            entity_id: self.entity_id,
            doc_id: self.doc_id,
            anchor: self.anchor,
            score: self.score,
            relation: parse_relation(&self.relation),
            subject_visibility: parse_visibility(&self.subject_visibility),
        }
    }
}

struct GapRow {
    id: String,
    project_id: String,
    kind: String,
    entity_id: Option<String>,
    doc_id: Option<String>,
    anchor: Option<String>,
    severity: String,
    priority: f64,
    reason: String,
    status: String,
    resolved_by: Option<String>,
    resolution_reason: Option<String>,
    first_detected: String,
    last_seen: String,
}

impl GapRow {
    fn into_gap(self) -> Gap {
        Gap {
            id: self.id,
            project_id: self.project_id,
            kind: parse_gap_kind(&self.kind),
            entity_id: self.entity_id,
            doc_id: self.doc_id,
            anchor: self.anchor,
            severity: parse_severity(&self.severity),
            priority: self.priority,
            reason: self.reason,
            status: parse_status(&self.status),
            resolved_by: self.resolved_by.as_deref().map(parse_actor),
            resolution_reason: self.resolution_reason,
            first_detected: parse_timestamp(&self.first_detected),
            last_seen: parse_timestamp(&self.last_seen),
        }
    }
}

struct RunRow {
    run_id: String,
    project_id: String,
    mode: String,
    started_at: String,
    finished_at: String,
    mapping_count: i64,
    gaps_by_kind: String,
    gaps_by_severity: String,
    errors: String,
}

impl RunRow {
    fn into_summary(self) -> Result<RunSummary> {
        let mode = if let Some(watermark) = self.mode.strip_prefix("delta@") {
            crate::pipeline::RunMode::Delta {
                watermark: watermark.parse().unwrap_or(0),
            }
        } else {
            crate::pipeline::RunMode::Full
        };

        Ok(RunSummary {
            run_id: self.run_id,
            project_id: self.project_id,
            mode,
            started_at: parse_timestamp(&self.started_at),
            finished_at: parse_timestamp(&self.finished_at),
            mapping_count: self.mapping_count as usize,
            gaps_by_kind: serde_json::from_str(&self.gaps_by_kind)?,
            gaps_by_severity: serde_json::from_str(&self.gaps_by_severity)?,
            errors: serde_json::from_str(&self.errors)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn parse_entity_kind(raw: &str) -> EntityKind {
    match raw {
        "function" => EntityKind::Function,
        "class" => EntityKind::Class,
        "endpoint" => EntityKind::Endpoint,
        "cli" => EntityKind::Cli,
        "flag" => EntityKind::Flag,
        "env" => EntityKind::Env,
        "type" => EntityKind::Type,
        _ => EntityKind::Function,
    }
}

fn parse_relation(raw: &str) -> Relation {
    match raw {
        "describes" => Relation::Describes,
        "references" => Relation::References,
        "mentions" => Relation::Mentions,
        _ => Relation::Mentions,
    }
}

fn parse_visibility(raw: &str) -> Visibility {
    match raw {
        "public" => Visibility::Public,
        "internal" => Visibility::Internal,
        "private" => Visibility::Private,
        _ => Visibility::Internal,
    }
}

fn parse_gap_kind(raw: &str) -> GapKind {
    match raw {
        "missing" => GapKind::Missing,
        "partial" => GapKind::Partial,
        "stale" => GapKind::Stale,
        "broken_link" => GapKind::BrokenLink,
        "incorrect_sample" => GapKind::IncorrectSample,
        "orphan_doc" => GapKind::OrphanDoc,
        "outdated_screenshot" => GapKind::OutdatedScreenshot,
        _ => GapKind::Missing,
    }
}

fn parse_severity(raw: &str) -> GapSeverity {
    match raw {
        "low" => GapSeverity::Low,
        "medium" => GapSeverity::Medium,
        "high" => GapSeverity::High,
        "critical" => GapSeverity::Critical,
        _ => GapSeverity::Medium,
    }
}

fn parse_status(raw: &str) -> GapStatus {
    match raw {
        "open" => GapStatus::Open,
        "investigating" => GapStatus::Investigating,
        "resolved" => GapStatus::Resolved,
        "wont_fix" => GapStatus::WontFix,
        _ => GapStatus::Open,
    }
}

fn parse_actor(raw: &str) -> Actor {
    match raw {
        "human" => Actor::Human,
        _ => Actor::Pipeline,
    }
}

fn actor_str(actor: Actor) -> &'static str {
    match actor {
        Actor::Human => "human",
        Actor::Pipeline => "pipeline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunError, RunMode};
    use std::collections::BTreeMap;

    fn sample_gap(id: &str, project: &str) -> Gap {
        Gap {
            id: id.to_string(),
            project_id: project.to_string(),
            kind: GapKind::Missing,
            entity_id: Some("e1".to_string()),
            doc_id: None,
            anchor: None,
            severity: GapSeverity::Critical,
            priority: 8.0,
            reason: "no primary documentation".to_string(),
            status: GapStatus::Open,
            resolved_by: None,
            resolution_reason: None,
            first_detected: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    fn sample_output(project: &str, gaps: Vec<Gap>, mappings: Vec<Mapping>) -> RunOutput {
        let snapshot = Snapshot {
            entity_ids: BTreeMap::from([(
                EntityKey {
                    project_id: project.to_string(),
                    path: "api/users.ts".to_string(),
                    name: "getUser".to_string(),
                    kind: EntityKind::Function,
                },
                "e1".to_string(),
            )]),
            doc_ids: BTreeMap::new(),
            mappings: mappings.clone(),
            gaps: gaps.clone(),
        };

        RunOutput {
            mappings,
            gaps,
            snapshot,
            summary: RunSummary {
                run_id: uuid::Uuid::new_v4().to_string(),
                project_id: project.to_string(),
                mode: RunMode::Full,
                started_at: Utc::now(),
                finished_at: Utc::now(),
                mapping_count: 0,
                gaps_by_kind: BTreeMap::new(),
                gaps_by_severity: BTreeMap::new(),
                errors: vec![RunError {
                    stage: "drift".to_string(),
                    subject: "e9".to_string(),
                    message: "malformed spec".to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.mappings, 0);
        assert_eq!(stats.gaps, 0);
    }

    #[test]
    fn test_commit_and_load_snapshot() {
        let mut db = Database::open_in_memory().unwrap();

        let mapping = Mapping {
            project_id: "p1".to_string(),
            entity_id: "e1".to_string(),
            doc_id: "d1".to_string(),
            anchor: "get-user".to_string(),
            score: 0.91,
            relation: Relation::Describes,
            subject_visibility: Visibility::Public,
        };
        let output = sample_output("p1", vec![sample_gap("g1", "p1")], vec![mapping.clone()]);

        db.commit_run(&output).unwrap();

        let snapshot = db.load_snapshot("p1").unwrap();
        assert_eq!(snapshot.mappings, vec![mapping]);
        assert_eq!(snapshot.gaps.len(), 1);
        assert_eq!(snapshot.gaps[0].id, "g1");
        assert_eq!(snapshot.gaps[0].status, GapStatus::Open);
        assert_eq!(snapshot.entity_ids.len(), 1);
    }

    #[test]
    fn test_commit_replaces_previous_sets() {
        let mut db = Database::open_in_memory().unwrap();

        db.commit_run(&sample_output("p1", vec![sample_gap("g1", "p1")], Vec::new()))
            .unwrap();
        db.commit_run(&sample_output("p1", vec![sample_gap("g2", "p1")], Vec::new()))
            .unwrap();

        let gaps = db.gaps_for_project("p1").unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].id, "g2");
    }

    #[test]
    fn test_projects_are_isolated() {
        let mut db = Database::open_in_memory().unwrap();

        db.commit_run(&sample_output("p1", vec![sample_gap("g1", "p1")], Vec::new()))
            .unwrap();
        db.commit_run(&sample_output("p2", vec![sample_gap("g2", "p2")], Vec::new()))
            .unwrap();

        assert_eq!(db.gaps_for_project("p1").unwrap().len(), 1);
        assert_eq!(db.gaps_for_project("p2").unwrap().len(), 1);
    }

    #[test]
    fn test_human_status_update_round_trips() {
        let mut db = Database::open_in_memory().unwrap();
        db.commit_run(&sample_output("p1", vec![sample_gap("g1", "p1")], Vec::new()))
            .unwrap();

        let updated = db
            .set_gap_status("g1", GapStatus::WontFix, Some("legacy API"))
            .unwrap();
        assert!(updated);

        let gaps = db.gaps_for_project("p1").unwrap();
        assert_eq!(gaps[0].status, GapStatus::WontFix);
        assert_eq!(gaps[0].resolved_by, Some(Actor::Human));
        assert_eq!(gaps[0].resolution_reason.as_deref(), Some("legacy API"));

        assert!(!db
            .set_gap_status("missing", GapStatus::Resolved, None)
            .unwrap());
    }

    #[test]
    fn test_run_summary_round_trips() {
        let mut db = Database::open_in_memory().unwrap();
        db.commit_run(&sample_output("p1", Vec::new(), Vec::new()))
            .unwrap();

        let runs = db.runs_for_project("p1", 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].mapping_count, 0);
        assert_eq!(runs[0].errors.len(), 1);
        assert_eq!(runs[0].errors[0].stage, "drift");
    }
}
