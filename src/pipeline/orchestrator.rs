//! Per-project pipeline runs
//!
//! Stage order: identity stabilization -> consistency filtering ->
//! scoring/mapping -> drift detection -> gap classification -> summary.
//! External link probing runs concurrently with the sync drift stages and
//! joins at classification time. Cancellation is checked between stages;
//! a cancelled run writes nothing.

use super::{
    CancelToken, EngineError, ProjectInputs, RunError, RunMode, RunOutput, RunSummary, Snapshot,
};
use crate::align::Mapper;
use crate::config::EngineConfig;
use crate::drift::{check_external, DriftDetector, DriftInput, DriftObservation, LinkProber};
use crate::gaps::{ClassifyInput, GapClassifier};
use crate::model::{CodeEntity, DocPage, Gap, GapKind, GapSeverity, Mapping};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs the full alignment pipeline for one project
pub struct Orchestrator {
    config: EngineConfig,
    prober: Option<Arc<dyn LinkProber>>,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            prober: None,
        }
    }

    /// Attach an external link prober; without one, external links stay
    /// unknown and produce no gaps
    pub fn with_prober(mut self, prober: Arc<dyn LinkProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Execute one run.
    ///
    /// `now` is an explicit input so staleness and priority are
    /// reproducible; two full runs over identical arguments produce
    /// identical mapping and gap sets.
    pub async fn run(
        &self,
        inputs: &ProjectInputs,
        previous: &Snapshot,
        mode: RunMode,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<RunOutput, EngineError> {
        let started_at = Utc::now();

        if inputs.entities.is_empty() && inputs.docs.is_empty() {
            return Err(EngineError::NoInput(inputs.project_id.clone()));
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut errors: Vec<RunError> = Vec::new();

        // Rewrite incoming ids to the persisted id wherever the natural
        // key matches, so mappings and gaps survive id churn across scans
        let inputs = stabilize_identities(inputs, previous);
        let entities = &inputs.entities;
        let docs = &inputs.docs;

        let previous_gaps = self.filter_previous_gaps(previous, entities, docs, &mut errors);

        // External probing starts first so it overlaps the sync stages
        let external = self.spawn_external_checks(docs);

        let mappings = self.map_stage(entities, docs, previous, mode, cancel)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let detector = DriftDetector::new(self.config.staleness_threshold_days);
        let mut outcome = detector.detect(&DriftInput {
            entities,
            docs,
            mappings: &mappings,
            change_evidence: &inputs.change_evidence,
            ui_changed: &inputs.ui_changed,
        });
        for stage_error in outcome.errors.drain(..) {
            errors.push(RunError {
                stage: "drift".to_string(),
                subject: stage_error.subject,
                message: stage_error.message,
            });
        }

        if let Some(handle) = external {
            match handle.await {
                Ok(observations) => outcome.observations.extend(observations),
                Err(e) => errors.push(RunError {
                    stage: "links".to_string(),
                    subject: inputs.project_id.clone(),
                    message: format!("external link checks aborted: {e}"),
                }),
            }
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let classifier = GapClassifier::new(self.config.priority.half_life_days);
        let gaps = classifier.classify(&ClassifyInput {
            project_id: &inputs.project_id,
            entities,
            mappings: &mappings,
            observations: &outcome.observations,
            usage: &inputs.usage,
            previous_gaps: &previous_gaps,
            now,
        });

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let snapshot = Snapshot {
            entity_ids: entities.iter().map(|e| (e.key(), e.id.clone())).collect(),
            doc_ids: docs.iter().map(|d| (d.key(), d.id.clone())).collect(),
            mappings: mappings.clone(),
            gaps: gaps.clone(),
        };

        let summary = summarize(
            &inputs.project_id,
            mode,
            started_at,
            &mappings,
            &gaps,
            errors,
        );

        Ok(RunOutput {
            mappings,
            gaps,
            summary,
            snapshot,
        })
    }

    /// Drop previous gaps referencing ids the engine has never seen;
    /// those are race artifacts, not deletions, and must not be
    /// auto-resolved as if their condition disappeared
    fn filter_previous_gaps(
        &self,
        previous: &Snapshot,
        entities: &[CodeEntity],
        docs: &[DocPage],
        errors: &mut Vec<RunError>,
    ) -> Vec<Gap> {
        let known_entities: HashSet<&str> = entities
            .iter()
            .map(|e| e.id.as_str())
            .chain(previous.entity_ids.values().map(String::as_str))
            .collect();
        let known_docs: HashSet<&str> = docs
            .iter()
            .map(|d| d.id.as_str())
            .chain(previous.doc_ids.values().map(String::as_str))
            .collect();

        previous
            .gaps
            .iter()
            .filter(|gap| {
                let entity_ok = gap
                    .entity_id
                    .as_deref()
                    .map_or(true, |id| known_entities.contains(id));
                let doc_ok = gap
                    .doc_id
                    .as_deref()
                    .map_or(true, |id| known_docs.contains(id));
                if !entity_ok || !doc_ok {
                    warn!(gap = %gap.id, "dropping gap referencing unknown entity/doc");
                    errors.push(RunError {
                        stage: "input".to_string(),
                        subject: gap.id.clone(),
                        message: "gap references an entity/doc id not present in the project"
                            .to_string(),
                    });
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    fn spawn_external_checks(
        &self,
        docs: &[DocPage],
    ) -> Option<tokio::task::JoinHandle<Vec<DriftObservation>>> {
        if !self.config.link.probe_external {
            return None;
        }
        let prober = Arc::clone(self.prober.as_ref()?);
        let docs = docs.to_vec();
        let concurrency = self.config.link.concurrency;
        let timeout = Duration::from_secs(self.config.link.timeout_secs);

        Some(tokio::spawn(async move {
            check_external(&docs, prober, concurrency, timeout).await
        }))
    }

    /// Full recomputes everything; delta rescopes scoring to changed
    /// entities/docs and carries surviving mappings, while deletions are
    /// caught by diffing ids against the current sets
    fn map_stage(
        &self,
        entities: &[CodeEntity],
        docs: &[DocPage],
        previous: &Snapshot,
        mode: RunMode,
        cancel: &CancelToken,
    ) -> Result<Vec<Mapping>, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mapper = Mapper::new(self.config.max_mappings_per_entity);

        let mut mappings = match mode {
            RunMode::Full => mapper.map_project(entities, docs),
            RunMode::Delta { watermark } => {
                let changed_docs: HashSet<&str> = docs
                    .iter()
                    .filter(|d| d.version > watermark)
                    .map(|d| d.id.as_str())
                    .collect();

                // Entities to re-score: changed themselves, or any of
                // their existing mappings points at a changed doc
                let remap_ids: HashSet<&str> = entities
                    .iter()
                    .filter(|e| e.version > watermark)
                    .map(|e| e.id.as_str())
                    .chain(previous.mappings.iter().filter_map(|m| {
                        changed_docs
                            .contains(m.doc_id.as_str())
                            .then_some(m.entity_id.as_str())
                    }))
                    .collect();

                let remap: Vec<CodeEntity> = entities
                    .iter()
                    .filter(|e| remap_ids.contains(e.id.as_str()))
                    .cloned()
                    .collect();

                let current_entities: HashSet<&str> =
                    entities.iter().map(|e| e.id.as_str()).collect();
                let current_docs: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();

                // Carry mappings of untouched entities; rows whose
                // endpoints were deleted are purged here
                let mut kept: Vec<Mapping> = previous
                    .mappings
                    .iter()
                    .filter(|m| {
                        !remap_ids.contains(m.entity_id.as_str())
                            && current_entities.contains(m.entity_id.as_str())
                            && current_docs.contains(m.doc_id.as_str())
                    })
                    .cloned()
                    .collect();
                debug!(
                    kept = kept.len(),
                    rescored = remap.len(),
                    "delta mapping pass"
                );

                kept.extend(mapper.map_project(&remap, docs));
                kept
            }
        };

        mappings.sort_by(|a, b| {
            a.entity_id
                .cmp(&b.entity_id)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
                .then_with(|| a.anchor.cmp(&b.anchor))
        });

        Ok(mappings)
    }
}

/// Rewrite incoming storage ids to the previously persisted id wherever
/// the natural key matches, remapping the auxiliary signal maps the same
/// way
fn stabilize_identities(inputs: &ProjectInputs, previous: &Snapshot) -> ProjectInputs {
    let mut renames: HashMap<String, String> = HashMap::new();

    let entities: Vec<CodeEntity> = inputs
        .entities
        .iter()
        .map(|entity| {
            let mut entity = entity.clone();
            if let Some(persisted) = previous.entity_ids.get(&entity.key()) {
                if *persisted != entity.id {
                    renames.insert(entity.id.clone(), persisted.clone());
                    entity.id = persisted.clone();
                }
            }
            entity
        })
        .collect();

    let docs: Vec<DocPage> = inputs
        .docs
        .iter()
        .map(|doc| {
            let mut doc = doc.clone();
            if let Some(persisted) = previous.doc_ids.get(&doc.key()) {
                doc.id = persisted.clone();
            }
            doc
        })
        .collect();

    let rename = |id: &String| renames.get(id).cloned().unwrap_or_else(|| id.clone());

    ProjectInputs {
        project_id: inputs.project_id.clone(),
        change_evidence: inputs
            .change_evidence
            .iter()
            .map(|(id, ts)| (rename(id), *ts))
            .collect(),
        usage: inputs.usage.iter().map(|(id, w)| (rename(id), *w)).collect(),
        ui_changed: inputs.ui_changed.iter().map(rename).collect(),
        entities,
        docs,
    }
}

fn summarize(
    project_id: &str,
    mode: RunMode,
    started_at: DateTime<Utc>,
    mappings: &[Mapping],
    gaps: &[Gap],
    errors: Vec<RunError>,
) -> RunSummary {
    let mut gaps_by_kind: BTreeMap<GapKind, usize> = BTreeMap::new();
    let mut gaps_by_severity: BTreeMap<GapSeverity, usize> = BTreeMap::new();

    for gap in gaps.iter().filter(|g| g.is_active()) {
        *gaps_by_kind.entry(gap.kind).or_default() += 1;
        *gaps_by_severity.entry(gap.severity).or_default() += 1;
    }

    RunSummary {
        run_id: uuid::Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        mode,
        started_at,
        finished_at: Utc::now(),
        mapping_count: mappings.len(),
        gaps_by_kind,
        gaps_by_severity,
        errors,
    }
}
