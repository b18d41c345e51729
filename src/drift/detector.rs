//! Main drift detection pass
//!
//! Consumes the completed mapping set plus externally-supplied change
//! evidence and produces drift observations. Schema failures are isolated
//! per entity; every other entity still gets checked.

use super::schema;
use super::{check_internal, DriftKind, DriftObservation, StageError};
use crate::model::{CodeEntity, DocPage, Mapping, Relation};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Everything one drift pass needs
pub struct DriftInput<'a> {
    pub entities: &'a [CodeEntity],
    pub docs: &'a [DocPage],
    pub mappings: &'a [Mapping],
    /// Per-entity last-changed timestamp (e.g. latest commit touching the
    /// entity's path), supplied by an external collaborator
    pub change_evidence: &'a BTreeMap<String, DateTime<Utc>>,
    /// Entity ids whose UI/screens changed, supplied externally
    pub ui_changed: &'a BTreeSet<String>,
}

/// Observations plus per-subject stage errors
#[derive(Debug, Default)]
pub struct DriftOutcome {
    pub observations: Vec<DriftObservation>,
    pub errors: Vec<StageError>,
}

/// Runs the mapping-dependent and sweep checks for one project
pub struct DriftDetector {
    staleness_threshold_days: i64,
}

impl DriftDetector {
    pub fn new(staleness_threshold_days: i64) -> Self {
        Self {
            staleness_threshold_days,
        }
    }

    /// Detect all non-network drift for a project.
    ///
    /// Requires the completed mapping set (schema and staleness checks walk
    /// describes relations); the orphan/unmapped sweeps are project-wide so
    /// deletions surface even on delta runs.
    pub fn detect(&self, input: &DriftInput<'_>) -> DriftOutcome {
        let mut outcome = DriftOutcome::default();

        let entities: HashMap<&str, &CodeEntity> =
            input.entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let docs: HashMap<&str, &DocPage> =
            input.docs.iter().map(|d| (d.id.as_str(), d)).collect();

        let describes: Vec<&Mapping> = input
            .mappings
            .iter()
            .filter(|m| m.relation == Relation::Describes)
            .collect();

        for mapping in &describes {
            let (Some(entity), Some(doc)) = (
                entities.get(mapping.entity_id.as_str()),
                docs.get(mapping.doc_id.as_str()),
            ) else {
                continue;
            };

            self.check_schema(entity, doc, mapping, &mut outcome);
            self.check_staleness(entity, doc, mapping, input.change_evidence, &mut outcome);
            self.check_screenshot(entity, doc, input.ui_changed, &mut outcome);
        }

        self.sweep_orphans(input, &mut outcome);
        self.sweep_unmapped(input, &describes, &mut outcome);

        outcome.observations.extend(check_internal(input.docs));

        outcome
    }

    fn check_schema(
        &self,
        entity: &CodeEntity,
        doc: &DocPage,
        mapping: &Mapping,
        outcome: &mut DriftOutcome,
    ) {
        match schema::diff_entity_against_doc(entity, doc) {
            Ok(diff) => {
                if diff.drift_count() > 0 {
                    outcome.observations.push(DriftObservation {
                        kind: DriftKind::SchemaDrift,
                        entity_id: Some(entity.id.clone()),
                        doc_id: Some(doc.id.clone()),
                        anchor: Some(mapping.anchor.clone()),
                        evidence: diff.evidence(),
                    });
                }
            }
            Err(message) => {
                outcome.errors.push(StageError {
                    subject: entity.id.clone(),
                    message,
                });
                return;
            }
        }

        for divergence in schema::sample_divergences(entity, doc) {
            outcome.observations.push(DriftObservation {
                kind: DriftKind::SampleDivergence,
                entity_id: Some(entity.id.clone()),
                doc_id: Some(doc.id.clone()),
                anchor: Some(mapping.anchor.clone()),
                evidence: format!(
                    "code block at line {} shows {}={}, spec default is {}",
                    divergence.line,
                    divergence.param,
                    divergence.sample_value,
                    divergence.spec_default
                ),
            });
        }
    }

    fn check_staleness(
        &self,
        entity: &CodeEntity,
        doc: &DocPage,
        mapping: &Mapping,
        change_evidence: &BTreeMap<String, DateTime<Utc>>,
        outcome: &mut DriftOutcome,
    ) {
        let Some(last_change) = change_evidence.get(&entity.id) else {
            return;
        };

        let threshold = Duration::days(self.staleness_threshold_days);
        if *last_change - doc.last_updated > threshold {
            outcome.observations.push(DriftObservation {
                kind: DriftKind::Stale,
                entity_id: Some(entity.id.clone()),
                doc_id: Some(doc.id.clone()),
                anchor: Some(mapping.anchor.clone()),
                evidence: format!(
                    "'{}' last changed {}, but '{}' was last updated {} ({} day threshold)",
                    entity.name,
                    last_change.format("%Y-%m-%d"),
                    doc.path,
                    doc.last_updated.format("%Y-%m-%d"),
                    self.staleness_threshold_days
                ),
            });
        }
    }

    fn check_screenshot(
        &self,
        entity: &CodeEntity,
        doc: &DocPage,
        ui_changed: &BTreeSet<String>,
        outcome: &mut DriftOutcome,
    ) {
        if !ui_changed.contains(&entity.id) {
            return;
        }

        for link in &doc.links {
            if link.is_image() {
                outcome.observations.push(DriftObservation {
                    kind: DriftKind::OutdatedScreenshot,
                    entity_id: Some(entity.id.clone()),
                    doc_id: Some(doc.id.clone()),
                    anchor: Some(link.url.clone()),
                    evidence: format!(
                        "image '{}' at line {} may show the old UI of '{}'",
                        link.url, link.line, entity.name
                    ),
                });
            }
        }
    }

    /// Docs with zero inbound mappings of any relation
    fn sweep_orphans(&self, input: &DriftInput<'_>, outcome: &mut DriftOutcome) {
        let mapped_docs: HashSet<&str> =
            input.mappings.iter().map(|m| m.doc_id.as_str()).collect();

        for doc in input.docs {
            if !mapped_docs.contains(doc.id.as_str()) {
                outcome.observations.push(DriftObservation {
                    kind: DriftKind::OrphanDoc,
                    entity_id: None,
                    doc_id: Some(doc.id.clone()),
                    anchor: None,
                    evidence: format!("'{}' is referenced by no code entity", doc.path),
                });
            }
        }
    }

    /// Public/internal entities with no describes mapping
    fn sweep_unmapped(
        &self,
        input: &DriftInput<'_>,
        describes: &[&Mapping],
        outcome: &mut DriftOutcome,
    ) {
        let described: HashSet<&str> = describes.iter().map(|m| m.entity_id.as_str()).collect();

        for entity in input.entities {
            if entity.is_documentable() && !described.contains(entity.id.as_str()) {
                outcome.observations.push(DriftObservation {
                    kind: DriftKind::UnmappedEntity,
                    entity_id: Some(entity.id.clone()),
                    doc_id: None,
                    anchor: None,
                    evidence: format!(
                        "{} '{}' ({}) has no primary documentation",
                        entity.kind, entity.name, entity.path
                    ),
                });
            }
        }
    }
}
