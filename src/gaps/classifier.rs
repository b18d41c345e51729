//! Drift-signal to gap classification
//!
//! Deterministic and type-exhaustive: every drift observation maps to
//! exactly one gap kind, severity follows the subject's visibility and
//! relation level, and gaps deduplicate on their natural key. Previous
//! gaps are reconciled so that:
//! - open/investigating gaps update in place (no duplicates)
//! - wont_fix gaps are never touched
//! - human-resolved gaps are never reopened by the pipeline
//! - pipeline-resolved gaps reopen when the condition reproduces
//! - active gaps whose condition disappears auto-resolve with a reason

use super::priority::compute_priority;
use crate::drift::{DriftKind, DriftObservation};
use crate::model::{
    fingerprint, Actor, CodeEntity, Gap, GapKey, GapKind, GapSeverity, GapStatus, Mapping,
    Relation, Visibility,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Everything one classification pass needs
pub struct ClassifyInput<'a> {
    pub project_id: &'a str,
    pub entities: &'a [CodeEntity],
    pub mappings: &'a [Mapping],
    pub observations: &'a [DriftObservation],
    /// Per-entity usage frequency, supplied externally; absent means 1.0
    pub usage: &'a BTreeMap<String, f64>,
    pub previous_gaps: &'a [Gap],
    pub now: DateTime<Utc>,
}

/// Produces the final gap set for a project
pub struct GapClassifier {
    half_life_days: f64,
}

impl GapClassifier {
    pub fn new(half_life_days: f64) -> Self {
        Self { half_life_days }
    }

    pub fn classify(&self, input: &ClassifyInput<'_>) -> Vec<Gap> {
        let visibility: HashMap<&str, Visibility> = input
            .entities
            .iter()
            .map(|e| (e.id.as_str(), e.visibility))
            .collect();

        // Docs covered by a describes mapping with a public subject; a
        // broken link on one of these is a critical gap
        let public_described_docs: BTreeSet<&str> = input
            .mappings
            .iter()
            .filter(|m| {
                m.relation == Relation::Describes && m.subject_visibility == Visibility::Public
            })
            .map(|m| m.doc_id.as_str())
            .collect();

        // Detected gaps, deduplicated on the natural key
        let mut detected: BTreeMap<GapKey, Gap> = BTreeMap::new();

        for observation in input.observations {
            let kind = gap_kind(observation.kind);
            let severity = self.severity(observation, kind, &visibility, &public_described_docs);

            let draft = Gap {
                id: String::new(),
                project_id: input.project_id.to_string(),
                kind,
                entity_id: observation.entity_id.clone(),
                doc_id: observation.doc_id.clone(),
                anchor: observation.anchor.clone(),
                severity,
                priority: 0.0,
                reason: observation.evidence.clone(),
                status: GapStatus::Open,
                resolved_by: None,
                resolution_reason: None,
                first_detected: input.now,
                last_seen: input.now,
            };

            let key = draft.key();
            match detected.get_mut(&key) {
                Some(existing) => {
                    // Same condition observed twice: keep the stronger
                    // severity, note the extra evidence
                    if severity > existing.severity {
                        existing.severity = severity;
                    }
                    if !existing.reason.contains(&draft.reason) {
                        existing.reason.push_str("; ");
                        existing.reason.push_str(&draft.reason);
                    }
                }
                None => {
                    detected.insert(key, draft);
                }
            }
        }

        let previous: BTreeMap<GapKey, &Gap> =
            input.previous_gaps.iter().map(|g| (g.key(), g)).collect();

        let mut gaps: Vec<Gap> = Vec::new();

        for (key, mut gap) in detected {
            match previous.get(&key) {
                Some(prior) if prior.status == GapStatus::WontFix => {
                    // Never touched, even while the condition persists
                    gaps.push((*prior).clone());
                    continue;
                }
                Some(prior)
                    if prior.status == GapStatus::Resolved
                        && prior.resolved_by == Some(Actor::Human) =>
                {
                    // A human closed it; the pipeline never reopens
                    gaps.push((*prior).clone());
                    continue;
                }
                Some(prior) if prior.status == GapStatus::Resolved => {
                    // Pipeline-resolved, condition is back
                    gap.id = prior.id.clone();
                    gap.reason = format!("condition detected again: {}", gap.reason);
                }
                Some(prior) => {
                    // Open/investigating: update in place
                    gap.id = prior.id.clone();
                    gap.status = prior.status;
                    gap.first_detected = prior.first_detected;
                }
                None => {
                    gap.id = gap_id(&key);
                }
            }

            gap.priority = compute_priority(
                gap.severity,
                gap.first_detected,
                input.now,
                gap.entity_id.as_ref().and_then(|id| input.usage.get(id)).copied(),
                self.half_life_days,
            );
            gaps.push(gap);
        }

        // Previous gaps whose condition no longer reproduces
        let detected_keys: BTreeSet<GapKey> = gaps.iter().map(|g| g.key()).collect();
        for prior in input.previous_gaps {
            if detected_keys.contains(&prior.key()) {
                continue;
            }
            let mut carried = prior.clone();
            if carried.is_active() {
                carried.status = GapStatus::Resolved;
                carried.resolved_by = Some(Actor::Pipeline);
                carried.resolution_reason = Some("condition no longer detected".to_string());
            }
            gaps.push(carried);
        }

        // Priority-ranked, reproducible ordering
        gaps.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.key().cmp(&b.key()))
        });

        gaps
    }

    fn severity(
        &self,
        observation: &DriftObservation,
        kind: GapKind,
        visibility: &HashMap<&str, Visibility>,
        public_described_docs: &BTreeSet<&str>,
    ) -> GapSeverity {
        let subject_visibility = observation
            .entity_id
            .as_deref()
            .and_then(|id| visibility.get(id))
            .copied();

        match kind {
            GapKind::Missing => match subject_visibility {
                Some(Visibility::Public) => GapSeverity::Critical,
                _ => GapSeverity::Medium,
            },
            GapKind::BrokenLink => {
                let doc_described = observation
                    .doc_id
                    .as_deref()
                    .is_some_and(|id| public_described_docs.contains(id));
                if doc_described {
                    GapSeverity::Critical
                } else {
                    GapSeverity::Medium
                }
            }
            GapKind::Partial | GapKind::Stale | GapKind::IncorrectSample => {
                match subject_visibility {
                    Some(Visibility::Public) => GapSeverity::High,
                    Some(Visibility::Internal) => GapSeverity::Medium,
                    _ => GapSeverity::Low,
                }
            }
            GapKind::OutdatedScreenshot => match subject_visibility {
                Some(Visibility::Public) => GapSeverity::Medium,
                _ => GapSeverity::Low,
            },
            GapKind::OrphanDoc => GapSeverity::Low,
        }
    }
}

/// Type-exhaustive drift-signal to gap-kind mapping
fn gap_kind(drift: DriftKind) -> GapKind {
    match drift {
        DriftKind::UnmappedEntity => GapKind::Missing,
        DriftKind::SchemaDrift => GapKind::Partial,
        DriftKind::Stale => GapKind::Stale,
        DriftKind::BrokenLink => GapKind::BrokenLink,
        DriftKind::SampleDivergence => GapKind::IncorrectSample,
        DriftKind::OrphanDoc => GapKind::OrphanDoc,
        DriftKind::OutdatedScreenshot => GapKind::OutdatedScreenshot,
    }
}

/// Deterministic storage id derived from the natural key, so identical
/// inputs yield byte-identical gap sets
fn gap_id(key: &GapKey) -> String {
    let digest = fingerprint(&format!(
        "{}|{}|{}|{}",
        key.project_id, key.kind, key.subject_id, key.anchor
    ));
    format!("gap-{}", &digest[..16])
}
