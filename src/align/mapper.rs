//! Per-project mapping pass
//!
//! Scores every entity x candidate-anchor pair, assigns relation bands and
//! emits the full replacement mapping set for the project. Greedy and
//! deterministic: a per-entity top-k keeps the pass linear in
//! entities x anchors, which matters for large monorepos; optimal
//! bipartite matching buys nothing when cardinality is many-entities to
//! one-page.

use super::similarity::{Candidate, SimilarityScorer};
use super::{DESCRIBES_MIN, MENTIONS_MIN, REFERENCES_MIN};
use crate::model::{CodeEntity, DocPage, Mapping, Relation};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Default cap on emitted mapping rows per entity
pub const DEFAULT_MAX_MAPPINGS: usize = 5;

/// Produces the scored mapping set for one project
pub struct Mapper {
    scorer: SimilarityScorer,
    max_per_entity: usize,
}

struct ScoredCandidate<'a> {
    doc: &'a DocPage,
    anchor: String,
    score: f64,
}

impl Mapper {
    pub fn new(max_per_entity: usize) -> Self {
        Self {
            scorer: SimilarityScorer::new(),
            max_per_entity,
        }
    }

    /// Compute the complete replacement mapping set for a project.
    ///
    /// Candidates are restricted to docs with the entity's project id;
    /// there is never cross-project matching. The scoring stage is
    /// parallel across entities, with the per-entity top-k selection as
    /// the only reduction point.
    pub fn map_project(&self, entities: &[CodeEntity], docs: &[DocPage]) -> Vec<Mapping> {
        let mut mappings: Vec<Mapping> = entities
            .par_iter()
            .map(|entity| self.map_entity(entity, docs))
            .flatten()
            .collect();

        // Canonical output order so identical inputs yield identical bytes
        mappings.sort_by(|a, b| {
            a.entity_id
                .cmp(&b.entity_id)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
                .then_with(|| a.anchor.cmp(&b.anchor))
        });

        mappings
    }

    /// Score all candidates for one entity and assign relation bands
    fn map_entity(&self, entity: &CodeEntity, docs: &[DocPage]) -> Vec<Mapping> {
        let mut scored: Vec<ScoredCandidate<'_>> = Vec::new();

        for doc in docs {
            if doc.project_id != entity.project_id {
                continue;
            }

            // Whole page first, then each heading anchor
            let whole = Candidate { doc, heading: None };
            let breakdown = self.scorer.score(entity, &whole);
            if breakdown.score >= MENTIONS_MIN {
                scored.push(ScoredCandidate {
                    doc,
                    anchor: String::new(),
                    score: breakdown.score,
                });
            }

            for heading in &doc.headings {
                let candidate = Candidate {
                    doc,
                    heading: Some(heading),
                };
                let breakdown = self.scorer.score(entity, &candidate);
                if breakdown.score >= MENTIONS_MIN {
                    scored.push(ScoredCandidate {
                        doc,
                        anchor: heading.anchor.clone(),
                        score: breakdown.score,
                    });
                }
            }
        }

        // Stable tie-break: score, doc recency, doc path, anchor
        scored.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => b
                .doc
                .last_updated
                .cmp(&a.doc.last_updated)
                .then_with(|| a.doc.path.cmp(&b.doc.path))
                .then_with(|| a.anchor.cmp(&b.anchor)),
            other => other,
        });

        let mut mappings = Vec::new();
        let mut describes_taken = false;

        for candidate in scored.into_iter().take(self.max_per_entity) {
            let relation = if candidate.score >= DESCRIBES_MIN {
                if describes_taken {
                    // Only the single top match describes; the rest of the
                    // high band demotes to references
                    Relation::References
                } else {
                    describes_taken = true;
                    Relation::Describes
                }
            } else if candidate.score >= REFERENCES_MIN {
                Relation::References
            } else {
                Relation::Mentions
            };

            mappings.push(Mapping {
                project_id: entity.project_id.clone(),
                entity_id: entity.id.clone(),
                doc_id: candidate.doc.id.clone(),
                anchor: candidate.anchor,
                score: candidate.score,
                relation,
                subject_visibility: entity.visibility,
            });
        }

        mappings
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MAPPINGS)
    }
}
