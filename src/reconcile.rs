//! Reconciliation of the two extraction passes into one canonical set.
//!
//! The syntactic and semantic passes run independently, order their output
//! independently, and fail independently. This module merges the two into
//! a single confidence-scored set per compilation unit:
//!
//! - entities match on (exact name, coarse kind class, same file,
//!   sufficient line-range overlap)
//! - matched records score 1.0; single-source records score 0.6
//! - duplicate relationships collapse, keeping the metadata union
//! - ambiguous matches resolve deterministically and never error
//!
//! Output order is diff-stable: primary-derived records first in original
//! traversal order, then secondary-only records appended.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extract::UnitExtraction;
use crate::model::{Entity, IdAllocator, KindClass, Relationship};

/// Confidence assigned to records seen by both passes.
pub const CONFIDENCE_BOTH: f64 = 1.0;

/// Confidence assigned to records seen by exactly one pass.
pub const CONFIDENCE_SINGLE: f64 = 0.6;

/// Minimum line-range overlap, as a fraction of the shorter span, for two
/// entities to match.
pub const DEFAULT_MIN_OVERLAP: f64 = 0.5;

/// Which extraction pass produced a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "primary-only")]
    PrimaryOnly,
    #[serde(rename = "secondary-only")]
    SecondaryOnly,
    #[serde(rename = "both")]
    Both,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::PrimaryOnly => "primary-only",
            Provenance::SecondaryOnly => "secondary-only",
            Provenance::Both => "both",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A canonical entity with provenance and the raw records behind it.
///
/// Never mutated after reconciliation completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridEntity {
    #[serde(flatten)]
    pub entity: Entity,
    pub provenance: Provenance,
    pub confidence: f64,
    /// Raw constituent records, kept for diagnostics; not serialized.
    #[serde(skip)]
    pub primary: Option<Entity>,
    #[serde(skip)]
    pub secondary: Option<Entity>,
}

/// A canonical relationship with provenance and the raw records behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridRelationship {
    #[serde(flatten)]
    pub relationship: Relationship,
    pub provenance: Provenance,
    pub confidence: f64,
    #[serde(skip)]
    pub primary: Option<Relationship>,
    #[serde(skip)]
    pub secondary: Option<Relationship>,
}

/// Result of reconciling one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub entities: Vec<HybridEntity>,
    pub relationships: Vec<HybridRelationship>,
    /// Raw primary entity id -> canonical id, for rewriting records (CFG
    /// results) keyed by primary ids.
    pub primary_id_map: BTreeMap<String, String>,
}

/// Merges the outputs of the two extraction passes.
pub struct EntityReconciler {
    min_overlap: f64,
}

impl EntityReconciler {
    pub fn new() -> Self {
        Self {
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }

    pub fn with_min_overlap(min_overlap: f64) -> Self {
        Self { min_overlap }
    }

    /// Reconcile one unit. `secondary` is None when the unit degraded to
    /// primary-only output.
    ///
    /// Canonical ids are drawn from `ids` in output order, which makes the
    /// result deterministic for a given pair of inputs.
    pub fn reconcile(
        &self,
        primary: &UnitExtraction,
        secondary: Option<&UnitExtraction>,
        ids: &mut IdAllocator,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        // Primary entities seed the canonical set in traversal order.
        for raw in &primary.entities {
            let canonical_id = ids.next_entity(raw.kind);
            outcome
                .primary_id_map
                .insert(raw.id.clone(), canonical_id.clone());

            let mut entity = raw.clone();
            entity.id = canonical_id;
            outcome.entities.push(HybridEntity {
                entity,
                provenance: Provenance::PrimaryOnly,
                confidence: CONFIDENCE_SINGLE,
                primary: Some(raw.clone()),
                secondary: None,
            });
        }

        // Match secondary entities against the canonical set; unmatched
        // ones are appended after all primary-derived records.
        let mut secondary_id_map: BTreeMap<String, String> = BTreeMap::new();
        let mut secondary_only: Vec<HybridEntity> = Vec::new();

        if let Some(secondary) = secondary {
            for raw in &secondary.entities {
                match self.best_match(&outcome.entities, raw) {
                    Some(idx) => {
                        let hybrid = &mut outcome.entities[idx];
                        merge_entity(&mut hybrid.entity, raw);
                        hybrid.provenance = Provenance::Both;
                        hybrid.confidence = CONFIDENCE_BOTH;
                        hybrid.secondary = Some(raw.clone());
                        secondary_id_map.insert(raw.id.clone(), hybrid.entity.id.clone());
                    }
                    None => {
                        let canonical_id = ids.next_entity(raw.kind);
                        secondary_id_map.insert(raw.id.clone(), canonical_id.clone());

                        let mut entity = raw.clone();
                        entity.id = canonical_id;
                        secondary_only.push(HybridEntity {
                            entity,
                            provenance: Provenance::SecondaryOnly,
                            confidence: CONFIDENCE_SINGLE,
                            primary: None,
                            secondary: Some(raw.clone()),
                        });
                    }
                }
            }
        }

        outcome.entities.extend(secondary_only);

        // Primary relationships, rewritten onto canonical source ids.
        for raw in &primary.relationships {
            let source_id = match outcome.primary_id_map.get(&raw.source_id) {
                Some(id) => id.clone(),
                // Source must reference an entity from the same pass; a
                // miss means a malformed extraction, not a merge concern.
                None => continue,
            };
            let mut relationship = raw.clone();
            relationship.id = ids.next_relationship();
            relationship.source_id = source_id;
            outcome.relationships.push(HybridRelationship {
                relationship,
                provenance: Provenance::PrimaryOnly,
                confidence: CONFIDENCE_SINGLE,
                primary: Some(raw.clone()),
                secondary: None,
            });
        }

        // Secondary relationships: collapse duplicates, retain the rest.
        if let Some(secondary) = secondary {
            let primary_names: std::collections::BTreeSet<&str> = primary
                .entities
                .iter()
                .map(|e| e.name.as_str())
                .collect();

            for raw in &secondary.relationships {
                let source_id = match secondary_id_map.get(&raw.source_id) {
                    Some(id) => id.clone(),
                    None => continue,
                };

                let key = (
                    source_id.clone(),
                    raw.target_name.clone(),
                    raw.kind,
                    raw.line,
                );
                if let Some(existing) = outcome
                    .relationships
                    .iter_mut()
                    .find(|r| r.relationship.dedup_key() == key)
                {
                    // Duplicate: one canonical record keeps the metadata
                    // union and the higher confidence.
                    for (k, v) in &raw.metadata {
                        existing
                            .relationship
                            .metadata
                            .entry(k.clone())
                            .or_insert_with(|| v.clone());
                    }
                    existing.provenance = Provenance::Both;
                    existing.confidence = CONFIDENCE_BOTH;
                    existing.secondary = Some(raw.clone());
                    continue;
                }

                let mut relationship = raw.clone();
                relationship.id = ids.next_relationship();
                relationship.source_id = source_id;
                if !target_resolves(&primary_names, &raw.target_name) {
                    // Orphaned against the primary entity set; retained
                    // anyway at single-source confidence.
                    relationship
                        .metadata
                        .insert("orphaned".to_string(), "true".to_string());
                }
                outcome.relationships.push(HybridRelationship {
                    relationship,
                    provenance: Provenance::SecondaryOnly,
                    confidence: CONFIDENCE_SINGLE,
                    primary: None,
                    secondary: Some(raw.clone()),
                });
            }
        }

        outcome
    }

    /// Find the primary-derived candidate a secondary entity matches, if
    /// any.
    ///
    /// Candidates qualify when their overlap exceeds the minimum fraction
    /// of the shorter span. When several qualify, the closest line-range
    /// overlap (largest overlap over the union of both spans) wins; ties
    /// break by first-seen order. This always produces a decision.
    fn best_match(&self, entities: &[HybridEntity], candidate: &Entity) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, hybrid) in entities.iter().enumerate() {
            if hybrid.primary.is_none() {
                continue;
            }
            let entity = &hybrid.entity;
            if entity.name != candidate.name
                || entity.kind.class() != candidate.kind.class()
                || entity.file != candidate.file
            {
                continue;
            }
            if overlap_fraction(entity, candidate) <= self.min_overlap {
                continue;
            }
            let closeness = overlap_closeness(entity, candidate);
            // Strictly-greater keeps the first-seen candidate on ties.
            match best {
                Some((_, best_closeness)) if closeness <= best_closeness => {}
                _ => best = Some((idx, closeness)),
            }
        }

        best.map(|(idx, _)| idx)
    }
}

impl Default for EntityReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Line-range overlap as a fraction of the shorter span.
fn overlap_fraction(a: &Entity, b: &Entity) -> f64 {
    let start = a.start_line.max(b.start_line);
    let end = a.end_line.min(b.end_line);
    if end < start {
        return 0.0;
    }
    let overlap = end - start + 1;
    let shorter = a.span_len().min(b.span_len());
    overlap as f64 / shorter as f64
}

/// Line-range overlap as a fraction of the union of both spans; 1.0 means
/// identical spans.
fn overlap_closeness(a: &Entity, b: &Entity) -> f64 {
    let start = a.start_line.max(b.start_line);
    let end = a.end_line.min(b.end_line);
    if end < start {
        return 0.0;
    }
    let overlap = end - start + 1;
    let union = a.end_line.max(b.end_line) - a.start_line.min(b.start_line) + 1;
    overlap as f64 / union as f64
}

/// Enrich a canonical (primary-derived) entity with fields only the
/// deeper pass could produce. The primary record's own values win.
fn merge_entity(canonical: &mut Entity, secondary: &Entity) {
    if canonical.signature.is_none() {
        canonical.signature = secondary.signature.clone();
    }
    if canonical.return_type.is_none() && canonical.kind.class() != KindClass::TypeLike {
        canonical.return_type = secondary.return_type.clone();
    }
    if canonical.doc.is_none() {
        canonical.doc = secondary.doc.clone();
    }
    for (k, v) in &secondary.metadata {
        canonical
            .metadata
            .entry(k.clone())
            .or_insert_with(|| v.clone());
    }
}

/// A secondary relationship target resolves when it names a primary
/// entity, directly or as the method part of a qualified selector.
fn target_resolves(primary_names: &std::collections::BTreeSet<&str>, target: &str) -> bool {
    if primary_names.contains(target) {
        return true;
    }
    match target.rsplit_once('.') {
        Some((_, method)) => primary_names.contains(method),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, RelationKind, Visibility};
    use std::collections::BTreeMap;

    fn entity(id: &str, name: &str, kind: EntityKind, lines: (usize, usize)) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            package: "main".to_string(),
            file: "main.go".to_string(),
            start_line: lines.0,
            end_line: lines.1,
            signature: None,
            return_type: None,
            receiver: if kind == EntityKind::Method {
                Some("Owner".to_string())
            } else {
                None
            },
            fields: Vec::new(),
            methods: Vec::new(),
            doc: None,
            visibility: Visibility::Public,
            metadata: BTreeMap::new(),
        }
    }

    fn relationship(id: &str, source_id: &str, target: &str, line: usize) -> Relationship {
        Relationship {
            id: id.to_string(),
            source_id: source_id.to_string(),
            source_name: "caller".to_string(),
            target_name: target.to_string(),
            kind: RelationKind::Calls,
            line,
            metadata: BTreeMap::new(),
        }
    }

    fn extraction(entities: Vec<Entity>, relationships: Vec<Relationship>) -> UnitExtraction {
        UnitExtraction {
            package: Some("main".to_string()),
            entities,
            relationships,
            flows: Vec::new(),
            type_resolution_gaps: 0,
        }
    }

    #[test]
    fn test_matched_by_both_scores_full_confidence() {
        let primary = extraction(
            vec![entity("func_1", "run", EntityKind::Function, (10, 20))],
            vec![],
        );
        let secondary = extraction(
            vec![entity("func_1", "run", EntityKind::Function, (10, 20))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].provenance, Provenance::Both);
        assert_eq!(outcome.entities[0].confidence, CONFIDENCE_BOTH);
    }

    #[test]
    fn test_callable_class_collapses_function_and_method() {
        // The semantic pass classifies the same declaration as a method;
        // the coarse kind class still matches.
        let primary = extraction(
            vec![entity("func_1", "Handle", EntityKind::Function, (5, 15))],
            vec![],
        );
        let secondary = extraction(
            vec![entity("method_1", "Handle", EntityKind::Method, (5, 15))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].provenance, Provenance::Both);
    }

    #[test]
    fn test_callable_never_matches_type() {
        let primary = extraction(
            vec![entity("func_1", "Config", EntityKind::Function, (5, 15))],
            vec![],
        );
        let secondary = extraction(
            vec![entity("type_1", "Config", EntityKind::Type, (5, 15))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.entities[0].provenance, Provenance::PrimaryOnly);
        assert_eq!(outcome.entities[1].provenance, Provenance::SecondaryOnly);
    }

    #[test]
    fn test_insufficient_overlap_keeps_records_separate() {
        let primary = extraction(
            vec![entity("func_1", "run", EntityKind::Function, (10, 20))],
            vec![],
        );
        let secondary = extraction(
            vec![entity("func_1", "run", EntityKind::Function, (19, 40))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        // Overlap is 2 lines of an 11-line shorter span: below the
        // threshold.
        assert_eq!(outcome.entities.len(), 2);
    }

    #[test]
    fn test_secondary_only_entity_retained_at_lower_confidence() {
        let primary = extraction(vec![], vec![]);
        let secondary = extraction(
            vec![entity("iface_1", "Store", EntityKind::Interface, (3, 9))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].provenance, Provenance::SecondaryOnly);
        assert_eq!(outcome.entities[0].confidence, CONFIDENCE_SINGLE);
    }

    #[test]
    fn test_ambiguity_resolved_by_closest_overlap() {
        // Two primary candidates overlap the secondary span; the closer
        // overlap (the shorter, fully-covered one) must win.
        let primary = extraction(
            vec![
                entity("func_1", "run", EntityKind::Function, (10, 30)),
                entity("func_2", "run", EntityKind::Function, (12, 18)),
            ],
            vec![],
        );
        let secondary = extraction(
            vec![entity("func_9", "run", EntityKind::Function, (12, 18))],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.entities[0].provenance, Provenance::PrimaryOnly);
        assert_eq!(outcome.entities[1].provenance, Provenance::Both);
    }

    #[test]
    fn test_duplicate_relationships_collapse() {
        let primary = extraction(
            vec![entity("func_1", "caller", EntityKind::Function, (1, 10))],
            vec![relationship("rel_1", "func_1", "helper", 4)],
        );
        let mut secondary_rel = relationship("rel_1", "func_1", "helper", 4);
        secondary_rel
            .metadata
            .insert("resolved_type".to_string(), "func()".to_string());
        let secondary = extraction(
            vec![entity("func_1", "caller", EntityKind::Function, (1, 10))],
            vec![secondary_rel],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.relationships.len(), 1);
        let rel = &outcome.relationships[0];
        assert_eq!(rel.provenance, Provenance::Both);
        assert_eq!(rel.confidence, CONFIDENCE_BOTH);
        // Metadata union survives the collapse.
        assert_eq!(
            rel.relationship.metadata.get("resolved_type").map(String::as_str),
            Some("func()")
        );
    }

    #[test]
    fn test_orphaned_secondary_relationship_retained() {
        let primary = extraction(
            vec![entity("func_1", "caller", EntityKind::Function, (1, 10))],
            vec![],
        );
        let secondary = extraction(
            vec![entity("func_1", "caller", EntityKind::Function, (1, 10))],
            vec![relationship("rel_1", "func_1", "vanished", 7)],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        assert_eq!(outcome.relationships.len(), 1);
        let rel = &outcome.relationships[0];
        assert_eq!(rel.provenance, Provenance::SecondaryOnly);
        assert_eq!(rel.confidence, CONFIDENCE_SINGLE);
        assert_eq!(
            rel.relationship.metadata.get("orphaned").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_reconcile_with_self_is_all_both() {
        let set = extraction(
            vec![
                entity("func_1", "run", EntityKind::Function, (10, 20)),
                entity("type_1", "Config", EntityKind::Type, (22, 30)),
            ],
            vec![relationship("rel_1", "func_1", "Config", 12)],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&set, Some(&set), &mut ids);

        assert_eq!(outcome.entities.len(), 2);
        for e in &outcome.entities {
            assert_eq!(e.provenance, Provenance::Both);
            assert_eq!(e.confidence, CONFIDENCE_BOTH);
        }
        assert_eq!(outcome.relationships.len(), 1);
        assert_eq!(outcome.relationships[0].provenance, Provenance::Both);
    }

    #[test]
    fn test_degraded_unit_is_primary_only() {
        let primary = extraction(
            vec![entity("func_1", "run", EntityKind::Function, (10, 20))],
            vec![relationship("rel_1", "func_1", "helper", 12)],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, None, &mut ids);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].provenance, Provenance::PrimaryOnly);
        assert_eq!(outcome.relationships.len(), 1);
        assert_eq!(outcome.relationships[0].provenance, Provenance::PrimaryOnly);
    }

    #[test]
    fn test_output_order_primary_first_then_secondary() {
        let primary = extraction(
            vec![
                entity("func_1", "alpha", EntityKind::Function, (1, 5)),
                entity("func_2", "beta", EntityKind::Function, (7, 11)),
            ],
            vec![],
        );
        let secondary = extraction(
            vec![
                entity("func_1", "gamma", EntityKind::Function, (13, 17)),
                entity("func_2", "beta", EntityKind::Function, (7, 11)),
            ],
            vec![],
        );

        let mut ids = IdAllocator::new();
        let outcome = EntityReconciler::new().reconcile(&primary, Some(&secondary), &mut ids);

        let names: Vec<_> = outcome
            .entities
            .iter()
            .map(|e| e.entity.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }
}
