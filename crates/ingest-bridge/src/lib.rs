//! ingest-bridge: the `Bridge` port (C7), the pure normalization pipeline
//! between raw extractor output and the graph's canonical shape.
//!
//! Every step here is a plain function over owned data — no adapters, no
//! clocks, no randomness — so that `canonicalize()` is the deterministic
//! function spec §8 calls "Bridge determinism": the same raw entities and
//! relationships always produce the same `StagedBatch`, byte for byte.

use std::collections::{BTreeMap, BTreeSet};

use ingest_core::errors::IngestError;
use ingest_core::hashing::entity_id;
use ingest_core::ports::Bridge;
use ingest_domain::{
    CanonicalEntity, CanonicalRelationship, CanonicalType, GraphOp, RawEntity, RawRelationship,
    SemanticType, StagedBatch,
};
use ingest_policies::{resolve_relationship_type, resolve_type, synonyms::normalize_name};
use log::warn;

/// Default for `bridge.other_fraction_warn` (spec §6): the `OTHER` fraction
/// above which a run is logged as a data-quality warning, not a failure.
pub const DEFAULT_OTHER_FRACTION_WARN: f64 = 0.15;

pub struct CanonicalBridge {
    other_fraction_warn: f64,
}

impl CanonicalBridge {
    pub fn new() -> Self {
        Self::with_other_fraction_warn(DEFAULT_OTHER_FRACTION_WARN)
    }

    /// Overrides the `OTHER`-fraction data-quality warning threshold (spec
    /// §6 `bridge.other_fraction_warn`, §4.7 step 2).
    pub fn with_other_fraction_warn(other_fraction_warn: f64) -> Self {
        Self { other_fraction_warn }
    }
}

impl Default for CanonicalBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge for CanonicalBridge {
    fn canonicalize(
        &self,
        document_id: &str,
        entities: &[RawEntity],
        relationships: &[RawRelationship],
        batch_id: u64,
    ) -> Result<StagedBatch, IngestError> {
        let entities_by_id = canonicalize_entities(entities);
        warn_on_other_fraction(document_id, &entities_by_id, self.other_fraction_warn);
        let id_by_normalized_name: BTreeMap<String, String> = entities_by_id
            .values()
            .map(|e| (e.normalized_name.clone(), e.id.clone()))
            .collect();

        let relationships_by_key = canonicalize_relationships(relationships, &id_by_normalized_name);

        let related_entity_ids: BTreeSet<&String> = relationships_by_key
            .values()
            .flat_map(|r| [&r.source_id, &r.target_id])
            .collect();

        let mut ops = Vec::new();
        let mut document_node_id: Option<String> = None;

        for entity in entities_by_id.values() {
            ops.push(GraphOp::MergeNode {
                canonical_type: entity.canonical_type,
                id: entity.id.clone(),
                properties: entity_properties(entity),
            });
        }

        for rel in relationships_by_key.values() {
            ops.push(GraphOp::MergeEdge {
                source_id: rel.source_id.clone(),
                target_id: rel.target_id.clone(),
                semantic_type: rel.semantic_type,
                properties: relationship_properties(rel),
            });
        }

        // Orphan policy (spec §4.9): an entity with no relationship at all
        // is attached to a synthetic DOCUMENT node via RELATED_TO so it is
        // still reachable from the graph's document index.
        for entity in entities_by_id.values() {
            if related_entity_ids.contains(&entity.id) {
                continue;
            }
            let doc_id = document_node_id.get_or_insert_with(|| entity_id(CanonicalType::Document.as_str(), document_id));
            ops.push(GraphOp::MergeEdge {
                source_id: doc_id.clone(),
                target_id: entity.id.clone(),
                semantic_type: SemanticType::RelatedTo,
                properties: serde_json::json!({}),
            });
        }

        if let Some(doc_id) = &document_node_id {
            ops.push(GraphOp::MergeNode {
                canonical_type: CanonicalType::Document,
                id: doc_id.clone(),
                properties: serde_json::json!({ "document_id": document_id }),
            });
        }

        let mut batch = StagedBatch::new(batch_id, ops);
        batch.canonicalize_order();
        Ok(batch)
    }
}

fn entity_properties(entity: &CanonicalEntity) -> serde_json::Value {
    serde_json::json!({
        "normalized_name": entity.normalized_name,
        "aliases": entity.aliases,
        "attributes": entity.attributes,
        "document_refs": entity.document_refs,
    })
}

fn relationship_properties(rel: &CanonicalRelationship) -> serde_json::Value {
    serde_json::json!({ "document_refs": rel.document_refs })
}

/// Logs a data-quality warning (not a failure) when the `OTHER` fraction of
/// this run's canonicalized entities exceeds `threshold` (spec §4.7 step 2,
/// §6 `bridge.other_fraction_warn`). An empty entity set never warns.
fn warn_on_other_fraction(document_id: &str, entities_by_id: &BTreeMap<String, CanonicalEntity>, threshold: f64) {
    if entities_by_id.is_empty() {
        return;
    }
    let other_count = entities_by_id.values().filter(|e| e.canonical_type == CanonicalType::Other).count();
    let fraction = other_count as f64 / entities_by_id.len() as f64;
    if fraction > threshold {
        warn!(
            "document {document_id}: {other_count}/{} entities ({:.1}%) resolved to OTHER, above the {:.1}% data-quality threshold",
            entities_by_id.len(),
            fraction * 100.0,
            threshold * 100.0
        );
    }
}

/// Normalizes names, resolves types, hashes ids, and unions duplicate
/// entities (same `id`) into one `CanonicalEntity`.
fn canonicalize_entities(entities: &[RawEntity]) -> BTreeMap<String, CanonicalEntity> {
    let mut by_id: BTreeMap<String, CanonicalEntity> = BTreeMap::new();

    for raw in entities {
        let normalized_name = normalize_name(&raw.raw_name);
        let canonical_type = resolve_type(Some(raw.raw_type_hint.as_str()));
        let id = entity_id(canonical_type.as_str(), &normalized_name);

        let document_ref = raw.provenance.document_id.clone();
        let mut aliases = BTreeSet::new();
        let raw_normalized_raw_name = raw.raw_name.trim().to_lowercase();
        if raw_normalized_raw_name != normalized_name {
            aliases.insert(raw_normalized_raw_name);
        }

        by_id
            .entry(id.clone())
            .and_modify(|existing| {
                existing.aliases.extend(aliases.clone());
                existing.attributes.extend(raw.attributes.clone());
                existing.document_refs.insert(document_ref.clone());
            })
            .or_insert_with(|| CanonicalEntity {
                id,
                canonical_type,
                normalized_name: normalized_name.clone(),
                aliases,
                attributes: raw.attributes.clone(),
                document_refs: BTreeSet::from([document_ref]),
            });
    }

    by_id
}

/// Resolves relationship endpoints by normalized name, drops any
/// relationship whose endpoint did not match a known entity, removes
/// self-loops, resolves the semantic type, and dedups by `(source, type,
/// target)` unioning `document_refs` (spec §4.7/§4.9).
fn canonicalize_relationships(
    relationships: &[RawRelationship],
    id_by_normalized_name: &BTreeMap<String, String>,
) -> BTreeMap<(String, SemanticType, String), CanonicalRelationship> {
    let mut by_key: BTreeMap<(String, SemanticType, String), CanonicalRelationship> = BTreeMap::new();

    for raw in relationships {
        let source_name = normalize_name(&raw.source_raw_name);
        let target_name = normalize_name(&raw.target_raw_name);
        let (Some(source_id), Some(target_id)) = (
            id_by_normalized_name.get(&source_name),
            id_by_normalized_name.get(&target_name),
        ) else {
            continue;
        };
        if source_id == target_id {
            continue;
        }

        let semantic_type = resolve_relationship_type(Some(raw.raw_type_hint.as_str()));
        let document_ref = raw.provenance.document_id.clone();
        let key = (source_id.clone(), semantic_type, target_id.clone());

        by_key
            .entry(key)
            .and_modify(|existing| {
                existing.document_refs.insert(document_ref.clone());
            })
            .or_insert_with(|| CanonicalRelationship {
                source_id: source_id.clone(),
                target_id: target_id.clone(),
                semantic_type,
                document_refs: BTreeSet::from([document_ref]),
            });
    }

    by_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain::Provenance;

    fn raw_entity(name: &str, type_hint: &str, doc: &str) -> RawEntity {
        RawEntity {
            raw_name: name.into(),
            raw_type_hint: type_hint.into(),
            description: None,
            attributes: BTreeMap::new(),
            provenance: Provenance { document_id: doc.into(), page_or_region: None },
        }
    }

    fn raw_rel(source: &str, target: &str, type_hint: &str, doc: &str) -> RawRelationship {
        RawRelationship {
            source_raw_name: source.into(),
            target_raw_name: target.into(),
            raw_type_hint: type_hint.into(),
            description: None,
            provenance: Provenance { document_id: doc.into(), page_or_region: None },
        }
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let bridge = CanonicalBridge::new();
        let entities = vec![
            raw_entity("Ice Cream Machine", "equipment", "R1"),
            raw_entity("Soft-Serve Machine", "equipment", "R1"),
        ];
        let b1 = bridge.canonicalize("R1", &entities, &[], 1).unwrap();
        let b2 = bridge.canonicalize("R1", &entities, &[], 1).unwrap();
        let j1 = serde_json::to_string(&b1.ops).unwrap();
        let j2 = serde_json::to_string(&b2.ops).unwrap();
        assert_eq!(j1, j2);
    }

    #[test]
    fn synonym_entities_merge_into_one_node() {
        let bridge = CanonicalBridge::new();
        let entities = vec![
            raw_entity("Ice Cream Machine", "equipment", "R1"),
            raw_entity("soft serve machine", "equipment", "R1"),
        ];
        let batch = bridge.canonicalize("R1", &entities, &[], 1).unwrap();
        assert_eq!(batch.node_count(), 2); // merged entity + synthetic document node (orphan)
    }

    #[test]
    fn self_loop_relationships_are_dropped() {
        let bridge = CanonicalBridge::new();
        let entities = vec![raw_entity("Fryer", "equipment", "R1")];
        let rels = vec![raw_rel("Fryer", "Fryer", "requires", "R1")];
        let batch = bridge.canonicalize("R1", &entities, &rels, 1).unwrap();
        assert_eq!(batch.edge_count(), 1); // only the synthetic orphan edge, not the self-loop
    }

    #[test]
    fn orphan_entities_get_a_synthetic_document_edge() {
        let bridge = CanonicalBridge::new();
        let entities = vec![raw_entity("Fryer", "equipment", "R1")];
        let batch = bridge.canonicalize("R1", &entities, &[], 1).unwrap();
        assert_eq!(batch.node_count(), 2);
        assert_eq!(batch.edge_count(), 1);
        assert!(matches!(
            batch.ops.iter().find(|op| matches!(op, GraphOp::MergeEdge { .. })),
            Some(GraphOp::MergeEdge { semantic_type: SemanticType::RelatedTo, .. })
        ));
    }

    #[test]
    fn other_fraction_is_computed_from_unresolved_type_hints() {
        // A threshold of 0.0 makes any OTHER entity exceed it; this only
        // exercises that the helper runs without panicking over a mixed
        // batch — the warning itself is observed via logs, not the batch.
        let bridge = CanonicalBridge::with_other_fraction_warn(0.0);
        let entities = vec![
            raw_entity("Fryer", "equipment", "R1"),
            raw_entity("Mystery Thing", "something-unrecognized", "R1"),
        ];
        let batch = bridge.canonicalize("R1", &entities, &[], 1).unwrap();
        assert_eq!(batch.node_count(), 3); // two entities + synthetic document node
    }

    #[test]
    fn duplicate_relationships_dedup_and_union_document_refs() {
        let bridge = CanonicalBridge::new();
        let entities = vec![raw_entity("Fryer", "equipment", "R1"), raw_entity("Oil", "consumable", "R1")];
        let rels = vec![
            raw_rel("Fryer", "Oil", "uses", "R1"),
            raw_rel("Fryer", "Oil", "uses", "R2"),
        ];
        let batch = bridge.canonicalize("R1", &entities, &rels, 1).unwrap();
        let edge_count = batch.ops.iter().filter(|op| matches!(op, GraphOp::MergeEdge { .. })).count();
        assert_eq!(edge_count, 1);
    }
}
