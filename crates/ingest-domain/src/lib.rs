//! ingest-domain: neutral data model for the document ingestion pipeline.
//!
//! Mirrors the role `chem-domain` plays for the chemistry engine: plain,
//! serializable record types with no I/O and no orchestration logic. Every
//! type here is a value type from spec §3 — `Document`, the canonical
//! entity/relationship shapes the bridge produces, the staged batch of graph
//! operations, the DLQ entry shape, and the circuit breaker's observable
//! state.

pub mod breaker_state;
pub mod dlq;
pub mod document;
pub mod entity;
pub mod error;
pub mod graph_ops;

pub use breaker_state::{BreakerFailureKind, BreakerPhase, BreakerSnapshot};
pub use dlq::{DlqEntry, FailureKind, OperationKind};
pub use document::{Document, DocumentFormat, DocumentState};
pub use entity::{
    CanonicalEntity, CanonicalRelationship, CanonicalType, Provenance, RawEntity,
    RawRelationship, SemanticType,
};
pub use error::DomainError;
pub use graph_ops::{GraphOp, StagedBatch};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn document_state_resume_targets_happy_path_states() {
        assert_eq!(DocumentState::Extracted.resume_target(), Some(DocumentState::Extracted));
        assert_eq!(DocumentState::Committed.resume_target(), None);
        assert!(DocumentState::Committed.is_terminal());
        assert!(DocumentState::DeadLettered.is_terminal());
        assert!(DocumentState::Cancelled.is_terminal());
        assert!(!DocumentState::Staged.is_terminal());
    }

    #[test]
    fn canonical_relationship_key_matches_dedup_tuple() {
        let rel = CanonicalRelationship {
            source_id: "a".into(),
            target_id: "b".into(),
            semantic_type: SemanticType::Uses,
            document_refs: BTreeSet::new(),
        };
        assert_eq!(rel.key(), ("a".to_string(), SemanticType::Uses, "b".to_string()));
    }

    #[test]
    fn failure_kind_retry_policy_matches_table() {
        assert!(FailureKind::BreakerOpen.retryable());
        assert!(FailureKind::Timeout.retryable());
        assert!(FailureKind::Backend5xx.retryable());
        assert!(!FailureKind::Validation.retryable());
        assert!(!FailureKind::ExtractionSchema.retryable());
        assert!(FailureKind::Unknown.retryable());
    }

    #[test]
    fn dlq_entry_new_marks_non_retryable_kinds_terminal() {
        let entry = DlqEntry::new(
            uuid::Uuid::new_v4(),
            OperationKind::Extract,
            serde_json::json!({}),
            FailureKind::ExtractionSchema,
            "missing entities array".into(),
        );
        assert!(entry.terminal);

        let entry = DlqEntry::new(
            uuid::Uuid::new_v4(),
            OperationKind::Upload,
            serde_json::json!({}),
            FailureKind::Backend5xx,
            "503".into(),
        );
        assert!(!entry.terminal);
    }

    #[test]
    fn staged_batch_orders_nodes_before_edges_deterministically() {
        let mut batch = StagedBatch::new(
            1,
            vec![
                GraphOp::MergeEdge {
                    source_id: "b".into(),
                    target_id: "a".into(),
                    semantic_type: SemanticType::RelatedTo,
                    properties: serde_json::json!({}),
                },
                GraphOp::MergeNode {
                    canonical_type: CanonicalType::Equipment,
                    id: "z".into(),
                    properties: serde_json::json!({}),
                },
                GraphOp::MergeNode {
                    canonical_type: CanonicalType::Equipment,
                    id: "a".into(),
                    properties: serde_json::json!({}),
                },
            ],
        );
        batch.canonicalize_order();
        assert!(matches!(batch.ops[0], GraphOp::MergeNode { ref id, .. } if id == "a"));
        assert!(matches!(batch.ops[1], GraphOp::MergeNode { ref id, .. } if id == "z"));
        assert!(matches!(batch.ops[2], GraphOp::MergeEdge { .. }));
        assert_eq!(batch.node_count(), 2);
        assert_eq!(batch.edge_count(), 1);
    }

    #[test]
    fn canonical_entity_holds_unioned_attributes() {
        let mut attrs = BTreeMap::new();
        attrs.insert("power".to_string(), "208v".to_string());
        let entity = CanonicalEntity {
            id: "hash".into(),
            canonical_type: CanonicalType::Equipment,
            normalized_name: "ice cream machine".into(),
            aliases: BTreeSet::from(["soft-serve machine".to_string()]),
            attributes: attrs,
            document_refs: BTreeSet::from(["R1".to_string()]),
        };
        assert!(entity.aliases.contains("soft-serve machine"));
    }
}
