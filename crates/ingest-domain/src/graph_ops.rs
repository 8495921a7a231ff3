//! Declarative graph operations and the staged batch that holds them
//! (spec §3, §4.2, §4.3).
//!
//! These are data, not query strings: `GraphStore` adapters (C2) translate
//! them into the underlying graph's native MERGE-equivalent operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{CanonicalType, SemanticType};

/// One declarative write against the graph backend.
///
/// `MergeNode`/`MergeEdge` are idempotent upserts keyed by `(canonical_type,
/// id)` and `(source_id, semantic_type, target_id)` respectively; replays of
/// the same op must be safe (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphOp {
    MergeNode {
        canonical_type: CanonicalType,
        id: String,
        properties: Value,
    },
    MergeEdge {
        source_id: String,
        target_id: String,
        semantic_type: SemanticType,
        properties: Value,
    },
}

impl GraphOp {
    /// Deterministic sort key used to establish the lock order required by
    /// §4.3 step 2: all `MergeNode`s sorted by `(canonical_type, id)`, then
    /// all `MergeEdge`s sorted by `(source_id, semantic_type, target_id)`.
    /// Node ops sort before edge ops irrespective of their own keys.
    fn order_key(&self) -> (u8, String, String, String) {
        match self {
            GraphOp::MergeNode { canonical_type, id, .. } => {
                (0, canonical_type.as_str().to_string(), id.clone(), String::new())
            }
            GraphOp::MergeEdge { source_id, target_id, semantic_type, .. } => (
                1,
                source_id.clone(),
                semantic_type.as_str().to_string(),
                target_id.clone(),
            ),
        }
    }
}

/// An ordered, append-only batch of graph operations awaiting atomic commit
/// (spec §3, §4.7 step 6). `batch_id` is monotone for observability only; it
/// plays no role in commit semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedBatch {
    pub batch_id: u64,
    pub ops: Vec<GraphOp>,
}

impl StagedBatch {
    pub fn new(batch_id: u64, ops: Vec<GraphOp>) -> Self {
        Self { batch_id, ops }
    }

    /// Re-sorts `ops` into the deterministic order §4.3 requires. Bridge
    /// output and `TransactionManager::commit` both call this so that the
    /// same logical batch always serializes to the same operation sequence
    /// (spec §8: "Bridge determinism").
    pub fn canonicalize_order(&mut self) {
        self.ops.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
    }

    pub fn node_count(&self) -> usize {
        self.ops.iter().filter(|o| matches!(o, GraphOp::MergeNode { .. })).count()
    }

    pub fn edge_count(&self) -> usize {
        self.ops.iter().filter(|o| matches!(o, GraphOp::MergeEdge { .. })).count()
    }
}
