//! GraphStore adapter (C2): Neo4j via `neo4rs`, grounded on
//! `dashflow_neo4j::graph_store::GraphStore`/`Neo4jGraph`'s Cypher-session
//! shape. Each `GraphOp` is translated into a parameterized `MERGE` and
//! executed inside one `neo4rs::Txn` per `StagedBatch`, so a failure partway
//! through rolls the whole batch back.

use async_trait::async_trait;
use ingest_core::errors::IngestError;
use ingest_core::ports::{GraphStore, GraphTransaction};
use ingest_domain::{FailureKind, GraphOp};
use neo4rs::{Graph, Query, Row};

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, IngestError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| IngestError::Transient { kind: FailureKind::Backend5xx, message: format!("neo4j connect: {e}") })?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTransaction>, IngestError> {
        let txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| IngestError::Transient { kind: FailureKind::Backend5xx, message: format!("neo4j begin: {e}") })?;
        Ok(Box::new(Neo4jTransaction { txn }))
    }

    async fn count_by_label(&self, canonical_type: &str) -> Result<u64, IngestError> {
        let query = Query::new(format!("MATCH (n:{canonical_type}) RETURN count(n) AS c"));
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| classify_neo4j_error(&e))?;
        match stream.next().await.map_err(|e| classify_neo4j_error(&e))? {
            Some(row) => row_count(&row),
            None => Ok(0),
        }
    }

    async fn orphan_count(&self) -> Result<u64, IngestError> {
        let query = Query::new("MATCH (n) WHERE NOT (n)--() RETURN count(n) AS c".to_string());
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| classify_neo4j_error(&e))?;
        match stream.next().await.map_err(|e| classify_neo4j_error(&e))? {
            Some(row) => row_count(&row),
            None => Ok(0),
        }
    }
}

fn row_count(row: &Row) -> Result<u64, IngestError> {
    row.get::<i64>("c")
        .map(|n| n.max(0) as u64)
        .map_err(|e| IngestError::Unknown(format!("decoding count: {e}")))
}

struct Neo4jTransaction {
    txn: neo4rs::Txn,
}

/// `properties` travels as a canonical JSON string param; `apoc.convert`
/// turns it back into a map on the Neo4j side. `neo4rs::BoltType` has no
/// direct conversion from `serde_json::Value`, so the JSON-string-plus-APOC
/// route avoids hand-mapping every JSON shape to a `BoltType` variant.
///
/// `document_refs` is pulled out of `properties` and unioned rather than
/// overwritten (spec §4.2: "All writes carry `document_refs` that are
/// *unioned* on merge, not overwritten"); every other property is a plain
/// `SET +=` since the bridge already computed their merged values.
fn query_for(op: &GraphOp) -> Query {
    match op {
        GraphOp::MergeNode { canonical_type, id, properties } => {
            let (doc_refs, rest) = split_document_refs(properties);
            Query::new(format!(
                "MERGE (n:{} {{id: $id}}) \
                 SET n += apoc.convert.fromJsonMap($props) \
                 SET n.document_refs = apoc.coll.toSet(coalesce(n.document_refs, []) + $doc_refs)",
                canonical_type.as_str()
            ))
            .param("id", id.clone())
            .param("props", rest.to_string())
            .param("doc_refs", doc_refs)
        }
        GraphOp::MergeEdge { source_id, target_id, semantic_type, properties } => {
            let (doc_refs, rest) = split_document_refs(properties);
            Query::new(format!(
                "MATCH (a {{id: $source_id}}), (b {{id: $target_id}}) \
                 MERGE (a)-[r:{}]->(b) \
                 SET r += apoc.convert.fromJsonMap($props) \
                 SET r.document_refs = apoc.coll.toSet(coalesce(r.document_refs, []) + $doc_refs)",
                semantic_type.as_str()
            ))
            .param("source_id", source_id.clone())
            .param("target_id", target_id.clone())
            .param("props", rest.to_string())
            .param("doc_refs", doc_refs)
        }
    }
}

/// Splits the `document_refs` array out of a properties object, returning
/// `(document_refs, remaining_properties)`. Absent/malformed `document_refs`
/// degrades to an empty union rather than failing the whole op — a missing
/// provenance list should never block a write the bridge already validated.
fn split_document_refs(properties: &serde_json::Value) -> (Vec<String>, serde_json::Value) {
    let mut rest = properties.clone();
    let doc_refs = rest
        .as_object_mut()
        .and_then(|obj| obj.remove("document_refs"))
        .and_then(|v| v.as_array().cloned())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    (doc_refs, rest)
}

#[async_trait]
impl GraphTransaction for Neo4jTransaction {
    async fn apply(&mut self, op: &GraphOp) -> Result<(), IngestError> {
        self.txn
            .run(query_for(op))
            .await
            .map_err(|e| classify_neo4j_error(&e))
    }

    async fn commit(self: Box<Self>) -> Result<(), IngestError> {
        self.txn
            .commit()
            .await
            .map_err(|e| classify_neo4j_error(&e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), IngestError> {
        self.txn
            .rollback()
            .await
            .map_err(|e| classify_neo4j_error(&e))
    }
}

fn classify_neo4j_error(e: &neo4rs::Error) -> IngestError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("deadlock") || lower.contains("could not serialize") {
        IngestError::Transient { kind: FailureKind::Backend5xx, message }
    } else if lower.contains("timeout") {
        IngestError::Transient { kind: FailureKind::Timeout, message }
    } else {
        IngestError::GraphLogic(message)
    }
}

/// In-memory `GraphStore` test double: records applied ops, never commits
/// anything durable. Used by `ingest-cli`'s demo and by `ingest-core`'s own
/// transaction manager tests for anything heavier than a hand-rolled mock.
///
/// Holds its applied-ops list behind an `Arc` so a transaction can own a
/// clone of the handle instead of borrowing the store, keeping `begin()`'s
/// returned `Box<dyn GraphTransaction>` free of any lifetime tied to `&self`.
#[derive(Clone)]
pub struct InMemoryGraphStore {
    applied: std::sync::Arc<std::sync::Mutex<Vec<GraphOp>>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self { applied: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())) }
    }

    pub fn applied_ops(&self) -> Vec<GraphOp> {
        self.applied.lock().unwrap().clone()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemoryTransaction {
    applied: std::sync::Arc<std::sync::Mutex<Vec<GraphOp>>>,
    pending: Vec<GraphOp>,
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTransaction>, IngestError> {
        Ok(Box::new(InMemoryTransaction { applied: self.applied.clone(), pending: Vec::new() }))
    }

    async fn count_by_label(&self, canonical_type: &str) -> Result<u64, IngestError> {
        let ops = self.applied.lock().unwrap();
        Ok(ops
            .iter()
            .filter(|op| matches!(op, GraphOp::MergeNode { canonical_type: ct, .. } if ct.as_str() == canonical_type))
            .count() as u64)
    }

    async fn orphan_count(&self) -> Result<u64, IngestError> {
        let ops = self.applied.lock().unwrap();
        let mut node_ids = std::collections::BTreeSet::new();
        let mut connected = std::collections::BTreeSet::new();
        for op in ops.iter() {
            match op {
                GraphOp::MergeNode { id, .. } => {
                    node_ids.insert(id.clone());
                }
                GraphOp::MergeEdge { source_id, target_id, .. } => {
                    connected.insert(source_id.clone());
                    connected.insert(target_id.clone());
                }
            }
        }
        Ok(node_ids.difference(&connected).count() as u64)
    }
}

#[async_trait]
impl GraphTransaction for InMemoryTransaction {
    async fn apply(&mut self, op: &GraphOp) -> Result<(), IngestError> {
        self.pending.push(op.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IngestError> {
        self.applied.lock().unwrap().extend(self.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), IngestError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain::CanonicalType;

    #[tokio::test]
    async fn in_memory_store_applies_and_commits_ops() {
        let store = InMemoryGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.apply(&GraphOp::MergeNode { canonical_type: CanonicalType::Equipment, id: "a".into(), properties: serde_json::json!({}) })
            .await
            .unwrap();
        txn.commit().await.unwrap();
        assert_eq!(store.applied_ops().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_pending_ops() {
        let store = InMemoryGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.apply(&GraphOp::MergeNode { canonical_type: CanonicalType::Equipment, id: "a".into(), properties: serde_json::json!({}) })
            .await
            .unwrap();
        txn.rollback().await.unwrap();
        assert_eq!(store.applied_ops().len(), 0);
    }
}
