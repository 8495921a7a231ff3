//! GraphStore port (C2), grounded on `dashflow_neo4j::graph_store::GraphStore`
//! (an async Cypher-session trait over `neo4rs::Graph`). The transaction
//! manager (C3) is the only caller; it is responsible for ordering and
//! retrying, so this trait only needs to execute one op at a time inside
//! a caller-managed transaction.

use async_trait::async_trait;
use ingest_domain::GraphOp;

use crate::errors::IngestError;

/// Read helpers spec §4.2 names for "testing and health": counting nodes by
/// label and finding nodes with no incident semantic edge. Not transactional
/// — callers use these for diagnostics and the "No orphans" property test
/// (spec §8), never to drive commit decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphReadStats {
    pub node_count: u64,
    pub orphan_count: u64,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Begins a transaction and returns a handle `apply`/`commit`/`rollback`
    /// act on. Concrete adapters map this onto a `neo4rs::Txn` or an
    /// in-memory equivalent for tests.
    async fn begin(&self) -> Result<Box<dyn GraphTransaction>, IngestError>;

    /// Count of committed nodes carrying `canonical_type` label.
    async fn count_by_label(&self, canonical_type: &str) -> Result<u64, IngestError>;

    /// Count of committed nodes with no incident semantic edge (spec §4.7's
    /// orphan policy should make this permanently zero for bridged batches).
    async fn orphan_count(&self) -> Result<u64, IngestError>;
}

#[async_trait]
pub trait GraphTransaction: Send {
    async fn apply(&mut self, op: &GraphOp) -> Result<(), IngestError>;
    async fn commit(self: Box<Self>) -> Result<(), IngestError>;
    async fn rollback(self: Box<Self>) -> Result<(), IngestError>;
}
