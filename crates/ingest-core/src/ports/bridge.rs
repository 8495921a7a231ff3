//! Bridge port (C7): pure normalization from raw extraction output to a
//! deterministically ordered `StagedBatch` of graph operations.

use ingest_domain::{RawEntity, RawRelationship, StagedBatch};

use crate::errors::IngestError;

pub trait Bridge: Send + Sync {
    /// Must be pure and deterministic: same inputs, same `StagedBatch`
    /// (spec §8, "Bridge determinism"). No I/O, no clock reads that affect
    /// output, no randomness.
    fn canonicalize(
        &self,
        document_id: &str,
        entities: &[RawEntity],
        relationships: &[RawRelationship],
        batch_id: u64,
    ) -> Result<StagedBatch, IngestError>;
}
