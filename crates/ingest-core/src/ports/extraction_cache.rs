//! Extraction cache port (spec §4.5): "the adapter must record the raw
//! response payload keyed by `content_hash` so re-runs can be skipped when
//! the hash is unchanged and a prior successful response exists."
//!
//! Kept as its own port rather than folded into `Extractor` so the
//! orchestrator (C8), not the adapter, owns the skip-if-cached decision —
//! the same separation `ingest_persistence` draws between `EventStore`
//! (what happened) and the replay in `registry::replay` (what it means).

use async_trait::async_trait;
use ingest_domain::{RawEntity, RawRelationship};

use crate::errors::IngestError;
use crate::ports::ExtractionResult;

#[async_trait]
pub trait ExtractionCache: Send + Sync {
    async fn get(&self, content_hash: &str) -> Result<Option<ExtractionResult>, IngestError>;
    async fn put(
        &self,
        content_hash: &str,
        entities: &[RawEntity],
        relationships: &[RawRelationship],
    ) -> Result<(), IngestError>;
}
