//! Extractor port (C5): calls the LLM/structured extraction backend and
//! returns raw entities/relationships for the bridge (C7) to canonicalize.

use async_trait::async_trait;
use ingest_domain::{RawEntity, RawRelationship};

use crate::errors::IngestError;

#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub entities: Vec<RawEntity>,
    pub relationships: Vec<RawRelationship>,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// `retrieval_doc_id` lets the adapter fetch the uploaded document from
    /// the retrieval backend rather than re-sending raw bytes. A response
    /// that fails schema validation becomes `IngestError::ExtractionSchema`
    /// (permanent, spec §7), never a retryable kind.
    async fn extract(&self, retrieval_doc_id: &str) -> Result<ExtractionResult, IngestError>;
}
