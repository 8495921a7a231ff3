//! RetrievalIndex port (C6): uploads validated bytes to the retrieval/search
//! backend and returns its external document id.

use async_trait::async_trait;

use crate::errors::IngestError;

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Idempotent by `content_hash`: a second upload of the same hash must
    /// return the same `retrieval_doc_id` without duplicating storage.
    async fn upload(
        &self,
        content_hash: &str,
        source_name: &str,
        bytes: &[u8],
    ) -> Result<String, IngestError>;
}
