//! Validator port (C11): format detection and size policy, spec §4.11.

use async_trait::async_trait;
use ingest_domain::DocumentFormat;

use crate::errors::IngestError;

pub struct ValidationOutcome {
    pub format: DocumentFormat,
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// Sniffs `bytes` (magic bytes, not the filename extension alone) and
    /// checks the result against `size` and `source_name`'s declared
    /// extension. Returns `IngestError::Validation` for anything that is
    /// not one of the formats the pipeline accepts, or that exceeds its
    /// format's size cap.
    async fn validate(
        &self,
        source_name: &str,
        bytes: &[u8],
        size: u64,
    ) -> Result<ValidationOutcome, IngestError>;
}
