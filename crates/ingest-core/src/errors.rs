//! Error taxonomy for the orchestrator and its adapters (spec §7).
//!
//! Adapters classify raw errors at their boundary (§4.1, §4.5, §4.6); the
//! orchestrator never sees an unclassified error — it only ever receives an
//! `IngestError`, whose `FailureKind` (re-exported from `ingest_domain`)
//! tells it whether to retry, dead-letter, or surface to the caller,
//! mirroring `chem-core::errors::CoreEngineError` as the core's single
//! error contract.

use ingest_domain::FailureKind;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum IngestError {
    /// Bad input; surfaced to caller; never retried (spec §7).
    #[error("validation error: {0}")]
    Validation(String),

    /// Timeout, Backend5xx, or BreakerOpen; DLQ-retry with backoff.
    #[error("transient failure ({kind:?}): {message}")]
    Transient { kind: FailureKind, message: String },

    /// Extractor returned malformed structure; DLQ-permanent.
    #[error("extraction schema error: {0}")]
    ExtractionSchema(String),

    /// Constraint violation that should not happen given bridge invariants;
    /// DLQ-permanent and alert.
    #[error("graph logic error: {0}")]
    GraphLogic(String),

    /// Operator/cancellation token fired; terminal, distinct from
    /// dead-lettered.
    #[error("cancelled")]
    Cancelled,

    /// Unclassified; bounded retries then permanent.
    #[error("unknown error: {0}")]
    Unknown(String),

    #[error("circuit breaker open for {target}")]
    BreakerOpen { target: String },

    #[error("internal: {0}")]
    Internal(String),
}

impl IngestError {
    /// Maps this error onto the DLQ `FailureKind` it should be filed under,
    /// or `None` if it never reaches the DLQ (`Cancelled` only — `Validation`
    /// is filed as a permanent, non-retryable entry per spec §4.4's table,
    /// so operators can still see and purge it through the DLQ surface).
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            IngestError::Validation(_) => Some(FailureKind::Validation),
            IngestError::Cancelled => None,
            IngestError::Transient { kind, .. } => Some(*kind),
            IngestError::ExtractionSchema(_) => Some(FailureKind::ExtractionSchema),
            IngestError::GraphLogic(_) => Some(FailureKind::GraphLogic),
            IngestError::Unknown(_) => Some(FailureKind::Unknown),
            IngestError::BreakerOpen { .. } => Some(FailureKind::BreakerOpen),
            IngestError::Internal(_) => Some(FailureKind::Unknown),
        }
    }

    pub fn retryable(&self) -> bool {
        self.failure_kind().map(|k| k.retryable()).unwrap_or(false)
    }
}
