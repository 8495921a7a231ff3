//! `DLQEntry` and its classification (spec §3, §4.4, §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which adapter call produced the failure that landed in the DLQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Extract,
    Upload,
    Commit,
}

/// Error taxonomy from spec §7. `Cancelled` never reaches the DLQ (it is
/// recorded as a terminal state directly); every other kind, including
/// `Validation`, files a DLQ entry and this decides its retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    BreakerOpen,
    Timeout,
    Backend5xx,
    Validation,
    ExtractionSchema,
    GraphLogic,
    Unknown,
}

impl FailureKind {
    /// Retry policy table from spec §4.4.
    pub fn retryable(self) -> bool {
        !matches!(
            self,
            FailureKind::Validation | FailureKind::ExtractionSchema | FailureKind::GraphLogic
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub id: Uuid,
    pub operation_kind: OperationKind,
    pub process_id: Uuid,
    /// Opaque but re-playable payload (e.g. the serialized step input).
    pub payload: serde_json::Value,
    pub failure_kind: FailureKind,
    pub attempt_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub last_error: String,
    /// Set once a permanent outcome is reached; the entry is retained for
    /// operator visibility (`list`) rather than deleted, except on success.
    pub terminal: bool,
}

impl DlqEntry {
    pub fn new(
        process_id: Uuid,
        operation_kind: OperationKind,
        payload: serde_json::Value,
        failure_kind: FailureKind,
        last_error: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            operation_kind,
            process_id,
            payload,
            failure_kind,
            attempt_count: 0,
            next_attempt_at: now,
            first_seen_at: now,
            last_error,
            terminal: !failure_kind.retryable(),
        }
    }
}
