//! `Document` and its finite `DocumentState` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the formats `Validator` (C11) is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Image,
    Text,
    DocLike,
    Spreadsheet,
    Presentation,
    Av,
}

impl DocumentFormat {
    /// Per-format size cap in bytes, per §4.11 ("policy, not contract").
    pub fn size_cap_bytes(self) -> u64 {
        match self {
            DocumentFormat::Pdf => 100 * 1024 * 1024,
            DocumentFormat::Image => 20 * 1024 * 1024,
            DocumentFormat::Av => 500 * 1024 * 1024,
            DocumentFormat::Text | DocumentFormat::DocLike => 50 * 1024 * 1024,
            DocumentFormat::Spreadsheet | DocumentFormat::Presentation => 50 * 1024 * 1024,
        }
    }
}

/// Finite state machine for a document, spec §3.
///
/// Happy path: `New -> Validated -> IndexUploaded -> Extracted -> Staged ->
/// Committed`. Any state may transition to `RetryScheduled` or
/// `DeadLettered`; `Committed`, `DeadLettered`, and `Cancelled` are terminal.
/// `Cancelled` is distinct from `DeadLettered` (§5: operator-initiated vs
/// failure-induced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentState {
    New,
    Validated,
    IndexUploaded,
    Extracted,
    Staged,
    Committed,
    RetryScheduled,
    DeadLettered,
    Cancelled,
}

impl DocumentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentState::Committed | DocumentState::DeadLettered | DocumentState::Cancelled
        )
    }

    /// The happy-path state this one resumes into after a retry, per §4.8's
    /// resume rules ("each step is designed to be safely retried from its
    /// start state").
    pub fn resume_target(self) -> Option<DocumentState> {
        match self {
            DocumentState::New => Some(DocumentState::New),
            DocumentState::Validated => Some(DocumentState::Validated),
            DocumentState::IndexUploaded => Some(DocumentState::IndexUploaded),
            DocumentState::Extracted => Some(DocumentState::Extracted),
            DocumentState::Staged => Some(DocumentState::Staged),
            _ => None,
        }
    }
}

/// `Document` record (spec §3).
///
/// Invariant: `content_hash` uniquely identifies a logical document; a
/// second `accept()` of the same hash does not create a second `process_id`
/// unless the first is `DeadLettered` and is being explicitly retried (see
/// SPEC_FULL.md Open Question 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub process_id: Uuid,
    pub source_name: String,
    pub content_hash: String,
    pub size: u64,
    pub detected_format: Option<DocumentFormat>,
    pub retrieval_doc_id: Option<String>,
    pub state: DocumentState,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Document {
    pub fn new(process_id: Uuid, source_name: String, content_hash: String, size: u64) -> Self {
        let now = Utc::now();
        Self {
            process_id,
            source_name,
            content_hash,
            size,
            detected_format: None,
            retrieval_doc_id: None,
            state: DocumentState::New,
            attempts: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }
}
