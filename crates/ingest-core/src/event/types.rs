//! Event types for the document pipeline's append-only log (spec §3, §4.8).
//!
//! Every state transition a `Document` makes is first an event here; the
//! `ProcessRegistry` (C10) replays these to reconstruct `DocumentState` the
//! same way `chem_core`'s `FlowRepository` replays `FlowEvent`s into
//! `StepSlot`s.

use chrono::{DateTime, Utc};
use ingest_domain::{DocumentFormat, FailureKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentEventKind {
    /// First event for a `process_id`. Invariant: must be the first event.
    Accepted {
        source_name: String,
        content_hash: String,
        size: u64,
    },
    Validated { format: DocumentFormat },
    IndexUploaded { retrieval_doc_id: String },
    Extracted { entity_count: usize, relationship_count: usize },
    Staged { node_count: usize, edge_count: usize },
    Committed,
    RetryScheduled { attempt: u32, failure_kind: FailureKind, reason: String },
    DeadLettered { failure_kind: FailureKind, reason: String },
    Cancelled { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvent {
    pub seq: u64,
    pub process_id: Uuid,
    pub kind: DocumentEventKind,
    pub ts: DateTime<Utc>,
}
