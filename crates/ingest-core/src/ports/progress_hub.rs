//! ProgressHub port (C9): push subscription plus pull snapshot over a
//! document's progress, folding per-stage entity/relationship counts into
//! `counts` (SPEC_FULL.md supplemented feature, grounded on
//! `original_source/debug_orchestrator_level.py`).

use chrono::{DateTime, Utc};
use ingest_domain::DocumentState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub process_id: Uuid,
    pub state: DocumentState,
    pub counts: std::collections::BTreeMap<String, u64>,
    pub ts: DateTime<Utc>,
}

pub trait ProgressHub: Send + Sync {
    fn publish(&self, event: ProgressEvent);

    /// Latest known event for `process_id`, or `None` if nothing has been
    /// published yet.
    fn snapshot(&self, process_id: Uuid) -> Option<ProgressEvent>;

    /// A best-effort push subscription: slow subscribers may miss events
    /// (spec §4.9, "missed N events" marker) rather than back-pressure the
    /// orchestrator.
    fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent>;
}
