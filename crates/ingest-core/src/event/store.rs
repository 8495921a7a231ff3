//! Append-only event store for document pipeline events.
//!
//! Mirrors `chem_core::event::store::{EventStore, InMemoryEventStore}`: the
//! in-memory implementation is the one used in tests and the demo CLI; the
//! durable backend (`ingest_persistence::PgEventStore`) implements the same
//! trait against Postgres.

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{DocumentEvent, DocumentEventKind};
use chrono::Utc;

pub trait EventStore: Send + Sync {
    fn append_kind(&self, process_id: Uuid, kind: DocumentEventKind) -> DocumentEvent;
    fn list(&self, process_id: Uuid) -> Vec<DocumentEvent>;
    /// Every `process_id` with at least one recorded event. Used once, at
    /// startup, to rehydrate `ProcessRegistry`'s known-id and content-hash
    /// indexes from durable storage (spec §8 "Resume correctness" — a
    /// restarted process must recover every in-flight document, not just
    /// ones `accept()`ed since the restart).
    fn all_process_ids(&self) -> Vec<Uuid>;
}

#[derive(Default)]
pub struct InMemoryEventStore {
    inner: Mutex<HashMap<Uuid, Vec<DocumentEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len_for(&self, process_id: Uuid) -> usize {
        self.inner.lock().unwrap().get(&process_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, process_id: Uuid, kind: DocumentEventKind) -> DocumentEvent {
        let mut guard = self.inner.lock().unwrap();
        let vec = guard.entry(process_id).or_default();
        let seq = vec.len() as u64;
        let ev = DocumentEvent { seq, process_id, kind, ts: Utc::now() };
        vec.push(ev.clone());
        ev
    }

    fn list(&self, process_id: Uuid) -> Vec<DocumentEvent> {
        self.inner.lock().unwrap().get(&process_id).cloned().unwrap_or_default()
    }

    fn all_process_ids(&self) -> Vec<Uuid> {
        self.inner.lock().unwrap().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_increasing_seq_per_process() {
        let store = InMemoryEventStore::new();
        let process_id = Uuid::new_v4();
        let e0 = store.append_kind(
            process_id,
            DocumentEventKind::Accepted {
                source_name: "a.pdf".into(),
                content_hash: "h".into(),
                size: 10,
            },
        );
        let e1 = store.append_kind(process_id, DocumentEventKind::Cancelled { reason: "x".into() });
        assert_eq!(e0.seq, 0);
        assert_eq!(e1.seq, 1);
        assert_eq!(store.len_for(process_id), 2);
    }

    #[test]
    fn events_are_isolated_per_process() {
        let store = InMemoryEventStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.append_kind(a, DocumentEventKind::Cancelled { reason: "x".into() });
        assert_eq!(store.list(b).len(), 0);
        assert_eq!(store.list(a).len(), 1);
    }
}
