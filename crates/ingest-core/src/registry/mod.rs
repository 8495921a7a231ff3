//! ProcessRegistry (C10): the durable record of every `process_id` and its
//! reconstructed `Document`, built by replaying the event log the same way
//! `chem_core::repo` reconstructs a `FlowInstance`.

mod replay;

pub use replay::replay;

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use ingest_domain::{Document, DocumentState};

use crate::errors::IngestError;
use crate::event::{DocumentEvent, DocumentEventKind, EventStore};

/// Operator/API-facing contract (spec §5): list, inspect, and act on
/// in-flight and terminal documents.
pub trait ProcessRegistry: Send + Sync {
    fn get(&self, process_id: Uuid) -> Option<Document>;
    fn list(&self, state_filter: Option<DocumentState>) -> Vec<Document>;
    /// Removes a terminal document's record entirely (operator-initiated
    /// purge), grounded in `original_source/purge_documents.py`.
    fn purge(&self, process_id: Uuid) -> Result<(), IngestError>;
    /// Idempotent-accept lookup (spec §6): the `process_id` of the most
    /// recent document accepted under `content_hash`, if any.
    fn find_by_content_hash(&self, content_hash: &str) -> Option<Document>;
}

/// In-memory `ProcessRegistry` over a shared `EventStore`; the canonical
/// state for any `process_id` is always `replay(store.list(process_id))`,
/// never mutated directly, mirroring the teacher's "state is a projection of
/// the event log, not a separate mutable record" discipline.
pub struct InMemoryProcessRegistry<S: EventStore> {
    store: std::sync::Arc<S>,
    known: Mutex<HashMap<Uuid, ()>>,
    /// `content_hash -> process_id` index backing `find_by_content_hash`,
    /// maintained alongside `known` on every `Accepted` event.
    by_content_hash: Mutex<HashMap<String, Uuid>>,
}

impl<S: EventStore> InMemoryProcessRegistry<S> {
    /// Rehydrates the known-id and content-hash indexes from `store` so a
    /// restarted process recovers every previously-accepted document, not
    /// just ones seen since this call (spec §8 "Resume correctness").
    pub fn new(store: std::sync::Arc<S>) -> Self {
        let ids = store.all_process_ids();
        let known: HashMap<Uuid, ()> = ids.iter().map(|id| (*id, ())).collect();
        let mut by_content_hash = HashMap::new();
        for id in &ids {
            if let Some(doc) = replay(&store.list(*id)) {
                by_content_hash.insert(doc.content_hash, *id);
            }
        }
        Self { store, known: Mutex::new(known), by_content_hash: Mutex::new(by_content_hash) }
    }

    /// Appends an event and tracks the `process_id` for `list()`.
    pub fn record(&self, process_id: Uuid, kind: DocumentEventKind) -> DocumentEvent {
        self.known.lock().unwrap().insert(process_id, ());
        if let DocumentEventKind::Accepted { ref content_hash, .. } = kind {
            self.by_content_hash.lock().unwrap().insert(content_hash.clone(), process_id);
        }
        self.store.append_kind(process_id, kind)
    }
}

impl<S: EventStore> ProcessRegistry for InMemoryProcessRegistry<S> {
    fn get(&self, process_id: Uuid) -> Option<Document> {
        replay(&self.store.list(process_id))
    }

    fn list(&self, state_filter: Option<DocumentState>) -> Vec<Document> {
        let ids: Vec<Uuid> = self.known.lock().unwrap().keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .filter(|d| state_filter.map(|f| d.state == f).unwrap_or(true))
            .collect()
    }

    fn purge(&self, process_id: Uuid) -> Result<(), IngestError> {
        let doc = self.get(process_id).ok_or_else(|| {
            IngestError::Validation(format!("unknown process_id {process_id}"))
        })?;
        if !doc.state.is_terminal() {
            return Err(IngestError::Validation(format!(
                "process_id {process_id} is not terminal (state={:?}); cancel before purging",
                doc.state
            )));
        }
        self.known.lock().unwrap().remove(&process_id);
        Ok(())
    }

    fn find_by_content_hash(&self, content_hash: &str) -> Option<Document> {
        let process_id = *self.by_content_hash.lock().unwrap().get(content_hash)?;
        self.get(process_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InMemoryEventStore;
    use std::sync::Arc;

    #[test]
    fn list_reflects_recorded_processes_and_filters_by_state() {
        let store = Arc::new(InMemoryEventStore::new());
        let registry = InMemoryProcessRegistry::new(store);
        let pid = Uuid::new_v4();
        registry.record(pid, DocumentEventKind::Accepted {
            source_name: "a.pdf".into(),
            content_hash: "h".into(),
            size: 1,
        });
        registry.record(pid, DocumentEventKind::Cancelled { reason: "operator".into() });

        let all = registry.list(None);
        assert_eq!(all.len(), 1);
        assert_eq!(registry.list(Some(DocumentState::Cancelled)).len(), 1);
        assert_eq!(registry.list(Some(DocumentState::Committed)).len(), 0);
    }

    #[test]
    fn find_by_content_hash_locates_the_process_id() {
        let store = Arc::new(InMemoryEventStore::new());
        let registry = InMemoryProcessRegistry::new(store);
        let pid = Uuid::new_v4();
        registry.record(pid, DocumentEventKind::Accepted {
            source_name: "a.pdf".into(),
            content_hash: "dedup-me".into(),
            size: 1,
        });
        let found = registry.find_by_content_hash("dedup-me").unwrap();
        assert_eq!(found.process_id, pid);
        assert!(registry.find_by_content_hash("nope").is_none());
    }

    #[test]
    fn purge_refuses_non_terminal_documents() {
        let store = Arc::new(InMemoryEventStore::new());
        let registry = InMemoryProcessRegistry::new(store);
        let pid = Uuid::new_v4();
        registry.record(pid, DocumentEventKind::Accepted {
            source_name: "a.pdf".into(),
            content_hash: "h".into(),
            size: 1,
        });
        assert!(registry.purge(pid).is_err());

        registry.record(pid, DocumentEventKind::Cancelled { reason: "x".into() });
        assert!(registry.purge(pid).is_ok());
        assert!(registry.get(pid).is_some(), "purge removes from the known-id index, not the log");
    }
}
