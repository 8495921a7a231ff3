//! ingest-progress: the `ProgressHub` (C9) implementation — a push
//! subscription over `tokio::sync::broadcast` plus a `dashmap`-backed pull
//! snapshot of each process's latest event, mirroring how
//! `chem_persistence` keeps a durable log for pull-style queries while the
//! engine itself only ever appends.

use dashmap::DashMap;
use ingest_core::ports::{ProgressEvent, ProgressHub};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Bound on the broadcast channel; a subscriber slower than this many
/// events falls behind and starts missing them (spec §4.9's "best-effort,
/// drop with a missed-N-events marker" contract — `broadcast::Receiver`
/// surfaces the drop itself as a `Lagged(n)` error the caller can report).
const CHANNEL_CAPACITY: usize = 1024;

pub struct InMemoryProgressHub {
    latest: DashMap<Uuid, ProgressEvent>,
    sender: broadcast::Sender<ProgressEvent>,
}

impl InMemoryProgressHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { latest: DashMap::new(), sender }
    }
}

impl Default for InMemoryProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHub for InMemoryProgressHub {
    fn publish(&self, event: ProgressEvent) {
        self.latest.insert(event.process_id, event.clone());
        // No subscribers is a normal, non-error state (nobody is watching
        // this pipeline run right now); `send` only errors in that case.
        let _ = self.sender.send(event);
    }

    fn snapshot(&self, process_id: Uuid) -> Option<ProgressEvent> {
        self.latest.get(&process_id).map(|e| e.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain::DocumentState;

    fn event(process_id: Uuid, state: DocumentState) -> ProgressEvent {
        ProgressEvent { process_id, state, counts: Default::default(), ts: chrono::Utc::now() }
    }

    #[test]
    fn snapshot_returns_the_latest_published_event() {
        let hub = InMemoryProgressHub::new();
        let pid = Uuid::new_v4();
        hub.publish(event(pid, DocumentState::New));
        hub.publish(event(pid, DocumentState::Validated));
        assert_eq!(hub.snapshot(pid).unwrap().state, DocumentState::Validated);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = InMemoryProgressHub::new();
        let mut rx = hub.subscribe();
        let pid = Uuid::new_v4();
        hub.publish(event(pid, DocumentState::New));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.process_id, pid);
    }
}
