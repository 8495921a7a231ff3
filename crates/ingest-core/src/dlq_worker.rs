//! Background DLQ worker (spec §4.4, §4.8): polls `DeadLetterQueue::due()`
//! on a fixed tick and resumes each entry through the orchestrator, mirroring
//! `original_source/reliability_infrastructure.py`'s retry-sweep loop but
//! driven by `tokio::time::interval` instead of a cron-style scheduler.
//!
//! Every due entry is resumed as its own spawned task so one slow extractor
//! retry never holds up another document's retry; concurrency is still
//! bounded by the orchestrator's own worker semaphore.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::dlq::DeadLetterQueue;
use crate::errors::IngestError;
use crate::event::EventStore;
use crate::orchestrator::PipelineOrchestrator;
use crate::ports::{Bridge, Extractor, GraphStore, RetrievalIndex, Validator};

pub struct DlqWorker<EV, V, R, E, B, G> {
    orchestrator: Arc<PipelineOrchestrator<EV, V, R, E, B, G>>,
    dlq: Arc<dyn DeadLetterQueue>,
    poll_interval: Duration,
}

impl<EV, V, R, E, B, G> DlqWorker<EV, V, R, E, B, G>
where
    EV: EventStore + 'static,
    V: Validator + 'static,
    R: RetrievalIndex + 'static,
    E: Extractor + 'static,
    B: Bridge + 'static,
    G: GraphStore + 'static,
{
    pub fn new(
        orchestrator: Arc<PipelineOrchestrator<EV, V, R, E, B, G>>,
        dlq: Arc<dyn DeadLetterQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self { orchestrator, dlq, poll_interval }
    }

    /// Runs the poll loop until the returned `JoinHandle` is aborted or the
    /// process exits; intended to be spawned once alongside the HTTP server.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// One polling pass: resumes every currently-due entry concurrently.
    async fn sweep(&self) {
        let due = self.dlq.due();
        if due.is_empty() {
            return;
        }
        debug!("dlq sweep: {} entr{} due", due.len(), if due.len() == 1 { "y" } else { "ies" });
        let mut handles = Vec::with_capacity(due.len());
        for entry in due {
            let orchestrator = Arc::clone(&self.orchestrator);
            handles.push(tokio::spawn(async move {
                let result: Result<(), IngestError> =
                    orchestrator.resume_from_dlq(entry.id, entry.process_id, &entry.payload).await;
                if let Err(e) = result {
                    warn!("dlq resume for {} (process {}) did not complete: {e}", entry.id, entry.process_id);
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::dlq::InMemoryDeadLetterQueue;
    use crate::event::{DocumentEventKind, InMemoryEventStore};
    use crate::orchestrator::Breakers;
    use crate::ports::{ExtractionCache, ExtractionResult, GraphTransaction, ProgressEvent, ProgressHub, ValidationOutcome};
    use crate::registry::InMemoryProcessRegistry;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use ingest_domain::{DocumentFormat, GraphOp, RawEntity, RawRelationship, StagedBatch};
    use uuid::Uuid;

    struct AlwaysOkValidator;
    #[async_trait]
    impl Validator for AlwaysOkValidator {
        async fn validate(&self, _source_name: &str, _bytes: &[u8], _size: u64) -> Result<ValidationOutcome, IngestError> {
            Ok(ValidationOutcome { format: DocumentFormat::Text })
        }
    }

    struct AlwaysOkIndex;
    #[async_trait]
    impl RetrievalIndex for AlwaysOkIndex {
        async fn upload(&self, _content_hash: &str, _source_name: &str, _bytes: &[u8]) -> Result<String, IngestError> {
            Ok("doc-1".into())
        }
    }

    struct AlwaysOkExtractor;
    #[async_trait]
    impl Extractor for AlwaysOkExtractor {
        async fn extract(&self, _retrieval_doc_id: &str) -> Result<ExtractionResult, IngestError> {
            Ok(ExtractionResult { entities: Vec::<RawEntity>::new(), relationships: Vec::<RawRelationship>::new() })
        }
    }

    struct NoopCache;
    #[async_trait]
    impl ExtractionCache for NoopCache {
        async fn get(&self, _content_hash: &str) -> Result<Option<ExtractionResult>, IngestError> {
            Ok(None)
        }
        async fn put(&self, _content_hash: &str, _entities: &[RawEntity], _relationships: &[RawRelationship]) -> Result<(), IngestError> {
            Ok(())
        }
    }

    struct EmptyBridge;
    impl Bridge for EmptyBridge {
        fn canonicalize(
            &self,
            _document_id: &str,
            _entities: &[RawEntity],
            _relationships: &[RawRelationship],
            batch_id: u64,
        ) -> Result<StagedBatch, IngestError> {
            Ok(StagedBatch::new(batch_id, Vec::new()))
        }
    }

    struct NoopGraphTxn;
    #[async_trait]
    impl GraphTransaction for NoopGraphTxn {
        async fn apply(&mut self, _op: &GraphOp) -> Result<(), IngestError> {
            Ok(())
        }
        async fn commit(self: Box<Self>) -> Result<(), IngestError> {
            Ok(())
        }
        async fn rollback(self: Box<Self>) -> Result<(), IngestError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NoopGraphStore;
    #[async_trait]
    impl GraphStore for NoopGraphStore {
        async fn begin(&self) -> Result<Box<dyn GraphTransaction>, IngestError> {
            Ok(Box::new(NoopGraphTxn))
        }
        async fn count_by_label(&self, _canonical_type: &str) -> Result<u64, IngestError> {
            Ok(0)
        }
        async fn orphan_count(&self) -> Result<u64, IngestError> {
            Ok(0)
        }
    }

    struct NoopProgress;
    impl ProgressHub for NoopProgress {
        fn publish(&self, _event: ProgressEvent) {}
        fn snapshot(&self, _process_id: Uuid) -> Option<ProgressEvent> {
            None
        }
        fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
            tokio::sync::broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn sweep_resumes_a_due_entry_and_clears_it_on_success() {
        let registry = Arc::new(InMemoryProcessRegistry::new(Arc::new(InMemoryEventStore::new())));
        let dlq: Arc<dyn DeadLetterQueue> = Arc::new(InMemoryDeadLetterQueue::new(Duration::from_millis(1), 4, 0.0, 8));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            IngestConfig::default(),
            Arc::clone(&registry),
            Arc::new(AlwaysOkValidator),
            Arc::new(AlwaysOkIndex),
            Arc::new(AlwaysOkExtractor),
            Arc::new(NoopCache),
            Arc::new(EmptyBridge),
            NoopGraphStore,
            Arc::clone(&dlq),
            Arc::new(NoopProgress),
            Arc::new(Breakers::new(&IngestConfig::default())),
        ));

        let process_id = Uuid::new_v4();
        registry.record(
            process_id,
            DocumentEventKind::Accepted { source_name: "a.txt".into(), content_hash: "h1".into(), size: 3 },
        );
        let entry = dlq.push(
            process_id,
            ingest_domain::OperationKind::Extract,
            serde_json::json!({"source_name": "a.txt", "bytes_base64": BASE64.encode(b"abc")}),
            ingest_domain::FailureKind::Backend5xx,
            "503".into(),
        );

        let worker = DlqWorker::new(orchestrator, Arc::clone(&dlq), Duration::from_millis(5));
        worker.sweep().await;

        assert!(dlq.get(entry.id).is_none(), "a successful resume removes the dlq entry");
    }
}
