//! PipelineOrchestrator (C8): the document state machine. Drives
//! Validate (C11) -> Upload (C6) -> Extract (C5) -> Canonicalize (C7) ->
//! Commit (C3), every external call gated by its own `CircuitBreaker` (C1),
//! with the `DeadLetterQueue` (C4) as the sink for anything that fails.
//!
//! Generalizes `chem_core::engine::core::FlowEngine`'s "load events, replay,
//! run the next step, append the outcome" loop from a fixed list of typed
//! steps to this pipeline's five fixed stages, trading `TypedStep`'s pure
//! synchronous contract for async adapter calls since every stage here does
//! real I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use ingest_domain::{BreakerFailureKind, DocumentFormat, DocumentState, FailureKind, OperationKind};
use log::{error, info, warn};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::breaker::{Admission, CircuitBreaker};
use crate::config::IngestConfig;
use crate::dlq::{DeadLetterQueue, RetryOutcome};
use crate::errors::IngestError;
use crate::event::DocumentEventKind;
use crate::ports::{
    Bridge, ExtractionCache, Extractor, GraphStore, ProgressEvent, ProgressHub, RetrievalIndex, Validator,
};
use crate::registry::{InMemoryProcessRegistry, ProcessRegistry};
use crate::transaction::TransactionManager;

/// Breakers for each external target the orchestrator calls through,
/// independent per spec §4.1 ("each target trips independently").
pub struct Breakers {
    pub retrieval_index: CircuitBreaker,
    pub extractor: CircuitBreaker,
    pub graph_store: CircuitBreaker,
}

impl Breakers {
    pub fn new(cfg: &IngestConfig) -> Self {
        let mk = |name: &str| {
            CircuitBreaker::new(name, cfg.breaker_failure_threshold, cfg.breaker_failure_window, cfg.breaker_cooldown)
        };
        Self {
            retrieval_index: mk("retrieval_index"),
            extractor: mk("extractor"),
            graph_store: mk("graph_store"),
        }
    }
}

pub struct PipelineOrchestrator<EV, V, R, E, B, G> {
    config: IngestConfig,
    registry: Arc<InMemoryProcessRegistry<EV>>,
    validator: Arc<V>,
    retrieval_index: Arc<R>,
    extractor: Arc<E>,
    extraction_cache: Arc<dyn ExtractionCache>,
    bridge: Arc<B>,
    transaction_manager: Arc<TransactionManager<G>>,
    dlq: Arc<dyn DeadLetterQueue>,
    progress: Arc<dyn ProgressHub>,
    breakers: Arc<Breakers>,
    concurrency: Arc<Semaphore>,
    /// Cooperative cancellation flags keyed by `process_id` (spec §5). Checked
    /// at each stage boundary; a running adapter call itself is never
    /// interrupted mid-flight.
    cancellations: DashMap<Uuid, Arc<AtomicBool>>,
}

impl<EV, V, R, E, B, G> PipelineOrchestrator<EV, V, R, E, B, G>
where
    EV: crate::event::EventStore + 'static,
    V: Validator + 'static,
    R: RetrievalIndex + 'static,
    E: Extractor + 'static,
    B: Bridge + 'static,
    G: GraphStore + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: IngestConfig,
        registry: Arc<InMemoryProcessRegistry<EV>>,
        validator: Arc<V>,
        retrieval_index: Arc<R>,
        extractor: Arc<E>,
        extraction_cache: Arc<dyn ExtractionCache>,
        bridge: Arc<B>,
        graph_store: G,
        dlq: Arc<dyn DeadLetterQueue>,
        progress: Arc<dyn ProgressHub>,
        breakers: Arc<Breakers>,
    ) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.worker_concurrency));
        let transaction_manager = Arc::new(TransactionManager::with_backoff(
            graph_store,
            config.txn_backoff_base,
            config.txn_backoff_exponent_cap,
            config.txn_jitter_fraction,
        ));
        Self {
            transaction_manager,
            config,
            registry,
            validator,
            retrieval_index,
            extractor,
            extraction_cache,
            bridge,
            dlq,
            progress,
            breakers,
            concurrency,
            cancellations: DashMap::new(),
        }
    }

    /// Accept API (C10/§5): records `Accepted` and spawns the document
    /// through the pipeline on the bounded worker pool. Returns immediately
    /// with the `process_id`; callers poll `ProcessRegistry`/`ProgressHub`
    /// for status.
    ///
    /// Idempotent by `content_hash` (spec §3's Accept API) only when the
    /// existing document is non-terminal or `Committed`: a hash that last
    /// landed `DeadLettered` or `Cancelled` gets a fresh `process_id` instead
    /// of being silently resurrected, per SPEC_FULL.md's Open Question 2
    /// resolution — the caller is deliberately re-submitting after a known
    /// failure, which is what "explicit retry" means at the Accept API.
    pub async fn accept(self: &Arc<Self>, source_name: String, content_hash: String, bytes: Vec<u8>) -> Uuid {
        if let Some(existing) = self.registry.find_by_content_hash(&content_hash) {
            if existing.state == DocumentState::Committed || !existing.state.is_terminal() {
                return existing.process_id;
            }
        }

        let process_id = Uuid::new_v4();
        let size = bytes.len() as u64;
        self.registry.record(
            process_id,
            DocumentEventKind::Accepted { source_name: source_name.clone(), content_hash, size },
        );
        self.publish_progress(process_id);

        let this = Arc::clone(self);
        let source_name = Arc::<str>::from(source_name);
        let bytes = Arc::new(bytes);
        tokio::spawn(async move {
            this.run_and_record(process_id, source_name, bytes).await;
        });

        process_id
    }

    /// Cooperative cancel (spec §5): the next stage boundary the running
    /// pipeline reaches observes this and exits with `IngestError::Cancelled`
    /// instead of continuing. Safe to call before the process exists yet.
    pub fn cancel(&self, process_id: Uuid) {
        self.cancellations.entry(process_id).or_insert_with(|| Arc::new(AtomicBool::new(false))).store(true, Ordering::SeqCst);
    }

    /// Progress API (spec §6): latest known event for `process_id`.
    pub fn snapshot(&self, process_id: Uuid) -> Option<crate::ports::ProgressEvent> {
        self.progress.snapshot(process_id)
    }

    /// Progress API (spec §6): a best-effort push subscription over every
    /// document's published events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<crate::ports::ProgressEvent> {
        self.progress.subscribe()
    }

    /// ProcessRegistry lookup (C10), for the HTTP layer's document detail view.
    pub fn get_document(&self, process_id: Uuid) -> Option<ingest_domain::Document> {
        self.registry.get(process_id)
    }

    /// ProcessRegistry listing (C10), optionally filtered by `state`.
    pub fn list_documents(&self, state_filter: Option<DocumentState>) -> Vec<ingest_domain::Document> {
        self.registry.list(state_filter)
    }

    /// Operator-initiated purge of a terminal document's record (spec §5,
    /// grounded on `original_source/purge_documents.py`).
    pub fn purge_document(&self, process_id: Uuid) -> Result<(), IngestError> {
        self.registry.purge(process_id)
    }

    /// Admin API (spec §6): DLQ listing, `include_terminal` toggling whether
    /// permanently-failed entries are included.
    pub fn dlq_list(&self, include_terminal: bool) -> Vec<ingest_domain::DlqEntry> {
        self.dlq.list(include_terminal)
    }

    /// Admin API (spec §6): `retry_now`. Only flips `next_attempt_at` to now
    /// (and, with `force`, clears `terminal`); the `DlqWorker`'s next sweep
    /// does the actual resume through `resume_from_dlq`.
    pub fn dlq_retry_now(&self, entry_id: Uuid, force: bool) -> Result<ingest_domain::DlqEntry, IngestError> {
        self.dlq.retry_now(entry_id, force)
    }

    /// Admin API (spec §6): `discard`, dropping an entry without retrying it.
    pub fn dlq_discard(&self, entry_id: Uuid) -> Result<(), IngestError> {
        self.dlq.discard(entry_id)
    }

    /// Resumes a dead-lettered document from its DLQ payload (worker-driven,
    /// spec §4.4/§4.8): re-runs the full pipeline from `source_name`/`bytes`
    /// and reports `Success`/`PermanentFailure`/`TransientFailure` back to
    /// the `DeadLetterQueue` via `reschedule`, rather than pushing a second
    /// entry. Each stage re-derives its own idempotent outcome (spec §4.8
    /// "every step is safely retried from its start state"), so replaying
    /// from byte zero is always correct even if earlier stages already
    /// landed their side effects upstream.
    pub async fn resume_from_dlq(self: &Arc<Self>, entry_id: Uuid, process_id: Uuid, payload: &serde_json::Value) -> Result<(), IngestError> {
        let (source_name, bytes) = decode_resume_payload(payload)
            .ok_or_else(|| IngestError::Internal(format!("dlq entry {entry_id} payload is not resumable")))?;

        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::Internal("worker pool closed".into()))?;
        let source_name: Arc<str> = Arc::from(source_name);
        let bytes = Arc::new(bytes);
        let result = tokio::time::timeout(
            self.config.document_deadline,
            self.run_pipeline(process_id, Arc::clone(&source_name), Arc::clone(&bytes)),
        )
        .await;
        drop(permit);

        let outcome = match &result {
            Ok(Ok(())) => {
                self.registry.record(process_id, DocumentEventKind::Committed);
                self.publish_progress(process_id);
                self.cancellations.remove(&process_id);
                RetryOutcome::Success
            }
            Ok(Err((op_kind, e))) => self.record_resume_failure(process_id, *op_kind, e),
            Err(_) => {
                let timeout_err = IngestError::Transient {
                    kind: FailureKind::Timeout,
                    message: "document deadline exceeded on resume".into(),
                };
                self.record_resume_failure(process_id, OperationKind::Commit, &timeout_err)
            }
        };

        self.dlq.reschedule(entry_id, outcome)?;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err((_, e))) => Err(e),
            Err(_) => Err(IngestError::Transient { kind: FailureKind::Timeout, message: "document deadline exceeded on resume".into() }),
        }
    }

    /// Runs the pipeline for a freshly-accepted document and routes the
    /// result to the DLQ/registry; split out of `accept` so `resume_from_dlq`
    /// can share `run_pipeline` without re-acquiring a second worker slot.
    async fn run_and_record(self: &Arc<Self>, process_id: Uuid, source_name: Arc<str>, bytes: Arc<Vec<u8>>) {
        let permit = self.concurrency.clone().acquire_owned().await;
        let Ok(_permit) = permit else { return };
        let result = tokio::time::timeout(
            self.config.document_deadline,
            self.run_pipeline(process_id, Arc::clone(&source_name), Arc::clone(&bytes)),
        )
        .await;
        match result {
            Ok(Ok(())) => {
                self.cancellations.remove(&process_id);
            }
            Ok(Err((op_kind, e))) => self.handle_failure(process_id, op_kind, e, &source_name, &bytes).await,
            Err(_) => {
                warn!("process {process_id} exceeded its document deadline");
                self.handle_failure(
                    process_id,
                    OperationKind::Commit,
                    IngestError::Transient { kind: FailureKind::Timeout, message: "document deadline exceeded".into() },
                    &source_name,
                    &bytes,
                )
                .await;
            }
        }
    }

    /// Classifies a resumed attempt's failure into a `RetryOutcome` and
    /// records the matching `DocumentEventKind`, without pushing a new DLQ
    /// entry (the entry already exists; `reschedule` updates it in place).
    fn record_resume_failure(&self, process_id: Uuid, operation_kind: OperationKind, error: &IngestError) -> RetryOutcome {
        let _ = operation_kind;
        if matches!(error, IngestError::Cancelled) {
            self.registry.record(process_id, DocumentEventKind::Cancelled { reason: error.to_string() });
            self.publish_progress(process_id);
            return RetryOutcome::PermanentFailure;
        }
        let failure_kind = error.failure_kind().unwrap_or(FailureKind::Unknown);
        if failure_kind.retryable() {
            let attempt = self.registry.get(process_id).map(|d| d.attempts + 1).unwrap_or(1);
            self.registry.record(
                process_id,
                DocumentEventKind::RetryScheduled { attempt, failure_kind, reason: error.to_string() },
            );
            self.publish_progress(process_id);
            RetryOutcome::TransientFailure
        } else {
            error!("process {process_id} dead-lettered permanently on resume: {error}");
            self.registry.record(
                process_id,
                DocumentEventKind::DeadLettered { failure_kind, reason: error.to_string() },
            );
            self.publish_progress(process_id);
            RetryOutcome::PermanentFailure
        }
    }

    async fn run_pipeline(
        &self,
        process_id: Uuid,
        source_name: Arc<str>,
        bytes: Arc<Vec<u8>>,
    ) -> Result<(), (OperationKind, IngestError)> {
        self.check_cancelled(process_id).map_err(|e| (OperationKind::Upload, e))?;
        let format = self
            .stage_validate(process_id, &source_name, &bytes)
            .await
            .map_err(|e| (OperationKind::Upload, e))?;

        self.check_cancelled(process_id).map_err(|e| (OperationKind::Upload, e))?;
        let retrieval_doc_id = self
            .stage_upload(process_id, &source_name, &bytes)
            .await
            .map_err(|e| (OperationKind::Upload, e))?;

        self.check_cancelled(process_id).map_err(|e| (OperationKind::Extract, e))?;
        let extraction = self
            .stage_extract(process_id, &retrieval_doc_id)
            .await
            .map_err(|e| (OperationKind::Extract, e))?;

        self.check_cancelled(process_id).map_err(|e| (OperationKind::Commit, e))?;
        let batch_id = process_id.as_u128() as u64;
        let mut batch = self
            .bridge
            .canonicalize(&retrieval_doc_id, &extraction.entities, &extraction.relationships, batch_id)
            .map_err(|e| (OperationKind::Commit, e))?;
        self.registry.record(
            process_id,
            DocumentEventKind::Staged { node_count: batch.node_count(), edge_count: batch.edge_count() },
        );
        self.publish_progress(process_id);

        self.check_cancelled(process_id).map_err(|e| (OperationKind::Commit, e))?;
        self.with_breaker(&self.breakers.graph_store, OperationKind::Commit, process_id, || {
            self.transaction_manager.commit(&mut batch)
        })
        .await
        .map_err(|e| (OperationKind::Commit, e))?;

        self.registry.record(process_id, DocumentEventKind::Committed);
        self.publish_progress(process_id);
        let _ = format; // retained on the Document via the Validated event
        Ok(())
    }

    fn check_cancelled(&self, process_id: Uuid) -> Result<(), IngestError> {
        if let Some(flag) = self.cancellations.get(&process_id) {
            if flag.load(Ordering::SeqCst) {
                return Err(IngestError::Cancelled);
            }
        }
        Ok(())
    }

    async fn stage_validate(&self, process_id: Uuid, source_name: &str, bytes: &[u8]) -> Result<DocumentFormat, IngestError> {
        let outcome = self.validator.validate(source_name, bytes, bytes.len() as u64).await?;
        self.registry.record(process_id, DocumentEventKind::Validated { format: outcome.format });
        self.publish_progress(process_id);
        Ok(outcome.format)
    }

    async fn stage_upload(&self, process_id: Uuid, source_name: &str, bytes: &[u8]) -> Result<String, IngestError> {
        let content_hash = self
            .registry
            .get(process_id)
            .map(|d| d.content_hash)
            .ok_or_else(|| IngestError::Internal("missing document record".into()))?;
        let retrieval_index = Arc::clone(&self.retrieval_index);
        let id = self
            .with_breaker(&self.breakers.retrieval_index, OperationKind::Upload, process_id, || {
                retrieval_index.upload(&content_hash, source_name, bytes)
            })
            .await?;
        self.registry.record(process_id, DocumentEventKind::IndexUploaded { retrieval_doc_id: id.clone() });
        self.publish_progress(process_id);
        Ok(id)
    }

    /// Extract stage (C5), short-circuited by the `ExtractionCache` (spec
    /// §4.5): a hit means this `content_hash` was already extracted — skip
    /// the adapter call (and its breaker) entirely and reuse the cached
    /// entities/relationships, the same bypass `HttpRetrievalIndex::seen`
    /// grants uploads of an already-indexed hash.
    async fn stage_extract(&self, process_id: Uuid, retrieval_doc_id: &str) -> Result<crate::ports::ExtractionResult, IngestError> {
        let content_hash = self
            .registry
            .get(process_id)
            .map(|d| d.content_hash)
            .ok_or_else(|| IngestError::Internal("missing document record".into()))?;

        if let Some(cached) = self.extraction_cache.get(&content_hash).await? {
            info!("process {process_id} reused cached extraction for content_hash {content_hash}");
            self.registry.record(
                process_id,
                DocumentEventKind::Extracted {
                    entity_count: cached.entities.len(),
                    relationship_count: cached.relationships.len(),
                },
            );
            self.publish_progress(process_id);
            return Ok(cached);
        }

        let extractor = Arc::clone(&self.extractor);
        let result = self
            .with_breaker(&self.breakers.extractor, OperationKind::Extract, process_id, || extractor.extract(retrieval_doc_id))
            .await?;
        self.extraction_cache.put(&content_hash, &result.entities, &result.relationships).await?;
        self.registry.record(
            process_id,
            DocumentEventKind::Extracted {
                entity_count: result.entities.len(),
                relationship_count: result.relationships.len(),
            },
        );
        self.publish_progress(process_id);
        Ok(result)
    }

    /// Wraps a single adapter call with its breaker's admission/outcome
    /// bookkeeping; on `IngestError::BreakerOpen` the call is never attempted.
    async fn with_breaker<F, Fut, T>(
        &self,
        breaker: &CircuitBreaker,
        operation_kind: OperationKind,
        process_id: Uuid,
        call: F,
    ) -> Result<T, IngestError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, IngestError>>,
    {
        match breaker.admit()? {
            Admission::Pass => match call().await {
                Ok(v) => {
                    breaker.record_success();
                    Ok(v)
                }
                Err(e) => {
                    // Logical errors (spec §4.1) never trip the breaker; the
                    // breaker's state is left untouched and only connectivity
                    // failures are recorded.
                    if let Some(kind) = classify_for_breaker(&e) {
                        breaker.record_failure(kind);
                    }
                    let _ = operation_kind;
                    let _ = process_id;
                    Err(e)
                }
            },
            Admission::Probe(guard) => match call().await {
                Ok(v) => {
                    guard.record_success();
                    Ok(v)
                }
                Err(e) => {
                    match classify_for_breaker(&e) {
                        Some(kind) => guard.record_failure(kind),
                        None => guard.resolve_ignored(),
                    }
                    Err(e)
                }
            },
        }
    }

    /// Routes a freshly-failed accept-spawned run to either a terminal
    /// `Cancelled` event or the DLQ, embedding `source_name`/`bytes` in the
    /// entry's payload (base64, grounded on `original_source`'s resumable
    /// failure records) so a later `resume_from_dlq` has everything it needs
    /// without re-reading from the caller.
    async fn handle_failure(&self, process_id: Uuid, operation_kind: OperationKind, error: IngestError, source_name: &str, bytes: &[u8]) {
        if matches!(error, IngestError::Cancelled) {
            self.registry.record(process_id, DocumentEventKind::Cancelled { reason: error.to_string() });
            self.publish_progress(process_id);
            return;
        }
        let failure_kind = error.failure_kind().unwrap_or(FailureKind::Unknown);

        let doc = self.registry.get(process_id);
        let attempt = doc.as_ref().map(|d| d.attempts + 1).unwrap_or(1);
        let payload = build_resume_payload(source_name, bytes);

        let entry = self.dlq.push(process_id, operation_kind, payload, failure_kind, error.to_string());

        if entry.terminal {
            error!("process {process_id} dead-lettered permanently: {error}");
            self.registry.record(
                process_id,
                DocumentEventKind::DeadLettered { failure_kind, reason: error.to_string() },
            );
        } else {
            info!("process {process_id} scheduled for retry (attempt {attempt}): {error}");
            self.registry.record(
                process_id,
                DocumentEventKind::RetryScheduled { attempt, failure_kind, reason: error.to_string() },
            );
        }
        self.publish_progress(process_id);
    }

    fn publish_progress(&self, process_id: Uuid) {
        if let Some(doc) = self.registry.get(process_id) {
            self.progress.publish(ProgressEvent {
                process_id,
                state: doc.state,
                counts: std::collections::BTreeMap::new(),
                ts: chrono::Utc::now(),
            });
        }
    }
}

/// Builds a DLQ-entry payload a `DlqWorker` can replay without any other
/// source of truth: `source_name` plus the original bytes, base64-encoded
/// since `DlqEntry::payload` is `serde_json::Value`.
fn build_resume_payload(source_name: &str, bytes: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "source_name": source_name,
        "bytes_base64": BASE64.encode(bytes),
    })
}

fn decode_resume_payload(payload: &serde_json::Value) -> Option<(String, Vec<u8>)> {
    let source_name = payload.get("source_name")?.as_str()?.to_string();
    let encoded = payload.get("bytes_base64")?.as_str()?;
    let bytes = BASE64.decode(encoded).ok()?;
    Some((source_name, bytes))
}

/// Classifies an adapter error for breaker bookkeeping (spec §4.1):
/// timeouts and backend/connectivity failures trip the breaker; logical
/// errors (bad query, malformed extraction, validation) are surfaced to the
/// caller without affecting breaker state, which is why this returns
/// `None` for them rather than a catch-all `ConnectionRefused`.
fn classify_for_breaker(e: &IngestError) -> Option<BreakerFailureKind> {
    match e {
        IngestError::Transient { kind: FailureKind::Timeout, .. } => Some(BreakerFailureKind::Timeout),
        IngestError::Transient { kind: FailureKind::Backend5xx, .. } => Some(BreakerFailureKind::TargetUnavailable),
        IngestError::Transient { .. } => Some(BreakerFailureKind::ConnectionRefused),
        // `admit()` already short-circuits with this variant before `call()`
        // ever runs, so it cannot reach here in practice; treated as a
        // connectivity signal if it ever does.
        IngestError::BreakerOpen { .. } => Some(BreakerFailureKind::TargetUnavailable),
        IngestError::Validation(_)
        | IngestError::ExtractionSchema(_)
        | IngestError::GraphLogic(_)
        | IngestError::Unknown(_)
        | IngestError::Cancelled
        | IngestError::Internal(_) => None,
    }
}

/// Ambient default outer deadline used when no config override is given.
pub const DEFAULT_DOCUMENT_DEADLINE: Duration = Duration::from_secs(3600);
