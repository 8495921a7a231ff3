//! TransactionManager (C3): commits a `StagedBatch` to the `GraphStore`
//! atomically, ops applied in the batch's canonical order (nodes before
//! edges, lexically sorted keys within each) to avoid lock-order
//! inversions between concurrently-committing documents, per spec §4.3.
//!
//! Retry policy mirrors `chem_persistence::pg::with_retry`: a bounded number
//! of attempts with a small exponential backoff, applied only to errors the
//! `GraphStore` adapter classifies as transient (deadlock, serialization
//! conflict); anything else propagates immediately.

use std::time::Duration;

use ingest_domain::{FailureKind, StagedBatch};
use log::warn;

use crate::errors::IngestError;
use crate::ports::GraphStore;

const MAX_ATTEMPTS: u32 = 3;

pub struct TransactionManager<G: GraphStore> {
    store: G,
    backoff_base: Duration,
    backoff_exponent_cap: u32,
    jitter_fraction: f64,
}

impl<G: GraphStore> TransactionManager<G> {
    pub fn new(store: G) -> Self {
        Self::with_backoff(store, Duration::from_millis(15), 3, 0.2)
    }

    pub fn with_backoff(store: G, backoff_base: Duration, backoff_exponent_cap: u32, jitter_fraction: f64) -> Self {
        Self { store, backoff_base, backoff_exponent_cap, jitter_fraction }
    }

    /// Applies every op in `batch` inside one `GraphTransaction`, retrying
    /// the whole batch on a transient (deadlock/serialization) failure.
    /// `batch` is mutated in place so callers observe the canonical order
    /// that was actually applied.
    pub async fn commit(&self, batch: &mut StagedBatch) -> Result<(), IngestError> {
        batch.canonicalize_order();
        let mut attempt = 0u32;
        loop {
            match self.try_commit_once(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if is_retryable(&e) && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    let seed = batch.batch_id ^ attempt as u64;
                    let delay = ingest_policies::compute_backoff(
                        self.backoff_base,
                        self.backoff_exponent_cap,
                        self.jitter_fraction,
                        attempt,
                        seed,
                    );
                    warn!(
                        "transient graph commit error (attempt {attempt}): {e} -> retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_commit_once(&self, batch: &StagedBatch) -> Result<(), IngestError> {
        let mut txn = self.store.begin().await?;
        for op in &batch.ops {
            if let Err(e) = txn.apply(op).await {
                let _ = txn.rollback().await;
                return Err(e);
            }
        }
        txn.commit().await
    }
}

fn is_retryable(e: &IngestError) -> bool {
    matches!(
        e.failure_kind(),
        Some(FailureKind::Backend5xx) | Some(FailureKind::Timeout) | Some(FailureKind::BreakerOpen)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingest_domain::{CanonicalType, GraphOp};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::ports::GraphTransaction;

    struct FlakyTxn {
        calls: Arc<AtomicU32>,
        fail_first_n: u32,
    }

    #[async_trait]
    impl GraphTransaction for FlakyTxn {
        async fn apply(&mut self, _op: &GraphOp) -> Result<(), IngestError> {
            Ok(())
        }

        async fn commit(self: Box<Self>) -> Result<(), IngestError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(IngestError::Transient { kind: FailureKind::Backend5xx, message: "deadlock".into() })
            } else {
                Ok(())
            }
        }

        async fn rollback(self: Box<Self>) -> Result<(), IngestError> {
            Ok(())
        }
    }

    struct FlakyStore {
        calls: Arc<AtomicU32>,
        fail_first_n: u32,
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn begin(&self) -> Result<Box<dyn GraphTransaction>, IngestError> {
            Ok(Box::new(FlakyTxn { calls: self.calls.clone(), fail_first_n: self.fail_first_n }))
        }

        async fn count_by_label(&self, _canonical_type: &str) -> Result<u64, IngestError> {
            Ok(0)
        }

        async fn orphan_count(&self) -> Result<u64, IngestError> {
            Ok(0)
        }
    }

    fn sample_batch() -> StagedBatch {
        StagedBatch::new(
            1,
            vec![GraphOp::MergeNode {
                canonical_type: CanonicalType::Equipment,
                id: "a".into(),
                properties: serde_json::json!({}),
            }],
        )
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let mgr = TransactionManager::new(FlakyStore { calls: calls.clone(), fail_first_n: 2 });
        let mut batch = sample_batch();
        mgr.commit(&mut batch).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let mgr = TransactionManager::new(FlakyStore { calls: calls.clone(), fail_first_n: 10 });
        let mut batch = sample_batch();
        assert!(mgr.commit(&mut batch).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
