//! Dead-letter queue (C4): the failure sink every retryable or permanent
//! adapter error lands in. Retryable entries are picked back up by the
//! orchestrator once `next_attempt_at` has passed; permanent entries sit
//! `terminal` for operator inspection (spec §4.4, §5).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use ingest_domain::{DlqEntry, FailureKind, OperationKind};
use uuid::Uuid;

use crate::errors::IngestError;

/// Outcome of the DLQ worker's resumed attempt, fed to `reschedule` (spec
/// §4.4's `reschedule(id, outcome)`). Distinct from `retry_now`, which is
/// the *operator*-driven control surface (§6 Admin API); this is the
/// automatic path a background worker drives after every resume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    TransientFailure,
    PermanentFailure,
    Success,
}

pub trait DeadLetterQueue: Send + Sync {
    fn push(
        &self,
        process_id: Uuid,
        operation_kind: OperationKind,
        payload: serde_json::Value,
        failure_kind: FailureKind,
        last_error: String,
    ) -> DlqEntry;

    fn get(&self, id: Uuid) -> Option<DlqEntry>;
    fn list(&self, include_terminal: bool) -> Vec<DlqEntry>;
    /// Entries whose `next_attempt_at` has passed and are not terminal.
    fn due(&self) -> Vec<DlqEntry>;

    /// Operator-forced retry. Per spec §4.4, a `terminal` entry refuses a
    /// normal retry and requires `force` — mirrors SPEC_FULL.md's Open
    /// Question 2 resolution for re-accepting a dead-lettered document.
    fn retry_now(&self, id: Uuid, force: bool) -> Result<DlqEntry, IngestError>;

    fn discard(&self, id: Uuid) -> Result<(), IngestError>;

    /// Worker-driven: records the outcome of a resumed attempt for `id`.
    /// `Success` deletes the entry; `PermanentFailure` marks it terminal;
    /// `TransientFailure` recomputes `next_attempt_at` via backoff, except
    /// for `FailureKind::BreakerOpen`, which gets a short fixed delay and
    /// does not consume an attempt (spec §4.4's retry table).
    fn reschedule(&self, id: Uuid, outcome: RetryOutcome) -> Result<(), IngestError>;
}

pub struct InMemoryDeadLetterQueue {
    entries: Mutex<HashMap<Uuid, DlqEntry>>,
    backoff_base: Duration,
    backoff_exponent_cap: u32,
    jitter_fraction: f64,
    max_attempts: u32,
}

impl InMemoryDeadLetterQueue {
    pub fn new(backoff_base: Duration, backoff_exponent_cap: u32, jitter_fraction: f64, max_attempts: u32) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            backoff_base,
            backoff_exponent_cap,
            jitter_fraction,
            max_attempts,
        }
    }

    fn schedule_next_attempt(&self, entry: &mut DlqEntry) {
        let seed = entry.id.as_u128() as u64 ^ entry.attempt_count as u64;
        let delay = ingest_policies::compute_backoff(
            self.backoff_base,
            self.backoff_exponent_cap,
            self.jitter_fraction,
            entry.attempt_count,
            seed,
        );
        entry.next_attempt_at = Utc::now() + ChronoDuration::from_std(delay).unwrap_or_default();
    }
}

impl DeadLetterQueue for InMemoryDeadLetterQueue {
    fn push(
        &self,
        process_id: Uuid,
        operation_kind: OperationKind,
        payload: serde_json::Value,
        failure_kind: FailureKind,
        last_error: String,
    ) -> DlqEntry {
        let mut entry = DlqEntry::new(process_id, operation_kind, payload, failure_kind, last_error);
        if !entry.terminal {
            self.schedule_next_attempt(&mut entry);
        }
        self.entries.lock().unwrap().insert(entry.id, entry.clone());
        entry
    }

    fn get(&self, id: Uuid) -> Option<DlqEntry> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    fn list(&self, include_terminal: bool) -> Vec<DlqEntry> {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| include_terminal || !e.terminal)
            .cloned()
            .collect()
    }

    fn due(&self) -> Vec<DlqEntry> {
        let now = Utc::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| !e.terminal && e.next_attempt_at <= now)
            .cloned()
            .collect()
    }

    fn retry_now(&self, id: Uuid, force: bool) -> Result<DlqEntry, IngestError> {
        let mut guard = self.entries.lock().unwrap();
        let entry = guard
            .get_mut(&id)
            .ok_or_else(|| IngestError::Validation(format!("unknown dlq entry {id}")))?;
        if entry.terminal && !force {
            return Err(IngestError::Validation(format!(
                "dlq entry {id} is terminal; retry requires force=true"
            )));
        }
        entry.attempt_count += 1;
        if entry.attempt_count >= self.max_attempts && entry.failure_kind == FailureKind::Unknown {
            entry.terminal = true;
        } else if force {
            entry.terminal = false;
        }
        entry.next_attempt_at = Utc::now();
        Ok(entry.clone())
    }

    fn discard(&self, id: Uuid) -> Result<(), IngestError> {
        self.entries
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| IngestError::Validation(format!("unknown dlq entry {id}")))
    }

    fn reschedule(&self, id: Uuid, outcome: RetryOutcome) -> Result<(), IngestError> {
        match outcome {
            RetryOutcome::Success => {
                self.entries.lock().unwrap().remove(&id);
                Ok(())
            }
            RetryOutcome::PermanentFailure => {
                let mut guard = self.entries.lock().unwrap();
                let entry = guard
                    .get_mut(&id)
                    .ok_or_else(|| IngestError::Validation(format!("unknown dlq entry {id}")))?;
                entry.terminal = true;
                Ok(())
            }
            RetryOutcome::TransientFailure => {
                let mut guard = self.entries.lock().unwrap();
                let entry = guard
                    .get_mut(&id)
                    .ok_or_else(|| IngestError::Validation(format!("unknown dlq entry {id}")))?;
                if entry.failure_kind == FailureKind::BreakerOpen {
                    // Spec §4.4: short delay, attempt count untouched.
                    entry.next_attempt_at = Utc::now() + ChronoDuration::seconds(1);
                    return Ok(());
                }
                entry.attempt_count += 1;
                if entry.failure_kind == FailureKind::Unknown && entry.attempt_count >= self.max_attempts {
                    entry.terminal = true;
                    return Ok(());
                }
                self.schedule_next_attempt(entry);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> InMemoryDeadLetterQueue {
        InMemoryDeadLetterQueue::new(Duration::from_millis(100), 4, 0.2, 3)
    }

    #[test]
    fn retryable_entries_get_a_future_next_attempt() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Extract, serde_json::json!({}), FailureKind::Backend5xx, "503".into());
        assert!(!entry.terminal);
        assert!(entry.next_attempt_at > Utc::now() - ChronoDuration::seconds(1));
    }

    #[test]
    fn terminal_entries_refuse_retry_without_force() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Extract, serde_json::json!({}), FailureKind::ExtractionSchema, "bad schema".into());
        assert!(entry.terminal);
        assert!(q.retry_now(entry.id, false).is_err());
        assert!(q.retry_now(entry.id, true).is_ok());
    }

    #[test]
    fn unknown_kind_becomes_terminal_after_max_attempts() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Commit, serde_json::json!({}), FailureKind::Unknown, "???".into());
        let mut id = entry.id;
        for _ in 0..3 {
            let updated = q.retry_now(id, false).unwrap();
            id = updated.id;
        }
        assert!(q.get(id).unwrap().terminal);
    }

    #[test]
    fn reschedule_success_deletes_the_entry() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Upload, serde_json::json!({}), FailureKind::Backend5xx, "503".into());
        q.reschedule(entry.id, RetryOutcome::Success).unwrap();
        assert!(q.get(entry.id).is_none());
    }

    #[test]
    fn reschedule_transient_bumps_attempt_and_next_attempt_at() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Upload, serde_json::json!({}), FailureKind::Backend5xx, "503".into());
        q.reschedule(entry.id, RetryOutcome::TransientFailure).unwrap();
        let updated = q.get(entry.id).unwrap();
        assert_eq!(updated.attempt_count, 1);
        assert!(!updated.terminal);
    }

    #[test]
    fn reschedule_breaker_open_does_not_bump_attempt_count() {
        let q = queue();
        let entry = q.push(Uuid::new_v4(), OperationKind::Commit, serde_json::json!({}), FailureKind::BreakerOpen, "open".into());
        q.reschedule(entry.id, RetryOutcome::TransientFailure).unwrap();
        assert_eq!(q.get(entry.id).unwrap().attempt_count, 0);
    }

    #[test]
    fn list_filters_terminal_by_default() {
        let q = queue();
        q.push(Uuid::new_v4(), OperationKind::Extract, serde_json::json!({}), FailureKind::ExtractionSchema, "x".into());
        q.push(Uuid::new_v4(), OperationKind::Extract, serde_json::json!({}), FailureKind::Backend5xx, "x".into());
        assert_eq!(q.list(false).len(), 1);
        assert_eq!(q.list(true).len(), 2);
    }
}
