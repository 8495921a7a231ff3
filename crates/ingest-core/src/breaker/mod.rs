//! Circuit breaker (C1), one instance per external target (extractor,
//! retrieval index, graph store). Grounds its state machine in
//! `original_source/backend/reliability_infrastructure.py` (see
//! SPEC_FULL.md); expressed here as a mutex-guarded state machine the same
//! way the teacher guards pool/connection state in
//! `chem_persistence::pg::PoolProvider`.
//!
//! CLOSED admits every call and counts failures in a rolling window; past
//! `failure_threshold` it trips to OPEN. OPEN refuses every call until
//! `cooldown` elapses, then allows exactly one HALF_OPEN probe at a time
//! (enforced by `tokio::sync::Semaphore` with one permit) — success closes
//! the breaker, failure reopens it and restarts the cooldown.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ingest_domain::{BreakerFailureKind, BreakerPhase, BreakerSnapshot};
use tokio::sync::Semaphore;

use crate::errors::IngestError;

struct Inner {
    phase: BreakerPhase,
    failures: Vec<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
    last_failure_kind: Option<BreakerFailureKind>,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    failure_window: Duration,
    cooldown: Duration,
    inner: Mutex<Inner>,
    /// Single permit: admits exactly one concurrent HALF_OPEN probe.
    half_open_gate: Semaphore,
}

/// RAII guard returned by `admit()` for a HALF_OPEN probe; dropping it
/// without calling `record_success`/`record_failure` is treated as a
/// failure so a probe that panics or times out does not wedge the breaker
/// open forever.
pub struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    resolved: bool,
}

impl<'a> ProbeGuard<'a> {
    pub fn record_success(mut self) {
        self.breaker.record_success_inner();
        self.resolved = true;
    }

    pub fn record_failure(mut self, kind: BreakerFailureKind) {
        self.breaker.record_failure_inner(kind);
        self.resolved = true;
    }

    /// Resolves the probe without touching breaker state at all. Used when
    /// the probed call failed with a logical error (spec §4.1) — the call
    /// reached the backend and got a real answer, so this is neither a
    /// connectivity success nor a connectivity failure, and the breaker
    /// must be left exactly as it was admitted (HALF_OPEN, probe consumed).
    pub fn resolve_ignored(mut self) {
        self.resolved = true;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.record_failure_inner(BreakerFailureKind::TargetUnavailable);
        }
    }
}

pub enum Admission<'a> {
    /// CLOSED: call through normally, reporting the outcome via the bare
    /// `record_success`/`record_failure` methods.
    Pass,
    /// HALF_OPEN: exactly one caller gets this per cooldown cycle.
    Probe(ProbeGuard<'a>),
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, failure_window: Duration, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            failure_window,
            cooldown,
            inner: Mutex::new(Inner {
                phase: BreakerPhase::Closed,
                failures: Vec::new(),
                opened_at: None,
                last_failure_kind: None,
            }),
            half_open_gate: Semaphore::new(1),
        }
    }

    /// Decides whether a call may proceed. Returns `Err(BreakerOpen)` when
    /// OPEN and the cooldown has not elapsed, or when another HALF_OPEN
    /// probe already holds the single permit.
    pub fn admit(&self) -> Result<Admission<'_>, IngestError> {
        let mut guard = self.inner.lock().unwrap();
        self.prune_window(&mut guard);
        match guard.phase {
            BreakerPhase::Closed => Ok(Admission::Pass),
            BreakerPhase::Open => {
                let opened_at = guard.opened_at.unwrap_or_else(Utc::now);
                let elapsed = Utc::now().signed_duration_since(opened_at);
                if elapsed.to_std().unwrap_or(Duration::ZERO) >= self.cooldown {
                    guard.phase = BreakerPhase::HalfOpen;
                    drop(guard);
                    self.try_acquire_probe()
                } else {
                    Err(IngestError::BreakerOpen { target: self.name.clone() })
                }
            }
            BreakerPhase::HalfOpen => {
                drop(guard);
                self.try_acquire_probe()
            }
        }
    }

    fn try_acquire_probe(&self) -> Result<Admission<'_>, IngestError> {
        match self.half_open_gate.try_acquire() {
            Ok(permit) => {
                permit.forget();
                Ok(Admission::Probe(ProbeGuard { breaker: self, resolved: false }))
            }
            Err(_) => Err(IngestError::BreakerOpen { target: self.name.clone() }),
        }
    }

    pub fn record_success(&self) {
        self.record_success_inner();
    }

    pub fn record_failure(&self, kind: BreakerFailureKind) {
        self.record_failure_inner(kind);
    }

    fn record_success_inner(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.phase = BreakerPhase::Closed;
        guard.failures.clear();
        guard.opened_at = None;
        guard.last_failure_kind = None;
        if self.half_open_gate.available_permits() == 0 {
            self.half_open_gate.add_permits(1);
        }
    }

    fn record_failure_inner(&self, kind: BreakerFailureKind) {
        let mut guard = self.inner.lock().unwrap();
        let was_half_open = matches!(guard.phase, BreakerPhase::HalfOpen);
        guard.last_failure_kind = Some(kind);
        guard.failures.push(Utc::now());
        self.prune_window(&mut guard);

        if was_half_open || guard.failures.len() as u32 >= self.failure_threshold {
            guard.phase = BreakerPhase::Open;
            guard.opened_at = Some(Utc::now());
        }
        if was_half_open && self.half_open_gate.available_permits() == 0 {
            self.half_open_gate.add_permits(1);
        }
    }

    fn prune_window(&self, guard: &mut Inner) {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.failure_window).unwrap_or_default();
        guard.failures.retain(|t| *t >= cutoff);
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let guard = self.inner.lock().unwrap();
        BreakerSnapshot {
            state: guard.phase,
            failure_count: guard.failures.len() as u32,
            opened_at: guard.opened_at,
            last_failure_kind: guard.last_failure_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_after_threshold_failures() {
        let b = CircuitBreaker::new("extractor", 3, Duration::from_secs(60), Duration::from_secs(30));
        for _ in 0..3 {
            assert!(matches!(b.admit().unwrap(), Admission::Pass));
            b.record_failure(BreakerFailureKind::Timeout);
        }
        assert!(b.admit().is_err());
        assert_eq!(b.snapshot().state, BreakerPhase::Open);
    }

    #[test]
    fn half_open_admits_single_probe() {
        let b = CircuitBreaker::new("extractor", 1, Duration::from_secs(60), Duration::from_millis(0));
        assert!(matches!(b.admit().unwrap(), Admission::Pass));
        b.record_failure(BreakerFailureKind::Timeout);
        assert_eq!(b.snapshot().state, BreakerPhase::Open);

        match b.admit().unwrap() {
            Admission::Probe(guard) => {
                assert!(b.admit().is_err(), "a second probe must be refused while one is in flight");
                guard.record_success();
            }
            Admission::Pass => panic!("expected a HALF_OPEN probe"),
        }
        assert_eq!(b.snapshot().state, BreakerPhase::Closed);
    }

    #[test]
    fn probe_failure_reopens_breaker() {
        let b = CircuitBreaker::new("extractor", 1, Duration::from_secs(60), Duration::from_millis(0));
        b.record_failure(BreakerFailureKind::Timeout);
        match b.admit().unwrap() {
            Admission::Probe(guard) => guard.record_failure(BreakerFailureKind::ConnectionRefused),
            Admission::Pass => panic!("expected a HALF_OPEN probe"),
        }
        assert_eq!(b.snapshot().state, BreakerPhase::Open);
    }

    #[test]
    fn dropped_probe_without_resolution_counts_as_failure() {
        let b = CircuitBreaker::new("extractor", 1, Duration::from_secs(60), Duration::from_millis(0));
        b.record_failure(BreakerFailureKind::Timeout);
        match b.admit().unwrap() {
            Admission::Probe(guard) => drop(guard),
            Admission::Pass => panic!("expected a HALF_OPEN probe"),
        }
        assert_eq!(b.snapshot().state, BreakerPhase::Open);
    }
}
