//! `BreakerState` snapshot (spec §3, §4.1).
//!
//! This is the observable shape exposed by `CircuitBreaker::snapshot()` —
//! the struct shape itself is not named by spec.md, so it follows
//! `backend/reliability_infrastructure.py` in `original_source/` (see
//! SPEC_FULL.md) which reports breaker health as exactly these four fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerFailureKind {
    Timeout,
    ConnectionRefused,
    TargetUnavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerPhase,
    pub failure_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_failure_kind: Option<BreakerFailureKind>,
}
