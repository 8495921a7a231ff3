//! Runtime configuration loaded from the environment (spec §6), following
//! `chem_persistence::config::DbConfig::from_env`'s lazy-`.env` pattern.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Tunables named in spec §6; every field has a default so the pipeline runs
/// unconfigured in tests and demos.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Consecutive failures before the breaker trips (C1).
    pub breaker_failure_threshold: u32,
    /// Rolling window the failure count is measured over.
    pub breaker_failure_window: Duration,
    /// Time OPEN stays shut before admitting a HALF_OPEN probe.
    pub breaker_cooldown: Duration,
    /// Per-call wall-clock timeout for extractor/retrieval HTTP adapters.
    pub adapter_timeout: Duration,
    /// Base delay for DLQ exponential backoff (spec §4.4).
    pub dlq_backoff_base: Duration,
    /// Cap on the exponent so backoff does not grow unbounded.
    pub dlq_backoff_exponent_cap: u32,
    /// +/- fraction of jitter applied to each computed backoff.
    pub dlq_jitter_fraction: f64,
    /// Bound on retry attempts before an entry becomes permanently terminal,
    /// for `FailureKind::Unknown` which has no sharper domain signal.
    pub dlq_max_attempts: u32,
    /// Outer per-document deadline the orchestrator (C8) enforces end to end.
    pub document_deadline: Duration,
    /// Bounded worker pool size.
    pub worker_concurrency: usize,
    /// `OTHER`-type fraction above which the bridge (C7) logs a data-quality
    /// warning rather than failing the run (spec §4.7 step 2).
    pub bridge_other_fraction_warn: f64,
    /// Base delay for the transaction manager's (C3) commit retry backoff.
    pub txn_backoff_base: Duration,
    /// Cap on the exponent so commit retry backoff does not grow unbounded.
    pub txn_backoff_exponent_cap: u32,
    /// +/- fraction of jitter applied to each computed commit retry backoff.
    pub txn_jitter_fraction: f64,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self {
            breaker_failure_threshold: env_u32("BREAKER_FAILURE_THRESHOLD", 5),
            breaker_failure_window: Duration::from_secs(env_u64("BREAKER_FAILURE_WINDOW_SECS", 60)),
            breaker_cooldown: Duration::from_secs(env_u64("BREAKER_COOLDOWN_SECS", 30)),
            adapter_timeout: Duration::from_secs(env_u64("ADAPTER_TIMEOUT_SECS", 30)),
            dlq_backoff_base: Duration::from_millis(env_u64("DLQ_BACKOFF_BASE_MS", 500)),
            dlq_backoff_exponent_cap: env_u32("DLQ_BACKOFF_EXPONENT_CAP", 6),
            dlq_jitter_fraction: env_f64("DLQ_JITTER_FRACTION", 0.2),
            dlq_max_attempts: env_u32("DLQ_MAX_ATTEMPTS", 8),
            document_deadline: Duration::from_secs(env_u64("DOCUMENT_DEADLINE_SECS", 3600)),
            worker_concurrency: env_u64("WORKER_CONCURRENCY", 8) as usize,
            bridge_other_fraction_warn: env_f64("BRIDGE_OTHER_FRACTION_WARN", 0.15),
            txn_backoff_base: Duration::from_millis(env_u64("TXN_BACKOFF_BASE_MS", 15)),
            txn_backoff_exponent_cap: env_u32("TXN_BACKOFF_EXPONENT_CAP", 3),
            txn_jitter_fraction: env_f64("TXN_JITTER_FRACTION", 0.2),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 5,
            breaker_failure_window: Duration::from_secs(60),
            breaker_cooldown: Duration::from_secs(30),
            adapter_timeout: Duration::from_secs(30),
            dlq_backoff_base: Duration::from_millis(500),
            dlq_backoff_exponent_cap: 6,
            dlq_jitter_fraction: 0.2,
            dlq_max_attempts: 8,
            document_deadline: Duration::from_secs(3600),
            worker_concurrency: 8,
            bridge_other_fraction_warn: 0.15,
            txn_backoff_base: Duration::from_millis(15),
            txn_backoff_exponent_cap: 3,
            txn_jitter_fraction: 0.2,
        }
    }
}
