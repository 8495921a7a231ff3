//! DLQ retry backoff (spec §4.4): `base * 2^min(attempt, cap) +/- jitter`.
//!
//! Jitter is derived from the entry's own id/attempt rather than drawn from
//! a random source, so the same `(base, cap, jitter_fraction, attempt)`
//! always produces the same delay — kept deterministic and testable the way
//! `chem_policies::params_hash` keeps selection parameters reproducible,
//! even though unlike that module this isn't on any audit path; it just
//! means a retry schedule can be asserted on exactly in tests.

use std::time::Duration;

/// `jitter_seed` is any caller-chosen value that varies per-entry (e.g. a
/// hash of the DLQ entry id); it only has to be stable across calls for the
/// same entry, not globally unique.
pub fn compute_backoff(
    base: Duration,
    exponent_cap: u32,
    jitter_fraction: f64,
    attempt: u32,
    jitter_seed: u64,
) -> Duration {
    let exponent = attempt.min(exponent_cap);
    let multiplier = 1u64 << exponent;
    let nominal_ms = base.as_millis() as u64 * multiplier;

    // Deterministic +/- jitter_fraction spread derived from jitter_seed.
    let spread = ((jitter_seed % 1000) as f64 / 1000.0) * 2.0 - 1.0; // in [-1, 1)
    let jitter_ms = (nominal_ms as f64 * jitter_fraction * spread) as i64;
    let total_ms = (nominal_ms as i64 + jitter_ms).max(0) as u64;
    Duration::from_millis(total_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially_then_caps() {
        let base = Duration::from_millis(100);
        let d0 = compute_backoff(base, 4, 0.0, 0, 1);
        let d1 = compute_backoff(base, 4, 0.0, 1, 1);
        let d2 = compute_backoff(base, 4, 0.0, 2, 1);
        let d_capped = compute_backoff(base, 4, 0.0, 10, 1);
        assert_eq!(d0, Duration::from_millis(100));
        assert_eq!(d1, Duration::from_millis(200));
        assert_eq!(d2, Duration::from_millis(400));
        assert_eq!(d_capped, compute_backoff(base, 4, 0.0, 4, 1));
    }

    #[test]
    fn is_deterministic_for_the_same_seed() {
        let base = Duration::from_millis(500);
        let a = compute_backoff(base, 6, 0.2, 3, 42);
        let b = compute_backoff(base, 6, 0.2, 3, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let base = Duration::from_millis(1000);
        let nominal = 1000u64;
        for seed in 0..50u64 {
            let d = compute_backoff(base, 0, 0.2, 0, seed);
            let ms = d.as_millis() as u64;
            assert!(ms <= nominal + (nominal as f64 * 0.2) as u64 + 1);
        }
    }
}
