//! Hash helpers shared by every component that needs a deterministic,
//! reproducible fingerprint over internal data (bridge entity ids, staged
//! batch ordering checks, breaker/DLQ test fixtures). `content_hash` itself
//! is SHA-256 per spec §3 and lives in `ingest_adapters::validator` next to
//! where bytes are first seen; everything computed *inside* the pipeline
//! uses this module's blake3-over-canonical-JSON discipline instead, so one
//! hashing approach covers every internally-defined fingerprint.

pub mod canonical_json;

pub use canonical_json::to_canonical_json;

use blake3::Hasher;
use serde_json::Value;

pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

pub fn hash_value(v: &Value) -> String {
    hash_str(&to_canonical_json(v))
}

/// `id = hash(canonical_type || "\0" || normalized_name)` from spec §4.7.
pub fn entity_id(canonical_type: &str, normalized_name: &str) -> String {
    hash_str(&format!("{canonical_type}\0{normalized_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_is_deterministic_and_type_sensitive() {
        let a = entity_id("EQUIPMENT", "ice cream machine");
        let b = entity_id("EQUIPMENT", "ice cream machine");
        let c = entity_id("PROCEDURE", "ice cream machine");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
