//! Domain-level errors: malformed records, not I/O failures.
//!
//! I/O and backend failure classification (the §7 taxonomy) lives in
//! `ingest-core::errors`; this module only covers invariant violations on
//! the value types themselves (e.g. constructing a `CanonicalRelationship`
//! with a self-loop).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("self-loop relationship rejected: {0}")]
    SelfLoop(String),

    #[error("unknown canonical type hint: {0}")]
    UnknownType(String),
}
