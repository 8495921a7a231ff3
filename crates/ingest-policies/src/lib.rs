//! ingest-policies: deterministic, auditable decision tables the bridge and
//! DLQ consult.
//!
//! Plays the role `chem_policies` plays for the chemistry engine's property
//! selection: small, pure, table-driven decisions with no I/O, kept separate
//! from the orchestration crate so they can be tuned and tested in
//! isolation.

pub mod backoff;
pub mod synonyms;
pub mod type_resolution;

pub use backoff::compute_backoff;
pub use type_resolution::{resolve_relationship_type, resolve_type};
