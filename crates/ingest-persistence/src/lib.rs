//! ingest-persistence: Postgres-backed durable storage for the document
//! ingestion pipeline.
//!
//! Mirrors the role `chem-persistence` plays for the chemistry engine: the
//! `ingest-core` traits (`EventStore`, `DeadLetterQueue`, `ExtractionCache`)
//! stay backend-agnostic, and this crate supplies the Diesel/Postgres
//! implementations plus schema, migrations and connection config.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::DbConfig;
pub use error::PersistenceError;
pub use pg::{
    build_dev_pool_from_env, build_pool, ConnectionProvider, PgDeadLetterQueue, PgEventStore,
    PgExtractionCache, PgPool, PoolProvider,
};
