//! ingest-core: the orchestration engine for the document ingestion
//! pipeline.
//!
//! Plays the role `chem_core` plays for the chemistry flow engine: an
//! append-only event log, replay-based state reconstruction, a circuit
//! breaker per external dependency, a transactional commit path, a
//! dead-letter queue, and the orchestrator that ties them together — all
//! generalized from the chemistry flow's step/event/repository triad to this
//! pipeline's fixed five-stage document state machine.

pub mod breaker;
pub mod config;
pub mod dlq;
pub mod dlq_worker;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod transaction;

pub use breaker::{Admission, CircuitBreaker, ProbeGuard};
pub use config::IngestConfig;
pub use dlq::{DeadLetterQueue, InMemoryDeadLetterQueue, RetryOutcome};
pub use dlq_worker::DlqWorker;
pub use errors::IngestError;
pub use event::{DocumentEvent, DocumentEventKind, EventStore, InMemoryEventStore};
pub use orchestrator::{Breakers, PipelineOrchestrator};
pub use registry::{InMemoryProcessRegistry, ProcessRegistry};
pub use transaction::TransactionManager;
