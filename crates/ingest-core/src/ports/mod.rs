//! Trait contracts the orchestrator (C8) depends on. Concrete adapters live
//! in `ingest_adapters`/`ingest_bridge`/`ingest_progress`; the orchestrator
//! only ever sees these traits, the way `chem_core::step::StepDefinition`
//! lets the engine stay ignorant of what a step actually computes.

mod bridge;
mod extraction_cache;
mod extractor;
mod graph_store;
mod progress_hub;
mod retrieval_index;
mod validator;

pub use bridge::Bridge;
pub use extraction_cache::ExtractionCache;
pub use extractor::{ExtractionResult, Extractor};
pub use graph_store::{GraphReadStats, GraphStore, GraphTransaction};
pub use progress_hub::{ProgressEvent, ProgressHub};
pub use retrieval_index::RetrievalIndex;
pub use validator::{ValidationOutcome, Validator};
