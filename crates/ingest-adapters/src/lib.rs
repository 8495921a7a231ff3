//! ingest-adapters: concrete, I/O-performing implementations of the
//! `ingest_core::ports` contracts — the Neo4j graph store, HTTP extractor
//! and retrieval index, and the magic-byte validator.

pub mod content_hash;
pub mod extraction_cache;
pub mod extractor;
pub mod graph_store;
pub mod retrieval_index;
pub mod validator;

pub use content_hash::content_hash;
pub use extraction_cache::InMemoryExtractionCache;
pub use extractor::HttpExtractor;
pub use graph_store::{InMemoryGraphStore, Neo4jGraphStore};
pub use retrieval_index::HttpRetrievalIndex;
pub use validator::MagicByteValidator;
