//! ingest-pipeline: the server binary's own config layer. The domain
//! model, orchestration engine, adapters, bridge, and persistence all live
//! in the `ingest-*` workspace crates this binary wires together in
//! `main.rs`; this crate just holds the server-level settings (which
//! adapter endpoints to call) that aren't any one crate's concern.

pub mod config;

pub use config::ServerConfig;
