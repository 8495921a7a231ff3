//! ingest-server: wires the document ingestion pipeline's real adapters
//! (HTTP retrieval index/extractor, Neo4j graph store) to the orchestration
//! engine, the way `chem-gl-chemflow`'s root binary wires its flow engine.
//!
//! No HTTP surface is started here (spec's Non-goals exclude one) — this is
//! the wiring a real front door would sit behind. Behind the `pg_demo`
//! feature, the event log, dead-letter queue, and extraction cache are
//! backed by Postgres instead of the in-memory defaults; the adapters,
//! bridge, and breakers are unchanged either way.

use std::sync::Arc;
use std::time::Duration;

use ingest_adapters::{content_hash, HttpExtractor, HttpRetrievalIndex, MagicByteValidator, Neo4jGraphStore};
use ingest_bridge::CanonicalBridge;
use ingest_core::{Breakers, DlqWorker, IngestConfig, InMemoryProcessRegistry, PipelineOrchestrator};
use ingest_pipeline::ServerConfig;
use ingest_progress::InMemoryProgressHub;

#[tokio::main]
async fn main() {
    env_logger::init();
    run().await;
}

#[cfg(not(feature = "pg_demo"))]
async fn run() {
    use ingest_adapters::InMemoryExtractionCache;
    use ingest_core::{InMemoryDeadLetterQueue, InMemoryEventStore};

    log::info!("ingest-server starting (in-memory persistence; enable `pg_demo` for Postgres)");
    let server_config = ServerConfig::from_env();
    let config = IngestConfig::from_env();

    let event_store = Arc::new(InMemoryEventStore::new());
    let registry = Arc::new(InMemoryProcessRegistry::new(event_store));
    let dlq = Arc::new(InMemoryDeadLetterQueue::new(
        config.dlq_backoff_base,
        config.dlq_backoff_exponent_cap,
        config.dlq_jitter_fraction,
        config.dlq_max_attempts,
    ));
    let extraction_cache = Arc::new(InMemoryExtractionCache::new());

    run_with_backends(server_config, config, registry, dlq, extraction_cache).await;
}

#[cfg(feature = "pg_demo")]
async fn run() {
    use ingest_persistence::{build_dev_pool_from_env, PgDeadLetterQueue, PgEventStore, PgExtractionCache, PoolProvider};

    log::info!("ingest-server starting (Postgres-backed persistence)");
    let server_config = ServerConfig::from_env();
    let config = IngestConfig::from_env();

    let pool = build_dev_pool_from_env().expect("build postgres pool");
    let event_store = Arc::new(PgEventStore::new(PoolProvider { pool: pool.clone() }));
    let registry = Arc::new(InMemoryProcessRegistry::new(event_store));
    let dlq = Arc::new(PgDeadLetterQueue::new(
        PoolProvider { pool: pool.clone() },
        config.dlq_backoff_base,
        config.dlq_backoff_exponent_cap,
        config.dlq_jitter_fraction,
        config.dlq_max_attempts,
    ));
    let extraction_cache = Arc::new(PgExtractionCache::new(PoolProvider { pool }));

    run_with_backends(server_config, config, registry, dlq, extraction_cache).await;
}

/// Shared wiring for both persistence backends: real HTTP/Neo4j adapters,
/// the bridge, breakers, and one end-to-end smoke-test document.
async fn run_with_backends<EV, D, C>(
    server_config: ServerConfig,
    config: IngestConfig,
    registry: Arc<InMemoryProcessRegistry<EV>>,
    dlq: Arc<D>,
    extraction_cache: Arc<C>,
) where
    EV: ingest_core::event::EventStore + 'static,
    D: ingest_core::dlq::DeadLetterQueue + 'static,
    C: ingest_core::ports::ExtractionCache + 'static,
{
    let validator = Arc::new(MagicByteValidator::new());
    let retrieval_index = Arc::new(HttpRetrievalIndex::new(
        server_config.retrieval_index_base_url.clone(),
        config.adapter_timeout,
    ));
    let extractor = Arc::new(HttpExtractor::new(server_config.extractor_base_url.clone(), config.adapter_timeout));
    let bridge = Arc::new(CanonicalBridge::with_other_fraction_warn(config.bridge_other_fraction_warn));
    let graph_store = match Neo4jGraphStore::connect(
        &server_config.neo4j_uri,
        &server_config.neo4j_user,
        &server_config.neo4j_password,
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            log::error!("failed to connect to neo4j at {}: {e}", server_config.neo4j_uri);
            return;
        }
    };
    let progress = Arc::new(InMemoryProgressHub::new());
    let breakers = Arc::new(Breakers::new(&config));

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        config,
        registry,
        validator,
        retrieval_index,
        extractor,
        extraction_cache,
        bridge,
        graph_store,
        dlq.clone(),
        progress.clone(),
        breakers,
    ));

    let _dlq_worker = DlqWorker::new(
        Arc::clone(&orchestrator),
        dlq,
        Duration::from_secs(server_config.dlq_poll_interval_secs),
    )
    .spawn();

    let bytes = b"%PDF-1.7 startup smoke test document".to_vec();
    let hash = content_hash(&bytes);
    let process_id = orchestrator.accept("startup-smoke-test.pdf".to_string(), hash, bytes).await;
    log::info!("accepted smoke-test document process_id={process_id}");
}
