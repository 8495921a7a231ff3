//! ingest-cli: a demo binary wiring the full document ingestion pipeline
//! end to end over in-memory adapters, the same role `chem-cli` plays for
//! the chemistry flow engine. Not a server (spec's Non-goals exclude an
//! HTTP surface) — it accepts one document, watches it progress, and prints
//! the Admin API's view of the DLQ before exiting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ingest_adapters::{content_hash, InMemoryExtractionCache, InMemoryGraphStore, MagicByteValidator};
use ingest_bridge::CanonicalBridge;
use ingest_core::errors::IngestError;
use ingest_core::ports::{ExtractionResult, Extractor, RetrievalIndex};
use ingest_core::{
    Breakers, DlqWorker, IngestConfig, InMemoryDeadLetterQueue, InMemoryEventStore, InMemoryProcessRegistry,
    PipelineOrchestrator,
};
use ingest_domain::{Provenance, RawEntity, RawRelationship};
use ingest_progress::InMemoryProgressHub;
use uuid::Uuid;

/// Toy `RetrievalIndex`: no network, just mints a doc id from the hash.
/// Stands in for `ingest_adapters::HttpRetrievalIndex`, the same way
/// `chem-cli`'s `SimpleSource` stands in for a real step.
struct DemoRetrievalIndex;

#[async_trait]
impl RetrievalIndex for DemoRetrievalIndex {
    async fn upload(&self, content_hash: &str, _source_name: &str, _bytes: &[u8]) -> Result<String, IngestError> {
        Ok(format!("demo-doc-{content_hash}"))
    }
}

/// Toy `Extractor`: returns one equipment entity and one consumable entity
/// joined by a fixed relationship, regardless of the document's contents.
struct DemoExtractor;

#[async_trait]
impl Extractor for DemoExtractor {
    async fn extract(&self, retrieval_doc_id: &str) -> Result<ExtractionResult, IngestError> {
        let provenance = Provenance { document_id: retrieval_doc_id.to_string(), page_or_region: None };
        let entities = vec![
            RawEntity {
                raw_name: "Ice Cream Machine".into(),
                raw_type_hint: "equipment".into(),
                description: None,
                attributes: Default::default(),
                provenance: provenance.clone(),
            },
            RawEntity {
                raw_name: "Dairy Mix".into(),
                raw_type_hint: "consumable".into(),
                description: None,
                attributes: Default::default(),
                provenance: provenance.clone(),
            },
        ];
        let relationships = vec![RawRelationship {
            source_raw_name: "Ice Cream Machine".into(),
            target_raw_name: "Dairy Mix".into(),
            raw_type_hint: "requires".into(),
            description: None,
            provenance,
        }];
        Ok(ExtractionResult { entities, relationships })
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("ingest-cli: document ingestion pipeline demo");

    let config = IngestConfig::default();
    let event_store = Arc::new(InMemoryEventStore::new());
    let registry = Arc::new(InMemoryProcessRegistry::new(event_store));
    let validator = Arc::new(MagicByteValidator::new());
    let retrieval_index = Arc::new(DemoRetrievalIndex);
    let extractor = Arc::new(DemoExtractor);
    let extraction_cache = Arc::new(InMemoryExtractionCache::new());
    let bridge = Arc::new(CanonicalBridge::with_other_fraction_warn(config.bridge_other_fraction_warn));
    let graph_store = InMemoryGraphStore::new();
    let dlq = Arc::new(InMemoryDeadLetterQueue::new(
        config.dlq_backoff_base,
        config.dlq_backoff_exponent_cap,
        config.dlq_jitter_fraction,
        config.dlq_max_attempts,
    ));
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

    let _dlq_worker = DlqWorker::new(Arc::clone(&orchestrator), dlq.clone(), Duration::from_secs(5)).spawn();

    let mut events = progress.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("progress: process_id={} state={:?}", event.process_id, event.state);
        }
    });

    let bytes = b"%PDF-1.7 ice cream machine requires dairy mix".to_vec();
    let hash = content_hash(&bytes);
    let process_id = orchestrator.accept("demo-recipe.pdf".to_string(), hash, bytes).await;
    println!("accepted process_id={process_id}");

    wait_for_terminal(&orchestrator, process_id).await;

    match orchestrator.get_document(process_id) {
        Some(doc) => println!("final state: {:?}", doc.state),
        None => println!("document record missing for {process_id}"),
    }

    let dlq_entries = orchestrator.dlq_list(true);
    println!("dlq entries: {}", dlq_entries.len());
    for entry in &dlq_entries {
        println!(
            "  id={} process_id={} failure_kind={:?} terminal={}",
            entry.id, entry.process_id, entry.failure_kind, entry.terminal
        );
    }
}

async fn wait_for_terminal<EV, V, R, E, B, G>(orchestrator: &PipelineOrchestrator<EV, V, R, E, B, G>, process_id: Uuid)
where
    EV: ingest_core::event::EventStore + 'static,
    V: ingest_core::ports::Validator + 'static,
    R: ingest_core::ports::RetrievalIndex + 'static,
    E: ingest_core::ports::Extractor + 'static,
    B: ingest_core::ports::Bridge + 'static,
    G: ingest_core::ports::GraphStore + 'static,
{
    for _ in 0..100 {
        if let Some(doc) = orchestrator.get_document(process_id) {
            if doc.state.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
