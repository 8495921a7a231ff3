//! End-to-end happy path (spec §8 scenario 1): a document accepted once
//! advances through every state to `Committed`, the retrieval index sees
//! exactly one upload, and the graph contains the bridged nodes/edges.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ingest_adapters::{content_hash, InMemoryExtractionCache, InMemoryGraphStore, MagicByteValidator};
use ingest_bridge::CanonicalBridge;
use ingest_core::errors::IngestError;
use ingest_core::ports::{ExtractionResult, Extractor, RetrievalIndex};
use ingest_core::{
    Breakers, IngestConfig, InMemoryDeadLetterQueue, InMemoryEventStore, InMemoryProcessRegistry, PipelineOrchestrator,
};
use ingest_domain::{DocumentState, GraphOp, Provenance, RawEntity, RawRelationship};
use ingest_progress::InMemoryProgressHub;
use uuid::Uuid;

struct FixedRetrievalIndex;

#[async_trait]
impl RetrievalIndex for FixedRetrievalIndex {
    async fn upload(&self, content_hash: &str, _source_name: &str, _bytes: &[u8]) -> Result<String, IngestError> {
        Ok(format!("R-{content_hash}"))
    }
}

struct FixedExtractor;

#[async_trait]
impl Extractor for FixedExtractor {
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

async fn wait_for_terminal<EV, V, R, E, B, G>(orchestrator: &PipelineOrchestrator<EV, V, R, E, B, G>, process_id: Uuid)
where
    EV: ingest_core::event::EventStore + 'static,
    V: ingest_core::ports::Validator + 'static,
    R: ingest_core::ports::RetrievalIndex + 'static,
    E: ingest_core::ports::Extractor + 'static,
    B: ingest_core::ports::Bridge + 'static,
    G: ingest_core::ports::GraphStore + 'static,
{
    for _ in 0..200 {
        if let Some(doc) = orchestrator.get_document(process_id) {
            if doc.state.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("process {process_id} did not reach a terminal state in time");
}

#[tokio::test]
async fn document_reaches_committed_with_bridged_graph() {
    let config = IngestConfig::default();
    let event_store = Arc::new(InMemoryEventStore::new());
    let registry = Arc::new(InMemoryProcessRegistry::new(event_store));
    let validator = Arc::new(MagicByteValidator::new());
    let retrieval_index = Arc::new(FixedRetrievalIndex);
    let extractor = Arc::new(FixedExtractor);
    let extraction_cache = Arc::new(InMemoryExtractionCache::new());
    let bridge = Arc::new(CanonicalBridge::new());
    let graph_store = InMemoryGraphStore::new();
    let graph_store_handle = graph_store.clone();
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
        progress,
        breakers,
    ));

    let bytes = b"%PDF-1.7 ice cream machine requires dairy mix".to_vec();
    let hash = content_hash(&bytes);
    let process_id = orchestrator.accept("recipe.pdf".to_string(), hash.clone(), bytes).await;

    wait_for_terminal(&orchestrator, process_id).await;

    let doc = orchestrator.get_document(process_id).expect("document record");
    assert_eq!(doc.state, DocumentState::Committed);
    assert_eq!(doc.content_hash, hash);
    assert_eq!(doc.retrieval_doc_id.as_deref(), Some(format!("R-{hash}").as_str()));
    assert!(dlq.list(true).is_empty(), "happy path should never touch the dead-letter queue");

    let ops = graph_store_handle.applied_ops();
    let node_count = ops.iter().filter(|op| matches!(op, GraphOp::MergeNode { .. })).count();
    let edge_count = ops.iter().filter(|op| matches!(op, GraphOp::MergeEdge { .. })).count();
    assert_eq!(node_count, 2, "ice cream machine + dairy mix, no orphan document node needed");
    assert_eq!(edge_count, 1, "exactly the requires edge");
}
