//! In-memory `ExtractionCache` (spec §4.5): a test/demo double for the
//! durable `ingest_persistence::PgExtractionCache`, same `DashMap` keyed-map
//! shape `HttpRetrievalIndex::seen` uses for its own hash-idempotence.

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_core::errors::IngestError;
use ingest_core::ports::{ExtractionCache, ExtractionResult};
use ingest_domain::{RawEntity, RawRelationship};

#[derive(Default)]
pub struct InMemoryExtractionCache {
    entries: DashMap<String, ExtractionResult>,
}

impl InMemoryExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtractionCache for InMemoryExtractionCache {
    async fn get(&self, content_hash: &str) -> Result<Option<ExtractionResult>, IngestError> {
        Ok(self.entries.get(content_hash).map(|e| e.clone()))
    }

    async fn put(
        &self,
        content_hash: &str,
        entities: &[RawEntity],
        relationships: &[RawRelationship],
    ) -> Result<(), IngestError> {
        self.entries.insert(
            content_hash.to_string(),
            ExtractionResult { entities: entities.to_vec(), relationships: relationships.to_vec() },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain::Provenance;

    fn entity() -> RawEntity {
        RawEntity {
            raw_name: "Fryer".into(),
            raw_type_hint: "equipment".into(),
            description: None,
            attributes: Default::default(),
            provenance: Provenance { document_id: "R1".into(), page_or_region: None },
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = InMemoryExtractionCache::new();
        cache.put("h1", &[entity()], &[]).await.unwrap();
        let hit = cache.get("h1").await.unwrap().unwrap();
        assert_eq!(hit.entities.len(), 1);
        assert!(cache.get("missing").await.unwrap().is_none());
    }
}
