//! Extractor adapter (C5): calls an HTTP extraction backend and validates
//! its response against the `RawEntity`/`RawRelationship` shape before
//! handing it to the bridge. A response that does not parse into that shape
//! is `IngestError::ExtractionSchema`, which the DLQ (C4) treats as
//! permanent rather than retryable (spec §7) — retrying a malformed
//! response against the same backend would just reproduce it.

use std::time::Duration;

use async_trait::async_trait;
use ingest_core::errors::IngestError;
use ingest_core::ports::{ExtractionResult, Extractor};
use ingest_domain::{RawEntity, RawRelationship};
use reqwest::Client;
use serde::Deserialize;

use crate::retrieval_index::classify_reqwest_error;

#[derive(Deserialize)]
struct ExtractResponse {
    entities: Vec<RawEntity>,
    relationships: Vec<RawRelationship>,
}

pub struct HttpExtractor {
    client: Client,
    base_url: String,
}

impl HttpExtractor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().expect("reqwest client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, retrieval_doc_id: &str) -> Result<ExtractionResult, IngestError> {
        let url = format!("{}/extract/{}", self.base_url, retrieval_doc_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if response.status().is_server_error() {
            return Err(IngestError::Transient {
                kind: ingest_domain::FailureKind::Backend5xx,
                message: response.status().to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::Unknown(format!("reading extractor response: {e}")))?;

        let parsed: ExtractResponse = serde_json::from_str(&body)
            .map_err(|e| IngestError::ExtractionSchema(format!("malformed extraction response: {e}")))?;

        Ok(ExtractionResult { entities: parsed.entities, relationships: parsed.relationships })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_a_schema_error_not_transient() {
        let body = "{ not json";
        let result: Result<ExtractResponse, _> = serde_json::from_str(body);
        assert!(result.is_err());
    }
}
