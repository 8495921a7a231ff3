//! RetrievalIndex adapter (C6): uploads validated bytes to an HTTP
//! retrieval/search backend, idempotent by `content_hash`.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use ingest_core::errors::IngestError;
use ingest_core::ports::RetrievalIndex;
use ingest_domain::FailureKind;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize)]
struct UploadResponse {
    doc_id: String,
}

pub struct HttpRetrievalIndex {
    client: Client,
    base_url: String,
    /// content_hash -> retrieval_doc_id. Upload is idempotent even across a
    /// retried document, since the remote side is assumed to accept the
    /// same hash twice; this cache simply avoids the round trip.
    seen: DashMap<String, String>,
}

impl HttpRetrievalIndex {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().expect("reqwest client"),
            base_url: base_url.into(),
            seen: DashMap::new(),
        }
    }
}

#[async_trait]
impl RetrievalIndex for HttpRetrievalIndex {
    async fn upload(&self, content_hash: &str, source_name: &str, bytes: &[u8]) -> Result<String, IngestError> {
        if let Some(cached) = self.seen.get(content_hash) {
            debug!("retrieval upload short-circuited for content_hash={content_hash}");
            return Ok(cached.clone());
        }

        let url = format!("{}/documents", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("content_hash", content_hash), ("source_name", source_name)])
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if response.status().is_server_error() {
            return Err(IngestError::Transient { kind: FailureKind::Backend5xx, message: response.status().to_string() });
        }
        if !response.status().is_success() {
            return Err(IngestError::Validation(format!("retrieval index rejected upload: {}", response.status())));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| IngestError::Unknown(format!("malformed retrieval index response: {e}")))?;

        self.seen.insert(content_hash.to_string(), parsed.doc_id.clone());
        Ok(parsed.doc_id)
    }
}

pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> IngestError {
    if e.is_timeout() {
        IngestError::Transient { kind: FailureKind::Timeout, message: e.to_string() }
    } else if e.is_connect() {
        IngestError::Transient { kind: FailureKind::Backend5xx, message: e.to_string() }
    } else {
        IngestError::Unknown(e.to_string())
    }
}
