//! Server-level configuration: which adapter endpoints to wire. Mirrors
//! `chem_persistence::config::DbConfig::from_env`'s lazy-`.env` + `env::var`
//! pattern, generalized from a single database URL to every adapter
//! endpoint the server depends on.

use once_cell::sync::Lazy;
use std::env;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub retrieval_index_base_url: String,
    pub extractor_base_url: String,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub dlq_poll_interval_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        Self {
            retrieval_index_base_url: env::var("RETRIEVAL_INDEX_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".into()),
            extractor_base_url: env::var("EXTRACTOR_BASE_URL").unwrap_or_else(|_| "http://localhost:8082".into()),
            neo4j_uri: env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".into()),
            neo4j_user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".into()),
            neo4j_password: env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "neo4j".into()),
            dlq_poll_interval_secs: env::var("DLQ_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
        }
    }
}
