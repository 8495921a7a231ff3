//! Postgres (Diesel) implementations of the core's durable ports.
//!
//! Mirrors `chem_persistence::pg`: the in-memory backends in `ingest_core`
//! (`InMemoryEventStore`, `InMemoryDeadLetterQueue`) are what the demo CLI
//! and unit tests use; these are the paired Postgres backends a deployed
//! server wires in instead, against the tables declared in `crate::schema`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use serde_json::Value;
use uuid::Uuid;

use ingest_core::dlq::{DeadLetterQueue, RetryOutcome};
use ingest_core::errors::IngestError;
use ingest_core::event::{DocumentEvent, DocumentEventKind, EventStore};
use ingest_core::ports::ExtractionCache;
use ingest_core::ports::ExtractionResult;
use ingest_domain::{DlqEntry, FailureKind, OperationKind, RawEntity, RawRelationship};
use log::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{dlq_entries, document_events, extraction_cache};

/// Alias for the r2d2 pool of Postgres connections.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Abstracts obtaining a connection, so tests can stand in a fake provider
/// without pulling in r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// `ConnectionProvider` backed by a real `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
                || m.contains("could not serialize access due to concurrent update")
                || m.contains("terminating connection due to administrator command")
                || m.contains("connection closed")
                || m.contains("connection refused")
                || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retries a unit of work up to 3 times with a 15ms/30ms/45ms backoff on
/// transient errors, the same policy `chem_persistence::pg::with_retry` uses.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
where
    F: FnMut() -> Result<T, PersistenceError>,
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * (attempts + 1) as u64;
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn event_type_for(kind: &DocumentEventKind) -> &'static str {
    match kind {
        DocumentEventKind::Accepted { .. } => "accepted",
        DocumentEventKind::Validated { .. } => "validated",
        DocumentEventKind::IndexUploaded { .. } => "indexuploaded",
        DocumentEventKind::Extracted { .. } => "extracted",
        DocumentEventKind::Staged { .. } => "staged",
        DocumentEventKind::Committed => "committed",
        DocumentEventKind::RetryScheduled { .. } => "retryscheduled",
        DocumentEventKind::DeadLettered { .. } => "deadlettered",
        DocumentEventKind::Cancelled { .. } => "cancelled",
    }
}

#[derive(Queryable, Debug)]
struct EventRow {
    seq: i64,
    process_id: Uuid,
    ts: DateTime<Utc>,
    #[allow(dead_code)]
    event_type: String,
    payload: Value,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = document_events)]
struct NewEventRow<'a> {
    process_id: &'a Uuid,
    event_type: &'a str,
    payload: &'a Value,
}

fn deserialize_event(row: EventRow) -> Option<DocumentEvent> {
    let kind: DocumentEventKind = serde_json::from_value(row.payload).ok()?;
    Some(DocumentEvent { seq: row.seq as u64, process_id: row.process_id, kind, ts: row.ts })
}

/// Postgres-backed `EventStore` (C10's durable log). Append-only, ordered
/// by `seq` within a `process_id`, the same contract `InMemoryEventStore`
/// honors for tests.
pub struct PgEventStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventStore for PgEventStore<P> {
    fn append_kind(&self, process_id: Uuid, kind: DocumentEventKind) -> DocumentEvent {
        debug!("append_kind:start process_id={process_id} kind={}", event_type_for(&kind));
        let event_type = event_type_for(&kind);
        let payload = serde_json::to_value(&kind).expect("serialize DocumentEventKind");
        let inserted: (i64, DateTime<Utc>) = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(document_events::table)
                .values(NewEventRow { process_id: &process_id, event_type, payload: &payload })
                .returning((document_events::seq, document_events::ts))
                .get_result(&mut conn)
                .map_err(PersistenceError::from)
        })
        .expect("insert document event");
        DocumentEvent { seq: inserted.0 as u64, process_id, kind, ts: inserted.1 }
    }

    fn list(&self, process_id: Uuid) -> Vec<DocumentEvent> {
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            document_events::table
                .filter(document_events::process_id.eq(process_id))
                .order(document_events::seq.asc())
                .load(&mut conn)
                .map_err(PersistenceError::from)
        })
        .expect("load document events");
        rows.into_iter().filter_map(deserialize_event).collect()
    }

    fn all_process_ids(&self) -> Vec<Uuid> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            document_events::table
                .select(document_events::process_id)
                .distinct()
                .load(&mut conn)
                .map_err(PersistenceError::from)
        })
        .expect("load distinct process ids")
    }
}

fn operation_kind_str(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Extract => "extract",
        OperationKind::Upload => "upload",
        OperationKind::Commit => "commit",
    }
}

fn operation_kind_from_str(s: &str) -> OperationKind {
    match s {
        "extract" => OperationKind::Extract,
        "upload" => OperationKind::Upload,
        _ => OperationKind::Commit,
    }
}

fn failure_kind_str(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::BreakerOpen => "breaker_open",
        FailureKind::Timeout => "timeout",
        FailureKind::Backend5xx => "backend5xx",
        FailureKind::Validation => "validation",
        FailureKind::ExtractionSchema => "extraction_schema",
        FailureKind::GraphLogic => "graph_logic",
        FailureKind::Unknown => "unknown",
    }
}

fn failure_kind_from_str(s: &str) -> FailureKind {
    match s {
        "breaker_open" => FailureKind::BreakerOpen,
        "timeout" => FailureKind::Timeout,
        "backend5xx" => FailureKind::Backend5xx,
        "validation" => FailureKind::Validation,
        "extraction_schema" => FailureKind::ExtractionSchema,
        "graph_logic" => FailureKind::GraphLogic,
        _ => FailureKind::Unknown,
    }
}

#[derive(Queryable, Debug)]
struct DlqRow {
    id: Uuid,
    operation_kind: String,
    process_id: Uuid,
    payload: Value,
    failure_kind: String,
    attempt_count: i32,
    next_attempt_at: DateTime<Utc>,
    first_seen_at: DateTime<Utc>,
    last_error: String,
    terminal: bool,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = dlq_entries)]
struct NewDlqRow<'a> {
    id: &'a Uuid,
    operation_kind: &'a str,
    process_id: &'a Uuid,
    payload: &'a Value,
    failure_kind: &'a str,
    attempt_count: i32,
    next_attempt_at: DateTime<Utc>,
    first_seen_at: DateTime<Utc>,
    last_error: &'a str,
    terminal: bool,
}

impl From<DlqRow> for DlqEntry {
    fn from(row: DlqRow) -> Self {
        DlqEntry {
            id: row.id,
            operation_kind: operation_kind_from_str(&row.operation_kind),
            process_id: row.process_id,
            payload: row.payload,
            failure_kind: failure_kind_from_str(&row.failure_kind),
            attempt_count: row.attempt_count.max(0) as u32,
            next_attempt_at: row.next_attempt_at,
            first_seen_at: row.first_seen_at,
            last_error: row.last_error,
            terminal: row.terminal,
        }
    }
}

/// Postgres-backed dead-letter queue (C4). Retains the same retry/backoff
/// policy as `InMemoryDeadLetterQueue`; the scheduling math lives in
/// `ingest_policies::compute_backoff` so both backends agree.
pub struct PgDeadLetterQueue<P: ConnectionProvider> {
    provider: P,
    backoff_base: std::time::Duration,
    backoff_exponent_cap: u32,
    jitter_fraction: f64,
    max_attempts: u32,
}

impl<P: ConnectionProvider> PgDeadLetterQueue<P> {
    pub fn new(
        provider: P,
        backoff_base: std::time::Duration,
        backoff_exponent_cap: u32,
        jitter_fraction: f64,
        max_attempts: u32,
    ) -> Self {
        Self { provider, backoff_base, backoff_exponent_cap, jitter_fraction, max_attempts }
    }

    fn next_attempt_delay(&self, attempt_count: u32, seed: u64) -> chrono::Duration {
        let delay = ingest_policies::compute_backoff(
            self.backoff_base,
            self.backoff_exponent_cap,
            self.jitter_fraction,
            attempt_count,
            seed,
        );
        chrono::Duration::from_std(delay).unwrap_or_default()
    }
}

impl<P: ConnectionProvider> DeadLetterQueue for PgDeadLetterQueue<P> {
    fn push(
        &self,
        process_id: Uuid,
        operation_kind: OperationKind,
        payload: serde_json::Value,
        failure_kind: FailureKind,
        last_error: String,
    ) -> DlqEntry {
        let mut entry = DlqEntry::new(process_id, operation_kind, payload, failure_kind, last_error);
        if !entry.terminal {
            let seed = entry.id.as_u128() as u64;
            entry.next_attempt_at = Utc::now() + self.next_attempt_delay(0, seed);
        }
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(dlq_entries::table)
                .values(NewDlqRow {
                    id: &entry.id,
                    operation_kind: operation_kind_str(entry.operation_kind),
                    process_id: &entry.process_id,
                    payload: &entry.payload,
                    failure_kind: failure_kind_str(entry.failure_kind),
                    attempt_count: entry.attempt_count as i32,
                    next_attempt_at: entry.next_attempt_at,
                    first_seen_at: entry.first_seen_at,
                    last_error: &entry.last_error,
                    terminal: entry.terminal,
                })
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })
        .expect("insert dlq entry");
        entry
    }

    fn get(&self, id: Uuid) -> Option<DlqEntry> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            dlq_entries::table
                .find(id)
                .first::<DlqRow>(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        })
        .expect("load dlq entry")
        .map(DlqEntry::from)
    }

    fn list(&self, include_terminal: bool) -> Vec<DlqEntry> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let mut query = dlq_entries::table.into_boxed();
            if !include_terminal {
                query = query.filter(dlq_entries::terminal.eq(false));
            }
            query.load::<DlqRow>(&mut conn).map_err(PersistenceError::from)
        })
        .expect("list dlq entries")
        .into_iter()
        .map(DlqEntry::from)
        .collect()
    }

    fn due(&self) -> Vec<DlqEntry> {
        let now = Utc::now();
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            dlq_entries::table
                .filter(dlq_entries::terminal.eq(false))
                .filter(dlq_entries::next_attempt_at.le(now))
                .load::<DlqRow>(&mut conn)
                .map_err(PersistenceError::from)
        })
        .expect("load due dlq entries")
        .into_iter()
        .map(DlqEntry::from)
        .collect()
    }

    fn retry_now(&self, id: Uuid, force: bool) -> Result<DlqEntry, IngestError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx_conn| {
                let row: DlqRow = dlq_entries::table.find(id).first(tx_conn)?;
                let mut entry = DlqEntry::from(row);
                if entry.terminal && !force {
                    return Err(diesel::result::Error::RollbackTransaction);
                }
                entry.attempt_count += 1;
                if entry.attempt_count >= self.max_attempts && entry.failure_kind == FailureKind::Unknown {
                    entry.terminal = true;
                } else if force {
                    entry.terminal = false;
                }
                entry.next_attempt_at = Utc::now();
                diesel::update(dlq_entries::table.find(id))
                    .set((
                        dlq_entries::attempt_count.eq(entry.attempt_count as i32),
                        dlq_entries::terminal.eq(entry.terminal),
                        dlq_entries::next_attempt_at.eq(entry.next_attempt_at),
                    ))
                    .execute(tx_conn)?;
                Ok(entry)
            })
            .map_err(PersistenceError::from)
        })
        .map_err(|_| IngestError::Validation(format!("dlq entry {id} unknown or terminal without force")))
    }

    fn discard(&self, id: Uuid) -> Result<(), IngestError> {
        let affected = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(dlq_entries::table.find(id)).execute(&mut conn).map_err(PersistenceError::from)
        })
        .map_err(|e| IngestError::Unknown(e.to_string()))?;
        if affected == 0 {
            return Err(IngestError::Validation(format!("unknown dlq entry {id}")));
        }
        Ok(())
    }

    fn reschedule(&self, id: Uuid, outcome: RetryOutcome) -> Result<(), IngestError> {
        match outcome {
            RetryOutcome::Success => {
                with_retry(|| {
                    let mut conn = self.provider.connection()?;
                    diesel::delete(dlq_entries::table.find(id)).execute(&mut conn).map_err(PersistenceError::from)
                })
                .map_err(|e| IngestError::Unknown(e.to_string()))?;
                Ok(())
            }
            RetryOutcome::PermanentFailure => {
                with_retry(|| {
                    let mut conn = self.provider.connection()?;
                    diesel::update(dlq_entries::table.find(id))
                        .set(dlq_entries::terminal.eq(true))
                        .execute(&mut conn)
                        .map_err(PersistenceError::from)
                })
                .map_err(|e| IngestError::Unknown(e.to_string()))?;
                Ok(())
            }
            RetryOutcome::TransientFailure => {
                let entry = self.get(id).ok_or_else(|| IngestError::Validation(format!("unknown dlq entry {id}")))?;
                if entry.failure_kind == FailureKind::BreakerOpen {
                    let next = Utc::now() + chrono::Duration::seconds(1);
                    with_retry(|| {
                        let mut conn = self.provider.connection()?;
                        diesel::update(dlq_entries::table.find(id))
                            .set(dlq_entries::next_attempt_at.eq(next))
                            .execute(&mut conn)
                            .map_err(PersistenceError::from)
                    })
                    .map_err(|e| IngestError::Unknown(e.to_string()))?;
                    return Ok(());
                }
                let attempt_count = entry.attempt_count + 1;
                let terminal = entry.failure_kind == FailureKind::Unknown && attempt_count >= self.max_attempts;
                let seed = entry.id.as_u128() as u64 ^ attempt_count as u64;
                let next_attempt_at = if terminal {
                    entry.next_attempt_at
                } else {
                    Utc::now() + self.next_attempt_delay(attempt_count, seed)
                };
                with_retry(|| {
                    let mut conn = self.provider.connection()?;
                    diesel::update(dlq_entries::table.find(id))
                        .set((
                            dlq_entries::attempt_count.eq(attempt_count as i32),
                            dlq_entries::terminal.eq(terminal),
                            dlq_entries::next_attempt_at.eq(next_attempt_at),
                        ))
                        .execute(&mut conn)
                        .map_err(PersistenceError::from)
                })
                .map_err(|e| IngestError::Unknown(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(Queryable, Debug)]
struct CacheRow {
    #[allow(dead_code)]
    content_hash: String,
    response: Value,
    #[allow(dead_code)]
    cached_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = extraction_cache)]
struct NewCacheRow<'a> {
    content_hash: &'a str,
    response: &'a Value,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CachedExtraction {
    entities: Vec<RawEntity>,
    relationships: Vec<RawRelationship>,
}

/// Postgres-backed extraction cache (spec §4.5). `ExtractionCache` is an
/// async port because the orchestrator awaits it alongside the other
/// adapters; the Diesel call underneath is synchronous like every other
/// backend in this module, same bridge `chem_core`'s async steps make
/// around blocking adapter calls.
pub struct PgExtractionCache<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgExtractionCache<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl<P: ConnectionProvider> ExtractionCache for PgExtractionCache<P> {
    async fn get(&self, content_hash: &str) -> Result<Option<ExtractionResult>, IngestError> {
        let row: Option<CacheRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            extraction_cache::table
                .find(content_hash)
                .first(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        })
        .map_err(|e| IngestError::Unknown(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let cached: CachedExtraction = serde_json::from_value(row.response)
            .map_err(|e| IngestError::Unknown(format!("corrupt extraction cache row: {e}")))?;
        Ok(Some(ExtractionResult { entities: cached.entities, relationships: cached.relationships }))
    }

    async fn put(
        &self,
        content_hash: &str,
        entities: &[RawEntity],
        relationships: &[RawRelationship],
    ) -> Result<(), IngestError> {
        let payload = serde_json::to_value(CachedExtraction {
            entities: entities.to_vec(),
            relationships: relationships.to_vec(),
        })
        .expect("serialize cached extraction");
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(extraction_cache::table)
                .values(NewCacheRow { content_hash, response: &payload })
                .on_conflict(extraction_cache::content_hash)
                .do_update()
                .set(extraction_cache::response.eq(&payload))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })
        .map_err(|e| IngestError::Unknown(e.to_string()))?;
        Ok(())
    }
}

/// Builds an r2d2 pool and runs pending migrations against it once.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1).max(validated_min);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .min_idle(Some(validated_min))
        .max_size(validated_max)
        .build(manager)
        .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Development convenience: loads `.env`, reads `DATABASE_URL` and pool size
/// env vars, and builds an already-migrated pool.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
