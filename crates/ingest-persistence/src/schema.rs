//! Diesel schema, hand-written the way `chem_persistence::schema` is
//! (replaceable with `diesel print-schema` against a live database).
//!
//! - `document_events`: append-only log backing the `ProcessRegistry` (C10),
//!   one row per `DocumentEvent`, PK'd by `seq`.
//! - `dlq_entries`: the dead-letter queue (C4)'s durable backing store.
//! - `extraction_cache`: extractor responses keyed by `content_hash`, so a
//!   retried document after `IndexUploaded` does not re-pay for extraction.

diesel::table! {
    document_events (seq) {
        seq -> BigInt,
        process_id -> Uuid,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}

diesel::table! {
    dlq_entries (id) {
        id -> Uuid,
        operation_kind -> Text,
        process_id -> Uuid,
        payload -> Jsonb,
        failure_kind -> Text,
        attempt_count -> Integer,
        next_attempt_at -> Timestamptz,
        first_seen_at -> Timestamptz,
        last_error -> Text,
        terminal -> Bool,
    }
}

diesel::table! {
    extraction_cache (content_hash) {
        content_hash -> Text,
        response -> Jsonb,
        cached_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(document_events, dlq_entries, extraction_cache,);
