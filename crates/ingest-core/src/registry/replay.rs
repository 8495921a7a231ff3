//! Pure replay: fold a `DocumentEvent` stream into a `Document`.
//!
//! Generalizes `chem_core::repo::types::InMemoryFlowRepository::load`'s
//! linear-replay shape from step slots to the document state machine.
//! `Accepted` must be the first event; callers that violate this get an
//! empty-ish `Document` back rather than a panic, matching the teacher's
//! "ignore inconsistent events to preserve invariants" stance on malformed
//! replays.

use ingest_domain::{Document, DocumentState};

use crate::event::{DocumentEvent, DocumentEventKind};

pub fn replay(events: &[DocumentEvent]) -> Option<Document> {
    let mut iter = events.iter();
    let first = iter.next()?;
    let (process_id, source_name, content_hash, size) = match &first.kind {
        DocumentEventKind::Accepted { source_name, content_hash, size } => {
            (first.process_id, source_name.clone(), content_hash.clone(), *size)
        }
        _ => return None,
    };

    let mut doc = Document::new(process_id, source_name, content_hash, size);
    doc.created_at = first.ts;
    doc.updated_at = first.ts;

    for ev in events.iter().skip(1) {
        doc.updated_at = ev.ts;
        match &ev.kind {
            DocumentEventKind::Accepted { .. } => {
                // Malformed: a second Accepted for the same process_id.
                // Ignored to preserve the single-origin invariant.
            }
            DocumentEventKind::Validated { format } => {
                doc.detected_format = Some(*format);
                doc.state = DocumentState::Validated;
            }
            DocumentEventKind::IndexUploaded { retrieval_doc_id } => {
                doc.retrieval_doc_id = Some(retrieval_doc_id.clone());
                doc.state = DocumentState::IndexUploaded;
            }
            DocumentEventKind::Extracted { .. } => {
                doc.state = DocumentState::Extracted;
            }
            DocumentEventKind::Staged { .. } => {
                doc.state = DocumentState::Staged;
            }
            DocumentEventKind::Committed => {
                doc.state = DocumentState::Committed;
            }
            DocumentEventKind::RetryScheduled { attempt, reason, .. } => {
                doc.attempts = *attempt;
                doc.last_error = Some(reason.clone());
                doc.state = DocumentState::RetryScheduled;
            }
            DocumentEventKind::DeadLettered { reason, .. } => {
                doc.last_error = Some(reason.clone());
                doc.state = DocumentState::DeadLettered;
            }
            DocumentEventKind::Cancelled { reason } => {
                doc.last_error = Some(reason.clone());
                doc.state = DocumentState::Cancelled;
            }
        }
    }

    Some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ingest_domain::DocumentFormat;
    use uuid::Uuid;

    fn ev(process_id: uuid::Uuid, seq: u64, kind: DocumentEventKind) -> DocumentEvent {
        DocumentEvent { seq, process_id, kind, ts: Utc::now() }
    }

    #[test]
    fn replay_reconstructs_happy_path() {
        let pid = Uuid::new_v4();
        let events = vec![
            ev(pid, 0, DocumentEventKind::Accepted {
                source_name: "menu.pdf".into(),
                content_hash: "abc".into(),
                size: 1024,
            }),
            ev(pid, 1, DocumentEventKind::Validated { format: DocumentFormat::Pdf }),
            ev(pid, 2, DocumentEventKind::IndexUploaded { retrieval_doc_id: "r1".into() }),
            ev(pid, 3, DocumentEventKind::Extracted { entity_count: 3, relationship_count: 2 }),
            ev(pid, 4, DocumentEventKind::Staged { node_count: 3, edge_count: 2 }),
            ev(pid, 5, DocumentEventKind::Committed),
        ];
        let doc = replay(&events).unwrap();
        assert_eq!(doc.state, DocumentState::Committed);
        assert_eq!(doc.detected_format, Some(DocumentFormat::Pdf));
        assert_eq!(doc.retrieval_doc_id.as_deref(), Some("r1"));
    }

    #[test]
    fn replay_without_leading_accepted_returns_none() {
        let pid = Uuid::new_v4();
        let events = vec![ev(pid, 0, DocumentEventKind::Committed)];
        assert!(replay(&events).is_none());
    }

    #[test]
    fn replay_empty_returns_none() {
        assert!(replay(&[]).is_none());
    }
}
