//! Raw extraction output (C5) and canonical graph shapes (C7), spec §3.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Where a raw fact came from: a document id plus an optional page/region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Provenance {
    pub document_id: String,
    pub page_or_region: Option<String>,
}

/// A single entity as returned by the extractor (C5), before canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub raw_name: String,
    pub raw_type_hint: String,
    pub description: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub provenance: Provenance,
}

/// A single relationship as returned by the extractor (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelationship {
    pub source_raw_name: String,
    pub target_raw_name: String,
    pub raw_type_hint: String,
    pub description: Option<String>,
    pub provenance: Provenance,
}

/// Fixed taxonomy of canonical entity types (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalType {
    Equipment,
    Procedure,
    Process,
    Location,
    Safety,
    Parameter,
    Consumable,
    Role,
    Document,
    Other,
}

impl CanonicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalType::Equipment => "EQUIPMENT",
            CanonicalType::Procedure => "PROCEDURE",
            CanonicalType::Process => "PROCESS",
            CanonicalType::Location => "LOCATION",
            CanonicalType::Safety => "SAFETY",
            CanonicalType::Parameter => "PARAMETER",
            CanonicalType::Consumable => "CONSUMABLE",
            CanonicalType::Role => "ROLE",
            CanonicalType::Document => "DOCUMENT",
            CanonicalType::Other => "OTHER",
        }
    }
}

/// Closed set of semantic relationship types (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SemanticType {
    Requires,
    PartOf,
    LocatedAt,
    Uses,
    ProcedureFor,
    RelatedTo,
    Governs,
    HazardOf,
}

impl SemanticType {
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticType::Requires => "REQUIRES",
            SemanticType::PartOf => "PART_OF",
            SemanticType::LocatedAt => "LOCATED_AT",
            SemanticType::Uses => "USES",
            SemanticType::ProcedureFor => "PROCEDURE_FOR",
            SemanticType::RelatedTo => "RELATED_TO",
            SemanticType::Governs => "GOVERNS",
            SemanticType::HazardOf => "HAZARD_OF",
        }
    }
}

/// A deduplicated, typed node produced by the bridge (C7), spec §3.
///
/// Invariant: no two canonical entities share `(canonical_type,
/// normalized_name)` — `id` is a deterministic hash of that pair, so the
/// invariant holds by construction as long as callers always derive `id`
/// through `ingest_bridge`'s canonicalization step rather than assigning it
/// by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: String,
    pub canonical_type: CanonicalType,
    pub normalized_name: String,
    pub aliases: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    pub document_refs: BTreeSet<String>,
}

/// A deduplicated, typed edge produced by the bridge (C7), spec §3.
///
/// Invariants: `source_id != target_id` (no self-loops); at most one edge of
/// a given `semantic_type` between an ordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRelationship {
    pub source_id: String,
    pub target_id: String,
    pub semantic_type: SemanticType,
    pub document_refs: BTreeSet<String>,
}

impl CanonicalRelationship {
    /// The dedup/uniqueness key from spec §3: `(source_id, semantic_type,
    /// target_id)`.
    pub fn key(&self) -> (String, SemanticType, String) {
        (self.source_id.clone(), self.semantic_type, self.target_id.clone())
    }
}
