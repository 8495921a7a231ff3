//! Entity/relationship type resolution (spec §4.7): turns an extractor's
//! free-text `raw_type_hint` into one of the pipeline's closed `CanonicalType`
//! / `SemanticType` enums.
//!
//! Resolution order, most to least specific: exact match on the normalized
//! hint, then a prefix match, then a keyword (substring) match, then a fixed
//! default. Each rung is tried in table order and the first hit wins, the
//! same "first matching rule wins, deterministically" discipline
//! `chem_policies::MaxScorePolicy` applies to tie-breaking.

use ingest_domain::{CanonicalType, SemanticType};

/// `(match-text, resulting type)` pairs, checked in order.
const ENTITY_EXACT: &[(&str, CanonicalType)] = &[
    ("equipment", CanonicalType::Equipment),
    ("machine", CanonicalType::Equipment),
    ("procedure", CanonicalType::Procedure),
    ("sop", CanonicalType::Procedure),
    ("process", CanonicalType::Process),
    ("workflow", CanonicalType::Process),
    ("location", CanonicalType::Location),
    ("site", CanonicalType::Location),
    ("safety", CanonicalType::Safety),
    ("hazard", CanonicalType::Safety),
    ("parameter", CanonicalType::Parameter),
    ("setting", CanonicalType::Parameter),
    ("consumable", CanonicalType::Consumable),
    ("ingredient", CanonicalType::Consumable),
    ("role", CanonicalType::Role),
    ("position", CanonicalType::Role),
    ("document", CanonicalType::Document),
];

const ENTITY_PREFIX: &[(&str, CanonicalType)] = &[
    ("equip", CanonicalType::Equipment),
    ("proced", CanonicalType::Procedure),
    ("proc", CanonicalType::Process),
    ("loc", CanonicalType::Location),
    ("safe", CanonicalType::Safety),
    ("param", CanonicalType::Parameter),
    ("consum", CanonicalType::Consumable),
    ("role", CanonicalType::Role),
    ("doc", CanonicalType::Document),
];

const ENTITY_KEYWORD: &[(&str, CanonicalType)] = &[
    ("machine", CanonicalType::Equipment),
    ("appliance", CanonicalType::Equipment),
    ("step", CanonicalType::Procedure),
    ("instruction", CanonicalType::Procedure),
    ("area", CanonicalType::Location),
    ("room", CanonicalType::Location),
    ("ppe", CanonicalType::Safety),
    ("temperature", CanonicalType::Parameter),
    ("pressure", CanonicalType::Parameter),
    ("food", CanonicalType::Consumable),
    ("staff", CanonicalType::Role),
    ("manager", CanonicalType::Role),
];

const RELATIONSHIP_EXACT: &[(&str, SemanticType)] = &[
    ("requires", SemanticType::Requires),
    ("part_of", SemanticType::PartOf),
    ("located_at", SemanticType::LocatedAt),
    ("uses", SemanticType::Uses),
    ("procedure_for", SemanticType::ProcedureFor),
    ("related_to", SemanticType::RelatedTo),
    ("governs", SemanticType::Governs),
    ("hazard_of", SemanticType::HazardOf),
];

const RELATIONSHIP_KEYWORD: &[(&str, SemanticType)] = &[
    ("require", SemanticType::Requires),
    ("need", SemanticType::Requires),
    ("part", SemanticType::PartOf),
    ("belongs", SemanticType::PartOf),
    ("at", SemanticType::LocatedAt),
    ("in", SemanticType::LocatedAt),
    ("use", SemanticType::Uses),
    ("operate", SemanticType::Uses),
    ("for", SemanticType::ProcedureFor),
    ("govern", SemanticType::Governs),
    ("regulate", SemanticType::Governs),
    ("hazard", SemanticType::HazardOf),
    ("risk", SemanticType::HazardOf),
];

fn normalize(hint: &str) -> String {
    hint.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Resolves an entity's `CanonicalType`, defaulting to `Other` when no rung
/// matches (spec §4.7: "an unrecognized type hint is never a hard failure").
pub fn resolve_type(raw_type_hint: Option<&str>) -> CanonicalType {
    let Some(hint) = raw_type_hint else { return CanonicalType::Other };
    let normalized = normalize(hint);
    if normalized.is_empty() {
        return CanonicalType::Other;
    }

    for (needle, ty) in ENTITY_EXACT {
        if normalized == *needle {
            return *ty;
        }
    }
    for (needle, ty) in ENTITY_PREFIX {
        if normalized.starts_with(needle) {
            return *ty;
        }
    }
    for (needle, ty) in ENTITY_KEYWORD {
        if normalized.contains(needle) {
            return *ty;
        }
    }
    CanonicalType::Other
}

/// Resolves a relationship's `SemanticType`, defaulting to `RelatedTo`
/// (spec §4.7 / §4.9's orphan-edge convention reuses the same default).
pub fn resolve_relationship_type(raw_type_hint: Option<&str>) -> SemanticType {
    let Some(hint) = raw_type_hint else { return SemanticType::RelatedTo };
    let normalized = normalize(hint);
    if normalized.is_empty() {
        return SemanticType::RelatedTo;
    }

    for (needle, ty) in RELATIONSHIP_EXACT {
        if normalized == *needle {
            return *ty;
        }
    }
    for (needle, ty) in RELATIONSHIP_KEYWORD {
        if normalized.contains(needle) {
            return *ty;
        }
    }
    SemanticType::RelatedTo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_beats_keyword() {
        // "role" matches ENTITY_EXACT directly, not the "staff" keyword rung.
        assert_eq!(resolve_type(Some("Role")), CanonicalType::Role);
    }

    #[test]
    fn prefix_matches_before_keyword() {
        assert_eq!(resolve_type(Some("equipment-class-a")), CanonicalType::Equipment);
    }

    #[test]
    fn keyword_falls_back_when_no_exact_or_prefix() {
        assert_eq!(resolve_type(Some("kitchen staff")), CanonicalType::Role);
    }

    #[test]
    fn unknown_hint_defaults_to_other() {
        assert_eq!(resolve_type(Some("xyzzy")), CanonicalType::Other);
        assert_eq!(resolve_type(None), CanonicalType::Other);
    }

    #[test]
    fn relationship_defaults_to_related_to() {
        assert_eq!(resolve_relationship_type(Some("unknown_verb")), SemanticType::RelatedTo);
        assert_eq!(resolve_relationship_type(Some("requires")), SemanticType::Requires);
    }
}
