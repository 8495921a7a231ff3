//! Name normalization and synonym unification (spec §4.7 step 1): collapses
//! superficial spelling/casing variance and known aliases before an entity
//! name is hashed into an id, so "Ice Cream Machine" and "ice-cream machine"
//! canonicalize to the same `CanonicalEntity`.

const SYNONYMS: &[(&str, &str)] = &[
    ("soft serve machine", "ice cream machine"),
    ("soft-serve machine", "ice cream machine"),
    ("walk in cooler", "walk-in cooler"),
    ("walk in freezer", "walk-in freezer"),
    ("fry station", "fryer station"),
    ("ppe", "personal protective equipment"),
    ("sop", "standard operating procedure"),
    ("qa", "quality assurance"),
    ("fifo", "first in first out"),
];

/// Lowercases, collapses internal whitespace, and applies the synonym table.
/// Pure and total: never fails, worst case returns the trimmed-and-lowered
/// input unchanged.
pub fn normalize_name(raw_name: &str) -> String {
    let collapsed = raw_name
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    for (alias, canonical) in SYNONYMS {
        if collapsed == *alias {
            return canonical.to_string();
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_case() {
        assert_eq!(normalize_name("  Ice   Cream Machine "), "ice cream machine");
    }

    #[test]
    fn unifies_known_synonyms() {
        assert_eq!(normalize_name("Soft-Serve Machine"), "ice cream machine");
        assert_eq!(normalize_name("SOP"), "standard operating procedure");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_name("Walk In Cooler");
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
    }
}
