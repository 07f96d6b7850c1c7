//! Deterministic billing rules engine.
//!
//! Every function here is a pure, total function of its inputs: no I/O, no
//! shared state, safe to call concurrently from request handlers.

use serde::{Deserialize, Serialize};

pub mod destruction;
pub mod excision;
pub mod ncci;
pub mod procedures;
pub mod repair;

/// One row of a tier table: the largest value this tier covers, and the
/// code/wRVU it resolves to. Tables are ordered ascending; the top tier
/// uses `f64::INFINITY`.
#[derive(Debug, Clone, Copy)]
pub struct TierEntry {
    pub upper_bound: f64,
    pub code: &'static str,
    pub wrvu: f64,
}

/// Resolve a measured value against an ascending tier table.
///
/// Returns the first entry whose bound covers the value, or the last
/// (open-ended) entry if the value exceeds all bounds. Callers decide what
/// zero means; a count of zero is "procedure not performed" for the
/// count-based engines and is handled before resolution.
pub fn resolve_tier(value: f64, table: &'static [TierEntry]) -> &'static TierEntry {
    for entry in table {
        if value <= entry.upper_bound {
            return entry;
        }
    }
    table
        .last()
        .expect("tier tables are non-empty static data")
}

/// A code billed for some number of units, with the total wRVU those units
/// carry (add-on entries cover `units` lesions at the per-unit rate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeUnits {
    pub code: &'static str,
    pub units: u32,
    pub wrvu: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairComplexity {
    Simple,
    Intermediate,
    Complex,
}

/// Anatomic grouping used to select among parallel repair tier tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnatomicGroup {
    /// Scalp, neck, axillae, trunk, extremities.
    #[serde(rename = "scalp_neck_trunk_extremities")]
    Group1,
    /// Face, ears, eyelids, nose, lips, mucous membrane.
    #[serde(rename = "face_ears_eyelids_nose_lips")]
    Group2,
}

const GROUP_2_TERMS: &[&str] = &[
    "face",
    "ear",
    "eyelid",
    "nose",
    "lip",
    "cheek",
    "chin",
    "forehead",
    "temple",
    "periorbital",
    "perioral",
    "mucos",
    "vermilion",
    "nasal",
    "auricular",
];

const FACE_TERMS: &[&str] = &[
    "face",
    "ear",
    "eyelid",
    "nose",
    "lip",
    "cheek",
    "chin",
    "forehead",
    "temple",
    "periorbital",
];

/// Case-insensitive keyword match over the words of a site description.
///
/// Matches on word prefixes, not raw substrings: "ears" and "earlobe"
/// match "ear" but "forearm" does not.
pub(crate) fn site_matches(site: &str, terms: &[&str]) -> bool {
    let site = site.to_lowercase();
    site.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| terms.iter().any(|term| word.starts_with(term)))
}

/// Classify a body-site description into a repair aggregation group.
///
/// Total: any string classifies, defaulting to Group1.
pub fn classify_anatomic_group(site: &str) -> AnatomicGroup {
    if site_matches(site, GROUP_2_TERMS) {
        AnatomicGroup::Group2
    } else {
        AnatomicGroup::Group1
    }
}

/// Whether a site selects the face/ears/eyelids excision tables.
pub fn is_face_site(site: &str) -> bool {
    site_matches(site, FACE_TERMS)
}

/// Chronic conditions qualifying for the G2211 visit-complexity add-on.
pub const CHRONIC_CONDITIONS: &[&str] = &[
    "psoriasis",
    "eczema",
    "atopic dermatitis",
    "rosacea",
    "acne",
    "hidradenitis",
    "alopecia",
    "vitiligo",
    "seborrheic dermatitis",
    "chronic urticaria",
    "lichen planus",
    "lichen sclerosus",
    "morphea",
    "scleroderma",
    "dermatomyositis",
    "lupus",
    "pemphigus",
    "pemphigoid",
    "epidermolysis bullosa",
    "ichthyosis",
    "xeroderma pigmentosum",
    "mycosis fungoides",
    "cutaneous lymphoma",
    "prurigo nodularis",
    "chronic pruritus",
];

/// True if any diagnosis contains a chronic-condition term
/// (case-insensitive substring match).
pub fn is_g2211_eligible(diagnoses: &[String]) -> bool {
    diagnoses.iter().any(|diagnosis| {
        let diagnosis = diagnosis.to_lowercase();
        CHRONIC_CONDITIONS
            .iter()
            .any(|chronic| diagnosis.contains(chronic))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[TierEntry] = &[
        TierEntry {
            upper_bound: 2.5,
            code: "A",
            wrvu: 1.0,
        },
        TierEntry {
            upper_bound: 7.5,
            code: "B",
            wrvu: 2.0,
        },
        TierEntry {
            upper_bound: f64::INFINITY,
            code: "C",
            wrvu: 3.0,
        },
    ];

    #[test]
    fn tier_resolution_picks_first_covering_bound() {
        assert_eq!(resolve_tier(1.0, TABLE).code, "A");
        assert_eq!(resolve_tier(2.5, TABLE).code, "A");
        assert_eq!(resolve_tier(2.6, TABLE).code, "B");
        assert_eq!(resolve_tier(100.0, TABLE).code, "C");
    }

    #[test]
    fn anatomic_grouping_is_total_and_keyword_driven() {
        assert_eq!(classify_anatomic_group("left nasal ala"), AnatomicGroup::Group2);
        assert_eq!(classify_anatomic_group("Right Cheek"), AnatomicGroup::Group2);
        assert_eq!(classify_anatomic_group("left forearm"), AnatomicGroup::Group1);
        assert_eq!(classify_anatomic_group("scalp"), AnatomicGroup::Group1);
        assert_eq!(classify_anatomic_group(""), AnatomicGroup::Group1);
    }

    #[test]
    fn face_site_check_matches_excision_table_keywords() {
        assert!(is_face_site("right lower eyelid"));
        assert!(!is_face_site("mid back"));
    }

    #[test]
    fn g2211_uses_substring_matching() {
        assert!(is_g2211_eligible(&[
            "chronic plaque psoriasis".to_string(),
            "seasonal rhinitis".to_string(),
        ]));
        // "contact dermatitis" is not in the chronic vocabulary; the acute
        // qualifier is irrelevant to the match.
        assert!(!is_g2211_eligible(&[
            "acute contact dermatitis, resolved".to_string()
        ]));
        assert!(is_g2211_eligible(&["Atopic Dermatitis, flaring".to_string()]));
        assert!(!is_g2211_eligible(&[]));
    }
}
