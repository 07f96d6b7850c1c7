//! NCCI bundling checks and modifier logic.
//!
//! The edit table is a closed, explicit association list: extending it
//! means adding rows, not new code paths.

use serde::Serialize;

/// Outcome of checking a code pair for an NCCI edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NcciDecision {
    /// The pair may be billed together once this modifier is appended.
    Modifier(&'static str),
    /// One code is a recognized add-on to the other; bill together without
    /// a separating modifier.
    Addon,
    /// Cannot unbundle; do not bill both.
    CannotUnbundle,
    /// No known interaction; safe to bill both.
    NoEdit,
}

const NCCI_BUNDLES: &[(&str, &str, NcciDecision)] = &[
    // E/M with a same-day procedure needs -25 to unbundle.
    ("99213", "17000", NcciDecision::Modifier("25")),
    ("99214", "17000", NcciDecision::Modifier("25")),
    ("99215", "17000", NcciDecision::Modifier("25")),
    ("99213", "11102", NcciDecision::Modifier("25")),
    ("99214", "11102", NcciDecision::Modifier("25")),
    ("99215", "11102", NcciDecision::Modifier("25")),
    ("99213", "11104", NcciDecision::Modifier("25")),
    ("99214", "11104", NcciDecision::Modifier("25")),
    ("99215", "11104", NcciDecision::Modifier("25")),
    // Simple repair bundles into the excision at the same site.
    ("12001", "11400", NcciDecision::CannotUnbundle),
    ("12001", "11401", NcciDecision::CannotUnbundle),
    // First-unit codes and their additional-unit add-ons.
    ("17000", "17003", NcciDecision::Addon),
    ("11102", "11103", NcciDecision::Addon),
    ("11104", "11105", NcciDecision::Addon),
    ("11106", "11107", NcciDecision::Addon),
    ("11200", "11201", NcciDecision::Addon),
    ("13102", "13120", NcciDecision::Addon),
];

/// Look up a code pair in the edit table, order-independently. Unknown
/// pairs are safe to bill together.
pub fn check_ncci_edit(code1: &str, code2: &str) -> NcciDecision {
    for (a, b, decision) in NCCI_BUNDLES {
        if (*a == code1 && *b == code2) || (*a == code2 && *b == code1) {
            return *decision;
        }
    }
    NcciDecision::NoEdit
}

pub const EM_CODES: &[&str] = &[
    "99202", "99203", "99204", "99205", "99211", "99212", "99213", "99214", "99215",
];

pub fn is_em_code(code: &str) -> bool {
    EM_CODES.contains(&code)
}

/// Whether an E/M code needs -25 when billed alongside procedures.
///
/// Deliberately permissive: any accompanying procedure triggers the
/// modifier, since under-applying -25 forfeits legitimate revenue.
pub fn needs_modifier_25(em_code: &str, procedure_codes: &[&str]) -> bool {
    if !is_em_code(em_code) {
        return false;
    }
    for proc_code in procedure_codes {
        if check_ncci_edit(em_code, proc_code) == NcciDecision::Modifier("25") {
            return true;
        }
    }
    !procedure_codes.is_empty()
}

/// Usage guidance for a billing modifier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModifierGuidance {
    pub modifier: &'static str,
    pub name: &'static str,
    pub use_when: &'static str,
    pub document: &'static str,
    pub audit_risk: &'static str,
}

const MODIFIER_GUIDANCE: &[ModifierGuidance] = &[
    ModifierGuidance {
        modifier: "25",
        name: "Significant, Separately Identifiable E/M",
        use_when: "E/M represents substantial, separate work beyond the procedure decision",
        document: "Clearly document E/M work separate from the procedure",
        audit_risk: "HIGH - most audited modifier",
    },
    ModifierGuidance {
        modifier: "59",
        name: "Distinct Procedural Service",
        use_when: "Different site, organ system, incision, or encounter",
        document: "Document the distinct nature of each procedure",
        audit_risk: "MEDIUM-HIGH - CMS prefers the X modifiers",
    },
    ModifierGuidance {
        modifier: "XE",
        name: "Separate Encounter",
        use_when: "Service occurred during a separate encounter on the same day",
        document: "Document separate encounter times",
        audit_risk: "LOW - more specific than -59",
    },
    ModifierGuidance {
        modifier: "XS",
        name: "Separate Structure",
        use_when: "Different anatomic structure",
        document: "Document the specific anatomic structures",
        audit_risk: "LOW",
    },
    ModifierGuidance {
        modifier: "50",
        name: "Bilateral Procedure",
        use_when: "Same procedure performed on both sides",
        document: "Document the bilateral nature",
        audit_risk: "LOW",
    },
];

const UNKNOWN_GUIDANCE: ModifierGuidance = ModifierGuidance {
    modifier: "",
    name: "Unknown",
    use_when: "",
    document: "",
    audit_risk: "Unknown",
};

/// Static guidance lookup. Unknown modifiers return a sentinel record
/// rather than erroring.
pub fn modifier_guidance(modifier: &str) -> &'static ModifierGuidance {
    let modifier = modifier.trim_start_matches('-');
    MODIFIER_GUIDANCE
        .iter()
        .find(|g| g.modifier == modifier)
        .unwrap_or(&UNKNOWN_GUIDANCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn em_with_destruction_needs_25() {
        assert_eq!(
            check_ncci_edit("99214", "17000"),
            NcciDecision::Modifier("25")
        );
    }

    #[test]
    fn lookup_is_order_independent() {
        assert_eq!(
            check_ncci_edit("17000", "99214"),
            check_ncci_edit("99214", "17000")
        );
        assert_eq!(check_ncci_edit("11102", "99202"), NcciDecision::NoEdit);
        assert_eq!(check_ncci_edit("99202", "11102"), NcciDecision::NoEdit);
    }

    #[test]
    fn addon_pairs_bill_together_without_modifier() {
        assert_eq!(check_ncci_edit("17000", "17003"), NcciDecision::Addon);
        assert_eq!(check_ncci_edit("17003", "17000"), NcciDecision::Addon);
    }

    #[test]
    fn bundled_repairs_cannot_unbundle() {
        assert_eq!(
            check_ncci_edit("12001", "11400"),
            NcciDecision::CannotUnbundle
        );
    }

    #[test]
    fn modifier_25_applies_with_any_procedure_present() {
        assert!(needs_modifier_25("99214", &["17000"]));
        // Permissive default: no table row required.
        assert!(needs_modifier_25("99212", &["11720"]));
        assert!(!needs_modifier_25("99214", &[]));
        assert!(!needs_modifier_25("11102", &["17000"]));
    }

    #[test]
    fn unknown_modifier_returns_sentinel_guidance() {
        assert_eq!(modifier_guidance("-25").name, "Significant, Separately Identifiable E/M");
        assert_eq!(modifier_guidance("99").name, "Unknown");
    }
}
