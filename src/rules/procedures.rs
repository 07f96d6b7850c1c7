//! Biopsy, intralesional injection, and nail debridement coding.
//!
//! Biopsies follow a first-unit + additional-units pattern per technique;
//! injections and nail debridement are flat two-tier lookups. The families
//! keep separate resolution paths because their additive rules differ.

use super::CodeUnits;

fn first_plus_additional(
    count: i64,
    first: (&'static str, f64),
    additional: (&'static str, f64),
    out: &mut Vec<CodeUnits>,
) {
    if count <= 0 {
        return;
    }
    out.push(CodeUnits {
        code: first.0,
        units: 1,
        wrvu: first.1,
    });
    if count > 1 {
        let extra = (count - 1) as u32;
        out.push(CodeUnits {
            code: additional.0,
            units: extra,
            wrvu: additional.1 * extra as f64,
        });
    }
}

/// Biopsy codes across the three technique families. A note can contain
/// biopsies of several techniques at once; each family resolves
/// independently to zero, one, or two line items.
pub fn biopsy_codes(shave_count: i64, punch_count: i64, incisional_count: i64) -> Vec<CodeUnits> {
    let mut codes = Vec::new();
    first_plus_additional(shave_count, ("11102", 0.64), ("11103", 0.37), &mut codes);
    first_plus_additional(punch_count, ("11104", 0.81), ("11105", 0.44), &mut codes);
    first_plus_additional(incisional_count, ("11106", 0.98), ("11107", 0.54), &mut codes);
    codes
}

/// Intralesional injection: one flat code, tiered at 7 lesions. No add-on
/// semantics, unlike biopsies and AK destruction.
pub fn il_injection_code(lesion_count: i64) -> Option<(&'static str, f64)> {
    if lesion_count <= 0 {
        None
    } else if lesion_count <= 7 {
        Some(("11900", 0.51))
    } else {
        Some(("11901", 0.78))
    }
}

/// Nail debridement: flat two-tier lookup at 6 nails.
pub fn nail_debridement_code(nail_count: i64) -> Option<(&'static str, f64)> {
    if nail_count <= 0 {
        None
    } else if nail_count <= 5 {
        Some(("11720", 0.32))
    } else {
        Some(("11721", 0.53))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biopsy_families_resolve_independently() {
        let codes = biopsy_codes(2, 1, 0);
        let names: Vec<&str> = codes.iter().map(|c| c.code).collect();
        assert_eq!(names, vec!["11102", "11103", "11104"]);
        assert_eq!(codes[1].units, 1);
    }

    #[test]
    fn biopsy_additional_units_exclude_the_first() {
        let codes = biopsy_codes(0, 0, 4);
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code, "11106");
        assert_eq!(codes[0].units, 1);
        assert_eq!(codes[1].code, "11107");
        assert_eq!(codes[1].units, 3);
        assert!((codes[1].wrvu - 0.54 * 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_counts_contribute_nothing() {
        assert!(biopsy_codes(0, 0, 0).is_empty());
        assert!(biopsy_codes(-1, -2, 0).is_empty());
        assert!(il_injection_code(0).is_none());
        assert!(nail_debridement_code(-5).is_none());
    }

    #[test]
    fn il_injection_tiers_at_seven_lesions() {
        assert_eq!(il_injection_code(1).unwrap().0, "11900");
        assert_eq!(il_injection_code(7).unwrap().0, "11900");
        assert_eq!(il_injection_code(8).unwrap().0, "11901");
    }

    #[test]
    fn nail_debridement_tiers_at_six_nails() {
        assert_eq!(nail_debridement_code(5).unwrap().0, "11720");
        assert_eq!(nail_debridement_code(6).unwrap().0, "11721");
        assert_eq!(nail_debridement_code(10).unwrap().0, "11721");
    }
}
