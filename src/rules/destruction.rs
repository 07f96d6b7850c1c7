//! Destruction tiering for actinic keratoses, benign lesions, and
//! genital/anal sites.
//!
//! The three families stay separate on purpose: AK destruction is additive
//! per lesion, benign destruction is flat within thresholds, and the
//! site-specific codes hinge on a clinical judgment flag. Folding them into
//! one generic tier table would lose those semantics.

use serde::{Deserialize, Serialize};

use super::CodeUnits;

/// AK destruction: first lesion plus per-lesion add-ons, switching to a
/// single flat-rate code at 15 or more lesions.
pub fn ak_destruction_codes(count: i64) -> Vec<CodeUnits> {
    if count <= 0 {
        return Vec::new();
    }
    if count >= 15 {
        return vec![CodeUnits {
            code: "17004",
            units: 1,
            wrvu: 2.59,
        }];
    }
    let mut codes = vec![CodeUnits {
        code: "17000",
        units: 1,
        wrvu: 0.61,
    }];
    if count > 1 {
        // Lesions 2-14; the first lesion is never inside the add-on units.
        let addons = (count - 1) as u32;
        codes.push(CodeUnits {
            code: "17003",
            units: addons,
            wrvu: 0.09 * addons as f64,
        });
    }
    codes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenignLesionKind {
    WartOrMolluscum,
    SkinTag,
}

/// Benign lesion destruction.
///
/// Warts/molluscum bill one flat code per threshold tier regardless of the
/// exact count. Skin tags bill a base code covering up to 15 tags, then one
/// add-on unit per additional group of 10 (rounded up).
pub fn benign_destruction_codes(count: i64, kind: BenignLesionKind) -> Vec<CodeUnits> {
    if count <= 0 {
        return Vec::new();
    }
    match kind {
        BenignLesionKind::WartOrMolluscum => {
            if count >= 15 {
                vec![CodeUnits {
                    code: "17111",
                    units: 1,
                    wrvu: 0.79,
                }]
            } else {
                vec![CodeUnits {
                    code: "17110",
                    units: 1,
                    wrvu: 0.52,
                }]
            }
        }
        BenignLesionKind::SkinTag => {
            let mut codes = vec![CodeUnits {
                code: "11200",
                units: 1,
                wrvu: 0.80,
            }];
            if count > 15 {
                let groups = ((count - 15 + 9) / 10) as u32;
                codes.push(CodeUnits {
                    code: "11201",
                    units: groups,
                    wrvu: 0.28 * groups as f64,
                });
            }
            codes
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructionSite {
    MaleGenital,
    FemaleGenital,
    Anal,
}

/// Simple vs. extensive is a clinical judgment supplied by the caller, not
/// a count threshold computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestructionExtent {
    Simple,
    Extensive,
}

/// Genital/anal lesion destruction. These sites never reuse the generic
/// benign codes; each site keeps its own two-tier table.
pub fn site_destruction_code(
    site: DestructionSite,
    extent: DestructionExtent,
) -> (&'static str, f64) {
    match (site, extent) {
        (DestructionSite::MaleGenital, DestructionExtent::Simple) => ("54050", 1.19),
        (DestructionSite::MaleGenital, DestructionExtent::Extensive) => ("54065", 2.36),
        (DestructionSite::FemaleGenital, DestructionExtent::Simple) => ("56501", 1.18),
        (DestructionSite::FemaleGenital, DestructionExtent::Extensive) => ("56515", 2.80),
        (DestructionSite::Anal, DestructionExtent::Simple) => ("46916", 1.90),
        (DestructionSite::Anal, DestructionExtent::Extensive) => ("46924", 2.76),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ak_zero_or_negative_counts_bill_nothing() {
        assert!(ak_destruction_codes(0).is_empty());
        assert!(ak_destruction_codes(-3).is_empty());
    }

    #[test]
    fn ak_single_lesion_has_no_addon() {
        let codes = ak_destruction_codes(1);
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "17000");
        assert_eq!(codes[0].units, 1);
    }

    #[test]
    fn ak_under_fifteen_bills_first_plus_addons() {
        for count in 2..15 {
            let codes = ak_destruction_codes(count);
            assert_eq!(codes.len(), 2, "count {count}");
            assert_eq!(codes[0].code, "17000");
            assert_eq!(codes[0].units, 1);
            assert_eq!(codes[1].code, "17003");
            // The first lesion is covered by 17000 only.
            assert_eq!(codes[1].units as i64, count - 1);
            assert!((codes[1].wrvu - 0.09 * (count - 1) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn ak_fifteen_or_more_switches_to_flat_rate() {
        for count in [15, 20, 40] {
            let codes = ak_destruction_codes(count);
            assert_eq!(codes.len(), 1);
            assert_eq!(codes[0].code, "17004");
            assert_eq!(codes[0].units, 1);
        }
    }

    #[test]
    fn wart_destruction_is_flat_within_tiers() {
        assert!(benign_destruction_codes(0, BenignLesionKind::WartOrMolluscum).is_empty());
        let few = benign_destruction_codes(6, BenignLesionKind::WartOrMolluscum);
        assert_eq!(few.len(), 1);
        assert_eq!(few[0].code, "17110");
        let many = benign_destruction_codes(15, BenignLesionKind::WartOrMolluscum);
        assert_eq!(many[0].code, "17111");
        // Same tier, same single flat code regardless of exact count.
        assert_eq!(
            benign_destruction_codes(3, BenignLesionKind::WartOrMolluscum),
            benign_destruction_codes(14, BenignLesionKind::WartOrMolluscum)
        );
    }

    #[test]
    fn skin_tags_add_one_unit_per_ten_beyond_fifteen() {
        let base = benign_destruction_codes(15, BenignLesionKind::SkinTag);
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].code, "11200");

        let sixteen = benign_destruction_codes(16, BenignLesionKind::SkinTag);
        assert_eq!(sixteen[1].code, "11201");
        assert_eq!(sixteen[1].units, 1);

        let twenty_five = benign_destruction_codes(25, BenignLesionKind::SkinTag);
        assert_eq!(twenty_five[1].units, 1);

        let twenty_six = benign_destruction_codes(26, BenignLesionKind::SkinTag);
        assert_eq!(twenty_six[1].units, 2);
    }

    #[test]
    fn genital_and_anal_sites_use_their_own_tables() {
        let (code, _) =
            site_destruction_code(DestructionSite::MaleGenital, DestructionExtent::Simple);
        assert_eq!(code, "54050");
        let (code, _) =
            site_destruction_code(DestructionSite::FemaleGenital, DestructionExtent::Extensive);
        assert_eq!(code, "56515");
        let (code, _) = site_destruction_code(DestructionSite::Anal, DestructionExtent::Simple);
        assert_eq!(code, "46916");
    }
}
