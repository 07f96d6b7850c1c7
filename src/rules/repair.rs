//! Repair aggregation: same complexity + same anatomic group means lengths
//! sum and a single code is billed per group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AnatomicGroup, RepairComplexity, TierEntry, classify_anatomic_group, resolve_tier};

/// One documented wound repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairInfo {
    pub length_cm: f64,
    pub complexity: RepairComplexity,
    pub anatomic_site: String,
}

impl RepairInfo {
    pub fn new(length_cm: f64, complexity: RepairComplexity, anatomic_site: &str) -> Self {
        Self {
            length_cm,
            complexity,
            anatomic_site: anatomic_site.to_string(),
        }
    }

    pub fn anatomic_group(&self) -> AnatomicGroup {
        classify_anatomic_group(&self.anatomic_site)
    }
}

/// Repeatable add-on units billed on top of a repair's base code when the
/// aggregate length runs past the largest explicit tier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RepairAddon {
    pub code: &'static str,
    pub units: u32,
    pub wrvu_per_unit: f64,
}

/// One billed line per (complexity, anatomic group) pair.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedRepair {
    pub complexity: RepairComplexity,
    pub anatomic_group: AnatomicGroup,
    pub total_length_cm: f64,
    pub code: String,
    #[serde(rename = "wRVU")]
    pub wrvu: f64,
    pub addon: Option<RepairAddon>,
}

pub(crate) const SIMPLE_GROUP_1: &[TierEntry] = &[
    TierEntry { upper_bound: 2.5, code: "12001", wrvu: 0.82 },
    TierEntry { upper_bound: 7.5, code: "12002", wrvu: 1.14 },
    TierEntry { upper_bound: 12.5, code: "12004", wrvu: 1.49 },
    TierEntry { upper_bound: 20.0, code: "12005", wrvu: 1.79 },
    TierEntry { upper_bound: 30.0, code: "12006", wrvu: 2.10 },
    TierEntry { upper_bound: f64::INFINITY, code: "12007", wrvu: 2.73 },
];

pub(crate) const SIMPLE_GROUP_2: &[TierEntry] = &[
    TierEntry { upper_bound: 2.5, code: "12011", wrvu: 1.15 },
    TierEntry { upper_bound: 5.0, code: "12013", wrvu: 1.45 },
    TierEntry { upper_bound: 7.5, code: "12014", wrvu: 1.69 },
    TierEntry { upper_bound: 12.5, code: "12015", wrvu: 2.17 },
    TierEntry { upper_bound: 20.0, code: "12016", wrvu: 2.86 },
    TierEntry { upper_bound: 30.0, code: "12017", wrvu: 3.39 },
    TierEntry { upper_bound: f64::INFINITY, code: "12018", wrvu: 4.54 },
];

pub(crate) const INTERMEDIATE_GROUP_1: &[TierEntry] = &[
    TierEntry { upper_bound: 2.5, code: "12031", wrvu: 1.95 },
    TierEntry { upper_bound: 5.0, code: "12032", wrvu: 2.46 },
    TierEntry { upper_bound: 7.5, code: "12034", wrvu: 2.81 },
    TierEntry { upper_bound: 12.5, code: "12035", wrvu: 3.50 },
    TierEntry { upper_bound: 20.0, code: "12036", wrvu: 4.30 },
    TierEntry { upper_bound: 30.0, code: "12037", wrvu: 5.07 },
    TierEntry { upper_bound: f64::INFINITY, code: "12038", wrvu: 5.70 },
];

pub(crate) const INTERMEDIATE_GROUP_2: &[TierEntry] = &[
    TierEntry { upper_bound: 2.5, code: "12051", wrvu: 2.27 },
    TierEntry { upper_bound: 5.0, code: "12052", wrvu: 2.62 },
    TierEntry { upper_bound: 7.5, code: "12053", wrvu: 3.22 },
    TierEntry { upper_bound: 12.5, code: "12054", wrvu: 3.87 },
    TierEntry { upper_bound: 20.0, code: "12055", wrvu: 4.91 },
    TierEntry { upper_bound: 30.0, code: "12056", wrvu: 5.83 },
    TierEntry { upper_bound: f64::INFINITY, code: "12057", wrvu: 6.84 },
];

// Complex trunk/extremity repairs have no open top tier: past the largest
// explicit bound, each extra 5 cm (or part) bills one add-on unit.
pub(crate) const COMPLEX_GROUP_1: &[TierEntry] = &[
    TierEntry { upper_bound: 1.0, code: "13100", wrvu: 2.60 },
    TierEntry { upper_bound: 2.5, code: "13101", wrvu: 3.25 },
    TierEntry { upper_bound: 5.0, code: "13102", wrvu: 4.25 },
];

pub(crate) const COMPLEX_GROUP_1_ADDON: RepairAddon = RepairAddon {
    code: "13120",
    units: 1,
    wrvu_per_unit: 3.35,
};

const COMPLEX_GROUP_1_ADDON_STEP_CM: f64 = 5.0;

pub(crate) const COMPLEX_GROUP_2: &[TierEntry] = &[
    TierEntry { upper_bound: 1.0, code: "13131", wrvu: 3.64 },
    TierEntry { upper_bound: 2.5, code: "13132", wrvu: 4.52 },
    TierEntry { upper_bound: 5.0, code: "13133", wrvu: 5.79 },
    TierEntry { upper_bound: 7.5, code: "13151", wrvu: 4.23 },
    TierEntry { upper_bound: f64::INFINITY, code: "13152", wrvu: 5.61 },
];

fn tier_table(complexity: RepairComplexity, group: AnatomicGroup) -> &'static [TierEntry] {
    match (complexity, group) {
        (RepairComplexity::Simple, AnatomicGroup::Group1) => SIMPLE_GROUP_1,
        (RepairComplexity::Simple, AnatomicGroup::Group2) => SIMPLE_GROUP_2,
        (RepairComplexity::Intermediate, AnatomicGroup::Group1) => INTERMEDIATE_GROUP_1,
        (RepairComplexity::Intermediate, AnatomicGroup::Group2) => INTERMEDIATE_GROUP_2,
        (RepairComplexity::Complex, AnatomicGroup::Group1) => COMPLEX_GROUP_1,
        (RepairComplexity::Complex, AnatomicGroup::Group2) => COMPLEX_GROUP_2,
    }
}

/// Resolve an aggregated length to (code, wRVU, optional add-on units).
pub fn repair_code(
    complexity: RepairComplexity,
    group: AnatomicGroup,
    total_length_cm: f64,
) -> (&'static str, f64, Option<RepairAddon>) {
    let table = tier_table(complexity, group);
    let top = table.last().expect("repair tier tables are non-empty");

    if complexity == RepairComplexity::Complex
        && group == AnatomicGroup::Group1
        && total_length_cm > top.upper_bound
    {
        let overflow = total_length_cm - top.upper_bound;
        let units = (overflow / COMPLEX_GROUP_1_ADDON_STEP_CM).ceil().max(1.0) as u32;
        let addon = RepairAddon {
            units,
            ..COMPLEX_GROUP_1_ADDON
        };
        return (top.code, top.wrvu, Some(addon));
    }

    let entry = resolve_tier(total_length_cm, table);
    (entry.code, entry.wrvu, None)
}

/// Aggregate repairs by (complexity, anatomic group) and resolve each
/// group's summed length to a single code.
///
/// Lengths are summed in centimeters as given; rounding happens only at
/// display time. An empty repair list yields an empty result.
pub fn aggregate_repairs(repairs: &[RepairInfo]) -> Vec<AggregatedRepair> {
    let mut groups: BTreeMap<(RepairComplexity, AnatomicGroup), f64> = BTreeMap::new();
    for repair in repairs {
        if repair.length_cm <= 0.0 {
            continue;
        }
        *groups
            .entry((repair.complexity, repair.anatomic_group()))
            .or_insert(0.0) += repair.length_cm;
    }

    groups
        .into_iter()
        .map(|((complexity, anatomic_group), total_length_cm)| {
            let (code, wrvu, addon) = repair_code(complexity, anatomic_group, total_length_cm);
            AggregatedRepair {
                complexity,
                anatomic_group,
                total_length_cm,
                code: code.to_string(),
                wrvu,
                addon,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_group_repairs_sum_before_tier_resolution() {
        let repairs = vec![
            RepairInfo::new(2.5, RepairComplexity::Simple, "trunk"),
            RepairInfo::new(3.0, RepairComplexity::Simple, "trunk"),
        ];
        let aggregated = aggregate_repairs(&repairs);
        assert_eq!(aggregated.len(), 1);
        let agg = &aggregated[0];
        assert!((agg.total_length_cm - 5.5).abs() < 1e-9);
        // 5.5 cm lands in the 7.5 cm tier, not the 2.5 cm tier.
        assert_eq!(agg.code, "12002");
        assert!(agg.addon.is_none());
    }

    #[test]
    fn aggregation_is_invariant_under_input_order() {
        let forward = vec![
            RepairInfo::new(1.5, RepairComplexity::Simple, "back"),
            RepairInfo::new(2.0, RepairComplexity::Intermediate, "cheek"),
            RepairInfo::new(4.0, RepairComplexity::Simple, "back"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = aggregate_repairs(&forward);
        let b = aggregate_repairs(&reversed);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.code, y.code);
            assert!((x.total_length_cm - y.total_length_cm).abs() < 1e-9);
        }
    }

    #[test]
    fn complexity_and_group_partition_separately() {
        let repairs = vec![
            RepairInfo::new(2.0, RepairComplexity::Simple, "forearm"),
            RepairInfo::new(2.0, RepairComplexity::Simple, "nose"),
            RepairInfo::new(2.0, RepairComplexity::Intermediate, "forearm"),
        ];
        let aggregated = aggregate_repairs(&repairs);
        assert_eq!(aggregated.len(), 3);
    }

    #[test]
    fn complex_trunk_overflow_bills_repeatable_addon_units() {
        // 12 cm: 5 cm base tier + ceil(7 / 5) = 2 add-on units.
        let (code, _, addon) =
            repair_code(RepairComplexity::Complex, AnatomicGroup::Group1, 12.0);
        assert_eq!(code, "13102");
        let addon = addon.expect("overflow length must carry add-on units");
        assert_eq!(addon.code, "13120");
        assert_eq!(addon.units, 2);

        // At or under the largest explicit bound there is no add-on.
        let (code, _, addon) =
            repair_code(RepairComplexity::Complex, AnatomicGroup::Group1, 5.0);
        assert_eq!(code, "13102");
        assert!(addon.is_none());
    }

    #[test]
    fn complex_face_uses_open_top_tier_without_addon() {
        let (code, _, addon) =
            repair_code(RepairComplexity::Complex, AnatomicGroup::Group2, 20.0);
        assert_eq!(code, "13152");
        assert!(addon.is_none());
    }

    #[test]
    fn empty_and_nonpositive_repairs_yield_nothing() {
        assert!(aggregate_repairs(&[]).is_empty());
        let zeroed = vec![RepairInfo::new(0.0, RepairComplexity::Simple, "trunk")];
        assert!(aggregate_repairs(&zeroed).is_empty());
    }
}
