//! CPT/HCPCS reference provider.
//!
//! Loads the code, modifier, and category tables once from CSV at startup
//! and answers lookups from memory. Constructed explicitly and shared via
//! `Arc`; there is no global instance.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

use crate::models::BillingCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInfo {
    pub code: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub description: String,
    #[serde(rename = "wRVU")]
    pub wrvu: f64,
    #[serde(default)]
    pub global_period: Option<String>,
    #[serde(default)]
    pub is_addon: bool,
    #[serde(default)]
    pub documentation_requirements: Option<String>,
    #[serde(default)]
    pub optimization_notes: Option<String>,
    #[serde(default)]
    pub related_codes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierInfo {
    pub modifier: String,
    pub name: String,
    pub definition: String,
    pub when_to_use: String,
    pub when_not_to_use: String,
    pub audit_risk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub category: String,
    pub description: String,
    pub code_range: String,
    pub key_optimization_points: String,
}

// CSV rows carry is_addon as yes/no text.
#[derive(Debug, Deserialize)]
struct CodeRow {
    code: String,
    category: String,
    subcategory: String,
    description: String,
    #[serde(rename = "wRVU")]
    wrvu: f64,
    global_period: String,
    is_addon: String,
    documentation_requirements: String,
    optimization_notes: String,
    related_codes: String,
}

fn optional(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

impl From<CodeRow> for CodeInfo {
    fn from(row: CodeRow) -> Self {
        CodeInfo {
            code: row.code.trim().to_string(),
            category: row.category,
            subcategory: optional(row.subcategory),
            description: row.description,
            wrvu: row.wrvu,
            global_period: optional(row.global_period),
            is_addon: row.is_addon.trim().eq_ignore_ascii_case("yes"),
            documentation_requirements: optional(row.documentation_requirements),
            optimization_notes: optional(row.optimization_notes),
            related_codes: optional(row.related_codes),
        }
    }
}

/// Search filters for `CodeDatabase::search_codes`. Empty filters match
/// everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeSearch {
    pub category: Option<String>,
    pub keyword: Option<String>,
    #[serde(rename = "min_wRVU")]
    pub min_wrvu: Option<f64>,
    #[serde(rename = "max_wRVU")]
    pub max_wrvu: Option<f64>,
}

pub struct CodeDatabase {
    codes: HashMap<String, CodeInfo>,
    // Keeps file order for stable search output.
    code_order: Vec<String>,
    modifiers: HashMap<String, ModifierInfo>,
    categories: Vec<CategoryInfo>,
}

impl CodeDatabase {
    /// Load the three reference tables from `data_dir`.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let codes_path = data_dir.join("codes.csv");
        let modifiers_path = data_dir.join("modifiers.csv");
        let categories_path = data_dir.join("categories.csv");
        for path in [&codes_path, &modifiers_path, &categories_path] {
            if !path.is_file() {
                return Err(anyhow!(
                    "Reference table not found at {}. Expected codes.csv, modifiers.csv and categories.csv under the data dir",
                    path.display()
                ));
            }
        }
        let db = Self::from_readers(
            std::fs::File::open(&codes_path)
                .with_context(|| format!("open {}", codes_path.display()))?,
            std::fs::File::open(&modifiers_path)
                .with_context(|| format!("open {}", modifiers_path.display()))?,
            std::fs::File::open(&categories_path)
                .with_context(|| format!("open {}", categories_path.display()))?,
        )?;
        tracing::info!(
            "Loaded {} codes, {} modifiers, {} categories from {}",
            db.codes.len(),
            db.modifiers.len(),
            db.categories.len(),
            data_dir.display()
        );
        Ok(db)
    }

    pub fn from_readers(
        codes: impl Read,
        modifiers: impl Read,
        categories: impl Read,
    ) -> anyhow::Result<Self> {
        let mut code_map = HashMap::new();
        let mut code_order = Vec::new();
        let mut reader = csv::Reader::from_reader(codes);
        for row in reader.deserialize::<CodeRow>() {
            let info: CodeInfo = row.context("parse codes.csv row")?.into();
            code_order.push(info.code.clone());
            code_map.insert(info.code.clone(), info);
        }

        let mut modifier_map = HashMap::new();
        let mut reader = csv::Reader::from_reader(modifiers);
        for row in reader.deserialize::<ModifierInfo>() {
            let info = row.context("parse modifiers.csv row")?;
            modifier_map.insert(info.modifier.trim().to_string(), info);
        }

        let mut category_list = Vec::new();
        let mut reader = csv::Reader::from_reader(categories);
        for row in reader.deserialize::<CategoryInfo>() {
            category_list.push(row.context("parse categories.csv row")?);
        }

        Ok(Self {
            codes: code_map,
            code_order,
            modifiers: modifier_map,
            categories: category_list,
        })
    }

    pub fn get_code(&self, code: &str) -> Option<&CodeInfo> {
        self.codes.get(code.trim())
    }

    /// wRVU for a code; 0.0 on a reference miss so downstream totals omit
    /// the unknown code rather than failing.
    pub fn wrvu(&self, code: &str) -> f64 {
        self.get_code(code).map(|c| c.wrvu).unwrap_or(0.0)
    }

    pub fn is_addon_code(&self, code: &str) -> bool {
        self.get_code(code).map(|c| c.is_addon).unwrap_or(false)
    }

    pub fn search_codes(&self, search: &CodeSearch) -> Vec<&CodeInfo> {
        self.code_order
            .iter()
            .filter_map(|code| self.codes.get(code))
            .filter(|info| {
                if let Some(category) = &search.category {
                    if !info.category.eq_ignore_ascii_case(category) {
                        return false;
                    }
                }
                if let Some(keyword) = &search.keyword {
                    let keyword = keyword.to_lowercase();
                    let haystack = format!(
                        "{} {} {}",
                        info.code,
                        info.description.to_lowercase(),
                        info.optimization_notes.as_deref().unwrap_or("").to_lowercase()
                    );
                    if !haystack.contains(&keyword) {
                        return false;
                    }
                }
                if let Some(min) = search.min_wrvu {
                    if info.wrvu < min {
                        return false;
                    }
                }
                if let Some(max) = search.max_wrvu {
                    if info.wrvu > max {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    pub fn get_modifier(&self, modifier: &str) -> Option<&ModifierInfo> {
        self.modifiers.get(modifier.trim().trim_start_matches('-'))
    }

    pub fn category_info(&self, category: &str) -> Option<&CategoryInfo> {
        self.categories
            .iter()
            .find(|c| c.category.eq_ignore_ascii_case(category))
    }

    pub fn categories(&self) -> &[CategoryInfo] {
        &self.categories
    }

    /// Total wRVU across line items: per-unit wRVU x units x modifier
    /// multiplier (bilateral -50 pays 1.5x). Rounded to two decimals at the
    /// end, never mid-sum.
    pub fn calculate_total_wrvu(&self, lines: &[BillingCode]) -> f64 {
        let total: f64 = lines
            .iter()
            .map(|line| {
                let multiplier = match line.modifier.as_deref().map(|m| m.trim_start_matches('-')) {
                    Some("50") => 1.5,
                    _ => 1.0,
                };
                line.wrvu * line.units as f64 * multiplier
            })
            .sum();
        (total * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CodeStatus;
    use crate::rules;

    fn test_db() -> CodeDatabase {
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        CodeDatabase::load(&data_dir).expect("reference tables load")
    }

    #[test]
    fn lookup_hits_and_misses() {
        let db = test_db();
        let info = db.get_code("17000").expect("17000 in reference");
        assert!(info.wrvu > 0.0);
        assert!(db.get_code("00000").is_none());
        assert_eq!(db.wrvu("00000"), 0.0);
    }

    #[test]
    fn addon_codes_are_marked() {
        let db = test_db();
        assert!(db.is_addon_code("17003"));
        assert!(!db.is_addon_code("17000"));
    }

    #[test]
    fn modifier_lookup_strips_leading_dash() {
        let db = test_db();
        assert!(db.get_modifier("-25").is_some());
        assert!(db.get_modifier("25").is_some());
        assert!(db.get_modifier("77").is_none());
    }

    #[test]
    fn search_filters_compose() {
        let db = test_db();
        let hits = db.search_codes(&CodeSearch {
            category: Some("Destruction".to_string()),
            min_wrvu: Some(2.0),
            ..Default::default()
        });
        assert!(hits.iter().all(|c| c.category == "Destruction" && c.wrvu >= 2.0));
        assert!(hits.iter().any(|c| c.code == "17004"));
    }

    #[test]
    fn bilateral_modifier_scales_line_value() {
        let db = test_db();
        let line = |modifier: Option<&str>| BillingCode {
            code: "11720".to_string(),
            modifier: modifier.map(|m| m.to_string()),
            description: String::new(),
            wrvu: 0.32,
            units: 1,
            status: CodeStatus::Supported,
            documentation_note: None,
        };
        assert!((db.calculate_total_wrvu(&[line(None)]) - 0.32).abs() < 1e-9);
        assert!((db.calculate_total_wrvu(&[line(Some("50"))]) - 0.48).abs() < 1e-9);
    }

    // The tier tables and the reference tables must not silently diverge:
    // resolving a tier then looking the code up must agree on wRVU.
    #[test]
    fn tier_tables_agree_with_reference_wrvu() {
        let db = test_db();
        let tables: &[&[rules::TierEntry]] = &[
            rules::repair::SIMPLE_GROUP_1,
            rules::repair::SIMPLE_GROUP_2,
            rules::repair::INTERMEDIATE_GROUP_1,
            rules::repair::INTERMEDIATE_GROUP_2,
            rules::repair::COMPLEX_GROUP_1,
            rules::repair::COMPLEX_GROUP_2,
            rules::excision::EXCISION_MALIGNANT_FACE,
            rules::excision::EXCISION_MALIGNANT_TRUNK,
            rules::excision::EXCISION_BENIGN_FACE,
            rules::excision::EXCISION_BENIGN_TRUNK,
        ];
        for table in tables {
            for entry in *table {
                let reference = db
                    .get_code(entry.code)
                    .unwrap_or_else(|| panic!("{} missing from codes.csv", entry.code));
                assert!(
                    (reference.wrvu - entry.wrvu).abs() < 1e-6,
                    "wRVU mismatch for {}",
                    entry.code
                );
            }
        }
    }

    #[test]
    fn count_engines_agree_with_reference_wrvu() {
        let db = test_db();
        for (code, per_unit) in [
            ("17000", 0.61),
            ("17003", 0.09),
            ("17004", 2.59),
            ("17110", 0.52),
            ("17111", 0.79),
            ("11200", 0.80),
            ("11201", 0.28),
            ("11102", 0.64),
            ("11103", 0.37),
            ("11104", 0.81),
            ("11105", 0.44),
            ("11106", 0.98),
            ("11107", 0.54),
            ("11900", 0.51),
            ("11901", 0.78),
            ("11720", 0.32),
            ("11721", 0.53),
        ] {
            assert!(
                (db.wrvu(code) - per_unit).abs() < 1e-6,
                "wRVU mismatch for {code}"
            );
        }
    }
}
