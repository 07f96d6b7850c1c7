use serde::{Deserialize, Serialize};

/// Documentation status of a billable line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
    Supported,
    MissingDocumentation,
    CountUnspecified,
    Flagged,
}

/// A single billable CPT/HCPCS line item.
///
/// `wrvu` is the per-unit work RVU; the line value is
/// wrvu x units x modifier multiplier (see `CodeDatabase::calculate_total_wrvu`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCode {
    pub code: String,
    #[serde(default)]
    pub modifier: Option<String>,
    pub description: String,
    #[serde(rename = "wRVU")]
    pub wrvu: f64,
    pub units: u32,
    pub status: CodeStatus,
    #[serde(default)]
    pub documentation_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Size,
    Dimensions,
    Margin,
    Area,
    AkCount,
    WartCount,
    SkinTagCount,
    LesionCount,
    NailCount,
    BiopsyCount,
}

/// A typed measurement pulled out of the note text.
///
/// For `Dimensions` the value is the largest dimension, since the largest
/// diameter is what drives lesion sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub value: f64,
    pub unit: String,
    pub context: String,
}

/// Structured entities extracted from a clinical note.
///
/// String lists are de-duplicated case-insensitively, first seen wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub diagnoses: Vec<String>,
    #[serde(default)]
    pub procedures: Vec<String>,
    #[serde(default)]
    pub anatomic_sites: Vec<String>,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub time_documentation: Option<String>,
}

/// Maximum billing supportable by the note as written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentBilling {
    pub codes: Vec<BillingCode>,
    #[serde(rename = "total_wRVU")]
    pub total_wrvu: f64,
    pub documentation_gaps: Vec<String>,
}

/// A documentation edit that would unlock a higher-value code for work
/// already performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationEnhancement {
    pub issue: String,
    #[serde(default)]
    pub current_code: Option<String>,
    #[serde(rename = "current_wRVU")]
    pub current_wrvu: f64,
    pub suggested_addition: String,
    #[serde(default)]
    pub enhanced_code: Option<String>,
    #[serde(rename = "enhanced_wRVU")]
    pub enhanced_wrvu: f64,
    #[serde(rename = "delta_wRVU")]
    pub delta_wrvu: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentationEnhancements {
    pub enhancements: Vec<DocumentationEnhancement>,
    #[serde(rename = "enhanced_total_wRVU")]
    pub enhanced_total_wrvu: f64,
    pub improvement: f64,
}

/// A code that could have been billed had the encounter gone differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialCode {
    pub code: String,
    pub description: String,
    #[serde(rename = "wRVU")]
    pub wrvu: f64,
}

/// A "next time" recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FutureOpportunity {
    pub category: String,
    pub finding: String,
    pub opportunity: String,
    pub action: String,
    #[serde(default)]
    pub potential_code: Option<PotentialCode>,
    pub teaching_point: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FutureOpportunities {
    pub opportunities: Vec<FutureOpportunity>,
    #[serde(rename = "total_potential_additional_wRVU")]
    pub total_potential_additional_wrvu: f64,
}

/// A scenario matched against the note, returned as reference text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMatch {
    pub name: String,
    pub score: f32,
    pub content: String,
}

/// Complete analysis of one clinical note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub entities: ExtractedEntities,
    pub current_billing: CurrentBilling,
    pub documentation_enhancements: DocumentationEnhancements,
    pub future_opportunities: FutureOpportunities,
    pub matched_scenarios: Vec<ScenarioMatch>,
    pub original_note: String,
    pub compliance_notice: String,
}

pub fn compliance_notice() -> String {
    "These recommendations are for educational purposes and require clinical \
     judgment. All billing must reflect services actually performed and \
     documented. Consult your compliance officer for facility-specific \
     guidance."
        .to_string()
}
