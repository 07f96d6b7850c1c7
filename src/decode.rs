//! Validating decode of externally-proposed analysis input.
//!
//! Model-produced JSON is untrusted: it goes through a typed decode and an
//! explicit clamping pass before anything downstream sees it. Malformed
//! JSON is a hard error, never a silently-zeroed struct.

use anyhow::Context;
use serde::Deserialize;

use crate::codes::CodeDatabase;
use crate::models::{BillingCode, CodeStatus, CurrentBilling, ExtractedEntities};

/// Decode externally-extracted entities. List fields default to empty and
/// are de-duplicated case-insensitively; nothing else is trusted from the
/// producer.
pub fn decode_entities(json: &str) -> anyhow::Result<ExtractedEntities> {
    let mut entities: ExtractedEntities =
        serde_json::from_str(json).context("decode extracted entities")?;
    dedup_case_insensitive(&mut entities.diagnoses);
    dedup_case_insensitive(&mut entities.procedures);
    dedup_case_insensitive(&mut entities.anatomic_sites);
    dedup_case_insensitive(&mut entities.medications);
    entities
        .measurements
        .retain(|m| m.value.is_finite() && m.value >= 0.0);
    Ok(entities)
}

fn dedup_case_insensitive(list: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::new();
    list.retain(|item| {
        let lower = item.to_lowercase();
        if seen.contains(&lower) {
            false
        } else {
            seen.push(lower);
            true
        }
    });
}

#[derive(Debug, Deserialize)]
struct CandidateLine {
    code: String,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "wRVU")]
    wrvu: Option<f64>,
    #[serde(default)]
    units: Option<i64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    documentation_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateBilling {
    #[serde(default)]
    codes: Vec<CandidateLine>,
    #[serde(default)]
    documentation_gaps: Vec<String>,
}

fn parse_status(status: Option<&str>) -> CodeStatus {
    match status.map(str::trim) {
        Some("supported") => CodeStatus::Supported,
        Some("missing_documentation") => CodeStatus::MissingDocumentation,
        Some("count_unspecified") => CodeStatus::CountUnspecified,
        None => CodeStatus::Supported,
        // Anything unrecognized is suspect, not an error.
        Some(_) => CodeStatus::Flagged,
    }
}

/// Decode externally-proposed billing candidates against the reference
/// provider. Proposed wRVU values are replaced by the reference value when
/// the code is known; unknown codes survive but are flagged. The total is
/// always recomputed, never trusted.
pub fn decode_billing_candidates(json: &str, db: &CodeDatabase) -> anyhow::Result<CurrentBilling> {
    let candidate: CandidateBilling =
        serde_json::from_str(json).context("decode billing candidates")?;

    let mut codes = Vec::new();
    for line in candidate.codes {
        let code = line.code.trim().to_string();
        if code.is_empty() {
            continue;
        }
        let units = line.units.unwrap_or(1).max(1) as u32;
        let modifier = line
            .modifier
            .map(|m| m.trim().trim_start_matches('-').to_string())
            .filter(|m| !m.is_empty());

        let (description, wrvu, status, note) = match db.get_code(&code) {
            Some(info) => (
                info.description.clone(),
                info.wrvu,
                parse_status(line.status.as_deref()),
                line.documentation_note,
            ),
            None => (
                line.description.unwrap_or_default(),
                line.wrvu.unwrap_or(0.0).max(0.0),
                CodeStatus::Flagged,
                Some("Code not found in reference; verify before billing".to_string()),
            ),
        };

        codes.push(BillingCode {
            code,
            modifier,
            description,
            wrvu,
            units,
            status,
            documentation_note: note,
        });
    }

    let mut documentation_gaps: Vec<String> = candidate
        .documentation_gaps
        .into_iter()
        .map(|gap| gap.trim().to_string())
        .filter(|gap| !gap.is_empty())
        .collect();
    dedup_case_insensitive(&mut documentation_gaps);

    let total_wrvu = db.calculate_total_wrvu(&codes);
    Ok(CurrentBilling {
        codes,
        total_wrvu,
        documentation_gaps,
    })
}
