//! Billing aggregator: composes the extraction layer and the rules engine
//! into line items, totals, documentation enhancements, and missed
//! opportunities for one clinical note.

use std::path::Path;

use crate::codes::CodeDatabase;
use crate::decode;
use crate::entities;
use crate::models::{
    AnalysisResult, BillingCode, CodeStatus, CurrentBilling, DocumentationEnhancement,
    DocumentationEnhancements, ExtractedEntities, FutureOpportunities, FutureOpportunity,
    Measurement, MeasurementKind, PotentialCode, Priority, compliance_notice,
};
use crate::rules::destruction::{
    BenignLesionKind, DestructionExtent, DestructionSite, ak_destruction_codes,
    benign_destruction_codes, site_destruction_code,
};
use crate::rules::excision::{calculate_excised_diameter, excision_code, flap_code};
use crate::rules::ncci::{NcciDecision, check_ncci_edit, is_em_code, needs_modifier_25};
use crate::rules::procedures::{biopsy_codes, il_injection_code, nail_debridement_code};
use crate::rules::repair::{RepairInfo, aggregate_repairs};
use crate::rules::{CodeUnits, RepairComplexity, is_g2211_eligible};
use crate::scenarios::ScenarioEngine;

/// An excision with whatever sizing facts the note supports.
#[derive(Debug, Clone)]
pub struct ExcisionFacts {
    pub lesion_diameter_mm: f64,
    pub margin_mm: Option<f64>,
    pub site: String,
    pub malignant: bool,
}

/// Per-family procedure facts derived from extracted entities. `None`
/// counts mean the procedure is documented but its count is not.
#[derive(Debug, Clone, Default)]
pub struct ProcedureFacts {
    pub ak_destruction_performed: bool,
    pub ak_count: Option<i64>,
    pub wart_destruction_performed: bool,
    pub wart_count: Option<i64>,
    pub skin_tag_removal_performed: bool,
    pub skin_tag_count: Option<i64>,
    pub genital_site: Option<DestructionSite>,
    pub extensive_destruction: bool,
    pub shave_biopsies: i64,
    pub punch_biopsies: i64,
    pub incisional_biopsies: i64,
    pub il_injection_performed: bool,
    pub injected_lesions: Option<i64>,
    pub nail_debridement_performed: bool,
    pub nails_debrided: Option<i64>,
    pub repair_performed: bool,
    pub repairs: Vec<RepairInfo>,
    pub excisions: Vec<ExcisionFacts>,
    pub flap_performed: bool,
    pub flap_area_sq_cm: Option<f64>,
    pub flap_site: Option<String>,
}

fn procedures_mention(entities: &ExtractedEntities, terms: &[&str]) -> bool {
    entities.procedures.iter().any(|proc| {
        let proc = proc.to_lowercase();
        terms.iter().any(|term| proc.contains(term))
    })
}

fn diagnoses_mention(entities: &ExtractedEntities, terms: &[&str]) -> bool {
    entities.diagnoses.iter().any(|dx| {
        let dx = dx.to_lowercase();
        terms.iter().any(|term| dx.contains(term))
    })
}

fn max_count(entities: &ExtractedEntities, kind: MeasurementKind) -> Option<i64> {
    entities
        .measurements
        .iter()
        .filter(|m| m.kind == kind)
        .map(|m| m.value.round() as i64)
        .max()
        .filter(|count| *count > 0)
}

fn count_with_context(
    entities: &ExtractedEntities,
    kind: MeasurementKind,
    context_term: &str,
) -> Option<i64> {
    entities
        .measurements
        .iter()
        .filter(|m| m.kind == kind && m.context.to_lowercase().contains(context_term))
        .map(|m| m.value.round() as i64)
        .max()
        .filter(|count| *count > 0)
}

const DESTRUCTION_TERMS: &[&str] = &[
    "cryotherapy",
    "cryosurgery",
    "liquid nitrogen",
    "destruction",
    "destroyed",
    "electrodesiccation",
    "curettage",
];

const REPAIR_CONTEXT_TERMS: &[&str] = &["repair", "closure", "laceration", "wound", "sutur"];
const EXCISION_CONTEXT_TERMS: &[&str] =
    &["excis", "lesion", "mass", "nodule", "cyst", "carcinoma", "melanoma"];
const MALIGNANCY_TERMS: &[&str] = &["melanoma", "carcinoma", "bcc", "scc"];

fn context_site(measurement: &Measurement, entities: &ExtractedEntities) -> String {
    let context = measurement.context.to_lowercase();
    for site in &entities.anatomic_sites {
        if context.contains(&site.to_lowercase()) {
            return site.clone();
        }
    }
    entities
        .anatomic_sites
        .first()
        .cloned()
        .unwrap_or_else(|| "trunk".to_string())
}

fn repair_complexity(entities: &ExtractedEntities) -> RepairComplexity {
    if procedures_mention(entities, &["complex repair"]) {
        RepairComplexity::Complex
    } else if procedures_mention(entities, &["intermediate repair", "layered closure"]) {
        RepairComplexity::Intermediate
    } else {
        RepairComplexity::Simple
    }
}

fn genital_destruction_site(entities: &ExtractedEntities) -> Option<DestructionSite> {
    let sites = entities.anatomic_sites.join(" ").to_lowercase();
    if sites.contains("vulva") || sites.contains("labia") {
        Some(DestructionSite::FemaleGenital)
    } else if sites.contains("perianal") || sites.contains("anal") {
        Some(DestructionSite::Anal)
    } else if sites.contains("penis") || sites.contains("scrotum") || sites.contains("genital") {
        Some(DestructionSite::MaleGenital)
    } else {
        None
    }
}

fn biopsy_count(entities: &ExtractedEntities, technique: &str, mentioned: bool) -> i64 {
    if let Some(count) = count_with_context(entities, MeasurementKind::BiopsyCount, technique) {
        return count;
    }
    if mentioned {
        // Documented technique without an explicit count is at least one.
        if let Some(count) = max_count(entities, MeasurementKind::BiopsyCount) {
            return count;
        }
        return 1;
    }
    0
}

/// Derive the counts and measurements that feed the tier engines.
pub fn derive_procedure_facts(entities: &ExtractedEntities, note: &str) -> ProcedureFacts {
    let note_lower = note.to_ascii_lowercase();
    let destruction = procedures_mention(entities, DESTRUCTION_TERMS);

    let mut facts = ProcedureFacts::default();

    let ak_documented = diagnoses_mention(entities, &["actinic keratos"])
        || max_count(entities, MeasurementKind::AkCount).is_some();
    facts.ak_destruction_performed = destruction && ak_documented;
    facts.ak_count = max_count(entities, MeasurementKind::AkCount);

    let warts_documented = diagnoses_mention(entities, &["wart", "verruca", "molluscum", "condyloma"])
        || max_count(entities, MeasurementKind::WartCount).is_some();
    facts.wart_destruction_performed = destruction && warts_documented;
    facts.wart_count = max_count(entities, MeasurementKind::WartCount);
    facts.genital_site = if facts.wart_destruction_performed {
        genital_destruction_site(entities)
    } else {
        None
    };
    facts.extensive_destruction = note_lower.contains("extensive");

    let tags_documented = diagnoses_mention(entities, &["skin tag"])
        || max_count(entities, MeasurementKind::SkinTagCount).is_some();
    facts.skin_tag_removal_performed =
        tags_documented && (destruction || procedures_mention(entities, &["shave removal"]));
    facts.skin_tag_count = max_count(entities, MeasurementKind::SkinTagCount);

    let shave = procedures_mention(entities, &["shave biops"]);
    let punch = procedures_mention(entities, &["punch biops"]);
    let incisional = procedures_mention(entities, &["incisional biops"]);
    facts.shave_biopsies = biopsy_count(entities, "shave", shave);
    facts.punch_biopsies = biopsy_count(entities, "punch", punch);
    facts.incisional_biopsies = biopsy_count(entities, "incisional", incisional);
    // A generic count can only back a single documented technique.
    if [shave, punch, incisional].iter().filter(|m| **m).count() > 1 {
        facts.shave_biopsies = if shave {
            count_with_context(entities, MeasurementKind::BiopsyCount, "shave").unwrap_or(1)
        } else {
            0
        };
        facts.punch_biopsies = if punch {
            count_with_context(entities, MeasurementKind::BiopsyCount, "punch").unwrap_or(1)
        } else {
            0
        };
        facts.incisional_biopsies = if incisional {
            count_with_context(entities, MeasurementKind::BiopsyCount, "incisional").unwrap_or(1)
        } else {
            0
        };
    }

    facts.il_injection_performed =
        procedures_mention(entities, &["intralesional", "injected", "injection"]);
    facts.injected_lesions = count_with_context(entities, MeasurementKind::LesionCount, "inject");

    facts.nail_debridement_performed = procedures_mention(entities, &["nail debridement"]);
    facts.nails_debrided = max_count(entities, MeasurementKind::NailCount);

    facts.repair_performed = procedures_mention(
        entities,
        &[
            "repair",
            "layered closure",
            "primary closure",
            "sutured",
        ],
    );
    if facts.repair_performed {
        let complexity = repair_complexity(entities);
        for m in &entities.measurements {
            if !matches!(m.kind, MeasurementKind::Size | MeasurementKind::Dimensions) {
                continue;
            }
            let context = m.context.to_lowercase();
            if !REPAIR_CONTEXT_TERMS.iter().any(|t| context.contains(t)) {
                continue;
            }
            let length_cm = if m.unit == "mm" { m.value / 10.0 } else { m.value };
            if length_cm <= 0.0 {
                continue;
            }
            facts
                .repairs
                .push(RepairInfo::new(length_cm, complexity, &context_site(m, entities)));
        }
    }

    if procedures_mention(entities, &["excision", "excised"]) {
        let malignant = diagnoses_mention(entities, MALIGNANCY_TERMS);
        let margin_mm = entities
            .measurements
            .iter()
            .find(|m| m.kind == MeasurementKind::Margin)
            .map(|m| if m.unit == "cm" { m.value * 10.0 } else { m.value });
        let lesion = entities.measurements.iter().find(|m| {
            matches!(m.kind, MeasurementKind::Size | MeasurementKind::Dimensions)
                && EXCISION_CONTEXT_TERMS
                    .iter()
                    .any(|t| m.context.to_lowercase().contains(t))
        });
        if let Some(m) = lesion {
            let lesion_diameter_mm = if m.unit == "cm" { m.value * 10.0 } else { m.value };
            facts.excisions.push(ExcisionFacts {
                lesion_diameter_mm,
                margin_mm,
                site: context_site(m, entities),
                malignant,
            });
        }
    }

    facts.flap_performed = procedures_mention(entities, &["flap"]);
    if facts.flap_performed {
        let total_area: f64 = entities
            .measurements
            .iter()
            .filter(|m| m.kind == MeasurementKind::Area)
            .map(|m| m.value)
            .sum();
        facts.flap_area_sq_cm = (total_area > 0.0).then_some(total_area);
        facts.flap_site = entities.anatomic_sites.first().cloned();
    }

    facts
}

pub struct BillingAnalyzer {
    code_db: CodeDatabase,
    scenarios: ScenarioEngine,
}

impl BillingAnalyzer {
    pub fn new(code_db: CodeDatabase, scenarios: ScenarioEngine) -> Self {
        Self { code_db, scenarios }
    }

    /// Load reference tables and the scenario corpus from the data dir.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let code_db = CodeDatabase::load(data_dir)?;
        let scenarios = ScenarioEngine::load(&data_dir.join("scenarios"))?;
        Ok(Self::new(code_db, scenarios))
    }

    pub fn code_db(&self) -> &CodeDatabase {
        &self.code_db
    }

    pub fn scenarios(&self) -> &ScenarioEngine {
        &self.scenarios
    }

    /// Full analysis of one note: extraction, deterministic billing,
    /// enhancements, opportunities, and matched reference scenarios.
    pub fn analyze(&self, note: &str) -> anyhow::Result<AnalysisResult> {
        let extracted = entities::extract_entities(note);
        let facts = derive_procedure_facts(&extracted, note);
        let current_billing = self.current_billing(&facts, &extracted);
        let documentation_enhancements = self.enhancements(&facts, &extracted, &current_billing);
        let future_opportunities = self.opportunities(&facts, &extracted, &current_billing);
        let matched_scenarios = self.scenarios.match_scenarios(note, 3)?;

        Ok(AnalysisResult {
            entities: extracted,
            current_billing,
            documentation_enhancements,
            future_opportunities,
            matched_scenarios,
            original_note: note.to_string(),
            compliance_notice: compliance_notice(),
        })
    }

    /// Run the engine rules over externally-proposed billing candidates:
    /// validating decode, then NCCI/modifier post-processing and a
    /// recomputed total.
    pub fn review_candidates(&self, json: &str) -> anyhow::Result<CurrentBilling> {
        let mut billing = decode::decode_billing_candidates(json, &self.code_db)?;
        self.postprocess_lines(&mut billing.codes);
        billing.total_wrvu = self.code_db.calculate_total_wrvu(&billing.codes);
        Ok(billing)
    }

    fn line(
        &self,
        code: &str,
        units: u32,
        engine_wrvu_per_unit: f64,
        status: CodeStatus,
        note: Option<String>,
    ) -> BillingCode {
        let (description, wrvu) = match self.code_db.get_code(code) {
            Some(info) => (info.description.clone(), info.wrvu),
            None => (String::new(), engine_wrvu_per_unit),
        };
        BillingCode {
            code: code.to_string(),
            modifier: None,
            description,
            wrvu,
            units,
            status,
            documentation_note: note,
        }
    }

    fn push_code_units(&self, lines: &mut Vec<BillingCode>, units: &[CodeUnits]) {
        for cu in units {
            let per_unit = cu.wrvu / cu.units.max(1) as f64;
            lines.push(self.line(cu.code, cu.units, per_unit, CodeStatus::Supported, None));
        }
    }

    /// Deterministic maximum billing from derived facts.
    pub fn current_billing(
        &self,
        facts: &ProcedureFacts,
        entities: &ExtractedEntities,
    ) -> CurrentBilling {
        let mut lines: Vec<BillingCode> = Vec::new();
        let mut gaps: Vec<String> = Vec::new();

        if facts.ak_destruction_performed {
            match facts.ak_count {
                Some(count) => self.push_code_units(&mut lines, &ak_destruction_codes(count)),
                None => {
                    lines.push(self.line(
                        "17000",
                        1,
                        0.61,
                        CodeStatus::CountUnspecified,
                        Some("Only the first lesion is billable without a documented count".to_string()),
                    ));
                    gaps.push(
                        "Number of actinic keratoses destroyed is not documented; add-on units \
                         (17003) or the 15+ flat rate (17004) need an exact count"
                            .to_string(),
                    );
                }
            }
        }

        if let Some(site) = facts.genital_site {
            // Genital/anal destruction never falls back to the generic
            // benign codes.
            let extent = if facts.extensive_destruction {
                DestructionExtent::Extensive
            } else {
                DestructionExtent::Simple
            };
            let (code, wrvu) = site_destruction_code(site, extent);
            lines.push(self.line(code, 1, wrvu, CodeStatus::Supported, None));
        } else if facts.wart_destruction_performed {
            match facts.wart_count {
                Some(count) => self.push_code_units(
                    &mut lines,
                    &benign_destruction_codes(count, BenignLesionKind::WartOrMolluscum),
                ),
                None => {
                    lines.push(self.line(
                        "17110",
                        1,
                        0.52,
                        CodeStatus::CountUnspecified,
                        Some("Billed at the under-15 tier without a documented count".to_string()),
                    ));
                    gaps.push(
                        "Number of warts destroyed is not documented; 15 or more supports 17111"
                            .to_string(),
                    );
                }
            }
        }

        if facts.skin_tag_removal_performed {
            match facts.skin_tag_count {
                Some(count) => self.push_code_units(
                    &mut lines,
                    &benign_destruction_codes(count, BenignLesionKind::SkinTag),
                ),
                None => {
                    lines.push(self.line(
                        "11200",
                        1,
                        0.80,
                        CodeStatus::CountUnspecified,
                        Some("Base code covers up to 15 tags".to_string()),
                    ));
                    gaps.push(
                        "Number of skin tags removed is not documented; each group of 10 beyond \
                         15 adds a unit of 11201"
                            .to_string(),
                    );
                }
            }
        }

        self.push_code_units(
            &mut lines,
            &biopsy_codes(
                facts.shave_biopsies,
                facts.punch_biopsies,
                facts.incisional_biopsies,
            ),
        );

        if facts.il_injection_performed {
            match facts.injected_lesions {
                Some(count) => {
                    if let Some((code, wrvu)) = il_injection_code(count) {
                        lines.push(self.line(code, 1, wrvu, CodeStatus::Supported, None));
                    }
                }
                None => {
                    lines.push(self.line(
                        "11900",
                        1,
                        0.51,
                        CodeStatus::CountUnspecified,
                        Some("Billed at the up-to-7 tier without a documented count".to_string()),
                    ));
                    gaps.push(
                        "Number of lesions injected is not documented; more than 7 supports 11901"
                            .to_string(),
                    );
                }
            }
        }

        if facts.nail_debridement_performed {
            match facts.nails_debrided {
                Some(count) => {
                    if let Some((code, wrvu)) = nail_debridement_code(count) {
                        lines.push(self.line(code, 1, wrvu, CodeStatus::Supported, None));
                    }
                }
                None => {
                    lines.push(self.line(
                        "11720",
                        1,
                        0.32,
                        CodeStatus::CountUnspecified,
                        Some("Billed at the 1-5 nail tier without a documented count".to_string()),
                    ));
                    gaps.push(
                        "Number of nails debrided is not documented; 6 or more supports 11721"
                            .to_string(),
                    );
                }
            }
        }

        for aggregated in aggregate_repairs(&facts.repairs) {
            lines.push(self.line(
                &aggregated.code,
                1,
                aggregated.wrvu,
                CodeStatus::Supported,
                None,
            ));
            if let Some(addon) = aggregated.addon {
                lines.push(self.line(
                    addon.code,
                    addon.units,
                    addon.wrvu_per_unit,
                    CodeStatus::Supported,
                    None,
                ));
            }
        }
        if facts.repair_performed && facts.repairs.is_empty() {
            gaps.push("Repair performed but no length is documented; repairs cannot be coded \
                       without measured lengths in cm"
                .to_string());
        }

        for excision in &facts.excisions {
            match excision.margin_mm {
                Some(margin_mm) => {
                    let excised =
                        calculate_excised_diameter(excision.lesion_diameter_mm, margin_mm);
                    let (code, wrvu) = excision_code(excised, &excision.site, excision.malignant);
                    lines.push(self.line(code, 1, wrvu, CodeStatus::Supported, None));
                }
                None => {
                    let excised = excision.lesion_diameter_mm / 10.0;
                    let (code, wrvu) = excision_code(excised, &excision.site, excision.malignant);
                    lines.push(self.line(
                        code,
                        1,
                        wrvu,
                        CodeStatus::MissingDocumentation,
                        Some("Margins not documented; sized at lesion diameter alone".to_string()),
                    ));
                    gaps.push(
                        "Excision margins are not documented; the excised diameter includes \
                         twice the narrowest margin"
                            .to_string(),
                    );
                }
            }
        }

        if facts.flap_performed {
            match (facts.flap_area_sq_cm, facts.flap_site.as_deref()) {
                (Some(area), site) => {
                    let (code, wrvu) = flap_code(area, site.unwrap_or("trunk"));
                    lines.push(self.line(code, 1, wrvu, CodeStatus::Supported, None));
                }
                (None, _) => {
                    gaps.push(
                        "Flap performed but defect size in sq cm is not documented".to_string(),
                    );
                }
            }
        }

        self.postprocess_lines(&mut lines);

        if is_g2211_eligible(&entities.diagnoses) {
            let has_g2211 = lines.iter().any(|l| l.code == "G2211");
            let has_em = lines.iter().any(|l| is_em_code(&l.code));
            if !has_g2211 {
                if has_em {
                    lines.push(self.line("G2211", 1, 0.33, CodeStatus::Supported, None));
                } else {
                    gaps.push(
                        "Chronic condition qualifies for G2211 (+0.33 wRVU) once an E/M service \
                         is documented"
                            .to_string(),
                    );
                }
            }
        }

        let total_wrvu = self.code_db.calculate_total_wrvu(&lines);
        CurrentBilling {
            codes: lines,
            total_wrvu,
            documentation_gaps: gaps,
        }
    }

    /// NCCI and modifier post-processing over a line-item list.
    fn postprocess_lines(&self, lines: &mut Vec<BillingCode>) {
        let codes: Vec<String> = lines.iter().map(|l| l.code.clone()).collect();

        for i in 0..codes.len() {
            for j in (i + 1)..codes.len() {
                match check_ncci_edit(&codes[i], &codes[j]) {
                    NcciDecision::Modifier(modifier) => {
                        let target = if is_em_code(&codes[i]) { i } else { j };
                        if lines[target].modifier.is_none() {
                            lines[target].modifier = Some(modifier.to_string());
                        }
                    }
                    NcciDecision::CannotUnbundle => {
                        let flagged = if lines[i].wrvu <= lines[j].wrvu { i } else { j };
                        let other = if flagged == i { j } else { i };
                        lines[flagged].status = CodeStatus::Flagged;
                        lines[flagged].documentation_note = Some(format!(
                            "NCCI edit with {}: these codes cannot be billed together",
                            codes[other]
                        ));
                    }
                    NcciDecision::Addon | NcciDecision::NoEdit => {}
                }
            }
        }

        // Permissive -25 default: an E/M with any procedure alongside.
        let procedure_codes: Vec<&str> = codes
            .iter()
            .map(String::as_str)
            .filter(|code| !is_em_code(code) && *code != "G2211")
            .collect();
        for line in lines.iter_mut() {
            if is_em_code(&line.code)
                && line.modifier.is_none()
                && needs_modifier_25(&line.code, &procedure_codes)
            {
                line.modifier = Some("25".to_string());
            }
        }
    }

    fn potential(&self, code: &str) -> Option<PotentialCode> {
        self.code_db.get_code(code).map(|info| PotentialCode {
            code: info.code.clone(),
            description: info.description.clone(),
            wrvu: info.wrvu,
        })
    }

    fn enhancements(
        &self,
        facts: &ProcedureFacts,
        entities: &ExtractedEntities,
        current: &CurrentBilling,
    ) -> DocumentationEnhancements {
        let mut enhancements = Vec::new();

        // Simple repairs with no closure-type detail often under-document
        // layered closures actually performed.
        let simple_repairs: Vec<RepairInfo> = facts
            .repairs
            .iter()
            .filter(|r| r.complexity == RepairComplexity::Simple)
            .cloned()
            .collect();
        for aggregated in aggregate_repairs(&simple_repairs) {
            let (enhanced_code, enhanced_wrvu, _) = crate::rules::repair::repair_code(
                RepairComplexity::Intermediate,
                aggregated.anatomic_group,
                aggregated.total_length_cm,
            );
            let delta = enhanced_wrvu - aggregated.wrvu;
            if delta <= 0.0 {
                continue;
            }
            enhancements.push(DocumentationEnhancement {
                issue: "Closure type not documented; repair defaults to simple".to_string(),
                current_code: Some(aggregated.code.clone()),
                current_wrvu: aggregated.wrvu,
                suggested_addition: "If performed, add: 'Wound edges undermined. Layered closure \
                                     with deep dermal sutures.'"
                    .to_string(),
                enhanced_code: Some(enhanced_code.to_string()),
                enhanced_wrvu,
                delta_wrvu: delta,
                priority: Priority::High,
            });
        }

        for excision in &facts.excisions {
            if excision.margin_mm.is_some() {
                continue;
            }
            let current_diameter = excision.lesion_diameter_mm / 10.0;
            let (current_code, current_wrvu) =
                excision_code(current_diameter, &excision.site, excision.malignant);
            // A documented 2 mm margin is a conservative example of what
            // margin documentation recovers.
            let enhanced_diameter = calculate_excised_diameter(excision.lesion_diameter_mm, 2.0);
            let (enhanced_code, enhanced_wrvu) =
                excision_code(enhanced_diameter, &excision.site, excision.malignant);
            let delta = enhanced_wrvu - current_wrvu;
            if delta <= 0.0 {
                continue;
            }
            enhancements.push(DocumentationEnhancement {
                issue: "Narrowest excision margin not documented".to_string(),
                current_code: Some(current_code.to_string()),
                current_wrvu,
                suggested_addition: "Document the narrowest surgical margin in mm; the excised \
                                     diameter includes twice that margin"
                    .to_string(),
                enhanced_code: Some(enhanced_code.to_string()),
                enhanced_wrvu,
                delta_wrvu: delta,
                priority: Priority::High,
            });
        }

        if facts.ak_destruction_performed && facts.ak_count.is_none() {
            enhancements.push(DocumentationEnhancement {
                issue: "Exact AK lesion count not documented".to_string(),
                current_code: Some("17000".to_string()),
                current_wrvu: self.code_db.wrvu("17000"),
                suggested_addition: "State the exact number of lesions destroyed, e.g. '12 AKs \
                                     treated with liquid nitrogen, two freeze-thaw cycles each'"
                    .to_string(),
                enhanced_code: None,
                enhanced_wrvu: 0.0,
                delta_wrvu: 0.0,
                priority: Priority::High,
            });
        }

        if entities.time_documentation.is_none() {
            enhancements.push(DocumentationEnhancement {
                issue: "Total visit time not documented".to_string(),
                current_code: None,
                current_wrvu: 0.0,
                suggested_addition: "Document total time, e.g. 'Total time: 25 minutes, over \
                                     half in counseling', to support time-based E/M selection"
                    .to_string(),
                enhanced_code: None,
                enhanced_wrvu: 0.0,
                delta_wrvu: 0.0,
                priority: Priority::Medium,
            });
        }

        let improvement: f64 = enhancements.iter().map(|e| e.delta_wrvu).sum();
        let improvement = (improvement * 100.0).round() / 100.0;
        DocumentationEnhancements {
            enhancements,
            enhanced_total_wrvu: ((current.total_wrvu + improvement) * 100.0).round() / 100.0,
            improvement,
        }
    }

    fn opportunities(
        &self,
        facts: &ProcedureFacts,
        entities: &ExtractedEntities,
        current: &CurrentBilling,
    ) -> FutureOpportunities {
        let mut opportunities = Vec::new();

        let has_psoriasis = diagnoses_mention(entities, &["psoriasis"]);
        if has_psoriasis && !facts.nail_debridement_performed {
            opportunities.push(FutureOpportunity {
                category: "comorbidity".to_string(),
                finding: "Psoriasis documented".to_string(),
                opportunity: "Nail involvement not examined or documented".to_string(),
                action: "Examine nails for pitting, onycholysis, and subungual debris".to_string(),
                potential_code: self.potential("11721"),
                teaching_point: "About half of psoriasis patients have nail involvement; \
                                 debridement of dystrophic nails is separately billable"
                    .to_string(),
            });
        }

        let billed_g2211 = current.codes.iter().any(|c| c.code == "G2211");
        if is_g2211_eligible(&entities.diagnoses) && !billed_g2211 {
            opportunities.push(FutureOpportunity {
                category: "visit_level".to_string(),
                finding: "Chronic dermatologic condition under ongoing management".to_string(),
                opportunity: "G2211 visit-complexity add-on not captured".to_string(),
                action: "Bill G2211 with the E/M when managing the chronic condition \
                         longitudinally"
                    .to_string(),
                potential_code: self.potential("G2211"),
                teaching_point: "G2211 recognizes continuity of care for chronic conditions and \
                                 stacks with office E/M codes"
                    .to_string(),
            });
        }

        let any_biopsy = facts.shave_biopsies + facts.punch_biopsies + facts.incisional_biopsies > 0;
        if any_biopsy {
            opportunities.push(FutureOpportunity {
                category: "documentation".to_string(),
                finding: "Biopsy performed".to_string(),
                opportunity: "Pathology follow-up not addressed in the note".to_string(),
                action: "Document the pathology plan and result follow-up at the next visit"
                    .to_string(),
                potential_code: None,
                teaching_point: "A documented follow-up plan supports medical necessity for \
                                 subsequent visits and re-excisions"
                    .to_string(),
            });
        }

        let total: f64 = opportunities
            .iter()
            .filter_map(|o| o.potential_code.as_ref())
            .map(|p| p.wrvu)
            .sum();
        FutureOpportunities {
            opportunities,
            total_potential_additional_wrvu: (total * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_analyzer() -> BillingAnalyzer {
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        BillingAnalyzer::load(&data_dir).expect("analyzer loads from data dir")
    }

    const AK_NOTE: &str = "Assessment: multiple actinic keratoses. \
        Destroyed 12 actinic keratoses on the scalp and dorsal hands with \
        liquid nitrogen, two freeze-thaw cycles each.";

    #[test]
    fn ak_note_bills_first_lesion_plus_addons() {
        let analyzer = test_analyzer();
        let result = analyzer.analyze(AK_NOTE).unwrap();
        let codes: Vec<&str> = result
            .current_billing
            .codes
            .iter()
            .map(|c| c.code.as_str())
            .collect();
        assert!(codes.contains(&"17000"));
        assert!(codes.contains(&"17003"));
        let addon = result
            .current_billing
            .codes
            .iter()
            .find(|c| c.code == "17003")
            .unwrap();
        assert_eq!(addon.units, 11);
    }

    #[test]
    fn destruction_without_count_is_count_unspecified() {
        let analyzer = test_analyzer();
        let note = "Actinic keratoses destroyed with cryotherapy on the face.";
        let result = analyzer.analyze(note).unwrap();
        let first = result
            .current_billing
            .codes
            .iter()
            .find(|c| c.code == "17000")
            .expect("17000 billed conservatively");
        assert_eq!(first.status, CodeStatus::CountUnspecified);
        assert!(!result.current_billing.documentation_gaps.is_empty());
    }

    #[test]
    fn repair_note_aggregates_lengths_before_coding() {
        let analyzer = test_analyzer();
        let note = "Two lacerations of the trunk repaired with simple repair: \
                    wound measuring 2.5 cm and a second wound of 3.0 cm, sutured.";
        let result = analyzer.analyze(note).unwrap();
        let repair = result
            .current_billing
            .codes
            .iter()
            .find(|c| c.code.starts_with("120"))
            .expect("aggregated repair line");
        assert_eq!(repair.code, "12002");
    }

    #[test]
    fn genital_warts_never_use_generic_benign_codes() {
        let analyzer = test_analyzer();
        let entities = entities::extract_entities(
            "Condyloma on the penis destroyed with cryotherapy, 4 warts treated.",
        );
        let facts = derive_procedure_facts(
            &entities,
            "Condyloma on the penis destroyed with cryotherapy, 4 warts treated.",
        );
        assert_eq!(facts.genital_site, Some(DestructionSite::MaleGenital));
        let billing = analyzer.current_billing(&facts, &entities);
        let codes: Vec<&str> = billing.codes.iter().map(|c| c.code.as_str()).collect();
        assert!(codes.contains(&"54050"));
        assert!(!codes.contains(&"17110"));
    }

    #[test]
    fn excision_with_margins_sizes_from_excised_diameter() {
        let analyzer = test_analyzer();
        let note = "Excision of a biopsy-proven basal cell carcinoma on the back. \
                    Lesion 8 mm, excised with 3 mm margins. Sutured in layered closure, \
                    wound 2.0 cm.";
        let result = analyzer.analyze(note).unwrap();
        let codes: Vec<&str> = result
            .current_billing
            .codes
            .iter()
            .map(|c| c.code.as_str())
            .collect();
        // (8 + 2*3) / 10 = 1.4 cm -> 2.0 cm malignant trunk tier.
        assert!(codes.contains(&"11602"));
    }

    #[test]
    fn review_candidates_applies_modifier_25_and_recomputes_total() {
        let analyzer = test_analyzer();
        let json = r#"{"codes": [
            {"code": "99214", "units": 1},
            {"code": "17000", "units": 1}
        ], "total_wRVU": 99.0}"#;
        let billing = analyzer.review_candidates(json).unwrap();
        let em = billing.codes.iter().find(|c| c.code == "99214").unwrap();
        assert_eq!(em.modifier.as_deref(), Some("25"));
        let expected = analyzer.code_db().wrvu("99214") + analyzer.code_db().wrvu("17000");
        assert!((billing.total_wrvu - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    }

    #[test]
    fn g2211_attaches_to_em_or_surfaces_as_gap() {
        let analyzer = test_analyzer();
        // No E/M line in the deterministic path: gap, not a line.
        let result = analyzer
            .analyze("Chronic plaque psoriasis, stable. Nail debridement of 8 nails.")
            .unwrap();
        assert!(!result.current_billing.codes.iter().any(|c| c.code == "G2211"));
        assert!(result
            .current_billing
            .documentation_gaps
            .iter()
            .any(|g| g.contains("G2211")));

        // With an E/M among candidates, the add-on lands as a line.
        let json = r#"{"codes": [{"code": "99213"}]}"#;
        let mut billing = analyzer.review_candidates(json).unwrap();
        let entities = crate::models::ExtractedEntities {
            diagnoses: vec!["psoriasis".to_string()],
            ..Default::default()
        };
        if is_g2211_eligible(&entities.diagnoses)
            && billing.codes.iter().any(|c| is_em_code(&c.code))
        {
            billing.codes.push(BillingCode {
                code: "G2211".to_string(),
                modifier: None,
                description: String::new(),
                wrvu: analyzer.code_db().wrvu("G2211"),
                units: 1,
                status: CodeStatus::Supported,
                documentation_note: None,
            });
        }
        assert!(billing.codes.iter().any(|c| c.code == "G2211"));
    }

    #[test]
    fn psoriasis_without_nail_exam_is_an_opportunity() {
        let analyzer = test_analyzer();
        let result = analyzer
            .analyze("Chronic plaque psoriasis flaring on the elbows and knees; \
                      clobetasol refilled.")
            .unwrap();
        assert!(result
            .future_opportunities
            .opportunities
            .iter()
            .any(|o| o.category == "comorbidity"));
        assert!(result
            .documentation_enhancements
            .enhancements
            .iter()
            .any(|e| e.issue.contains("time")));
    }
}
