//! Deterministic entity extraction from clinical note text.
//!
//! Everything here is plain keyword and number scanning over an
//! ASCII-lowercased copy of the note (byte offsets match the original, so
//! context slices stay cheap). The output contract is what matters: every
//! downstream billing decision keys off these counts and measurements.

use crate::models::{ExtractedEntities, Measurement, MeasurementKind};

const SITE_TERMS: &[&str] = &[
    "scalp", "forehead", "temple", "face", "cheek", "chin", "nose", "nasal", "ear",
    "periorbital", "eyelid", "lip", "neck", "chest", "back", "trunk", "abdomen", "flank",
    "shoulder", "axilla", "breast", "buttock", "forearm", "arm", "elbow", "wrist", "hand",
    "palm", "finger", "thumb", "thigh", "leg", "knee", "shin", "calf", "ankle", "foot",
    "toe", "heel", "sole", "plantar", "palmar", "nail", "penis", "scrotum", "genital",
    "vulva", "labia", "perianal", "anal",
];

const DIRECTION_PREFIXES: &[&str] = &["left ", "right ", "bilateral "];

const PROCEDURE_TERMS: &[&str] = &[
    "shave biopsy", "shave biopsies", "punch biopsy", "punch biopsies",
    "incisional biopsy", "incisional biopsies", "excisional biopsy", "skin biopsy",
    "cryotherapy", "cryosurgery", "liquid nitrogen", "electrodesiccation", "curettage",
    "destruction", "destroyed", "excision", "excised", "shave removal",
    "simple repair", "intermediate repair", "complex repair", "layered closure",
    "primary closure", "sutured", "mohs", "intralesional", "injected", "injection",
    "nail debridement", "nail avulsion", "debridement", "advancement flap",
    "rotation flap", "transposition flap", "bilobed flap", "rhombic flap", "skin graft",
    "incision and drainage", "patch test",
];

const DIAGNOSIS_TERMS: &[&str] = &[
    "plaque psoriasis", "guttate psoriasis", "psoriasis", "eczema", "atopic dermatitis",
    "contact dermatitis", "seborrheic dermatitis", "rosacea", "acne", "onychomycosis",
    "tinea", "cellulitis", "folliculitis", "herpes", "condyloma", "wart", "warts",
    "verruca", "molluscum", "melanoma", "basal cell carcinoma", "bcc",
    "squamous cell carcinoma", "scc", "actinic keratosis", "actinic keratoses",
    "seborrheic keratosis", "dysplastic nevus", "atypical nevus", "lipoma",
    "epidermal cyst", "pilar cyst", "cyst", "alopecia", "vitiligo", "hidradenitis",
    "chronic urticaria", "urticaria", "lichen planus", "morphea", "skin tag",
    "skin tags", "pruritus",
];

const MEDICATION_TERMS: &[&str] = &[
    "triamcinolone", "kenalog", "clobetasol", "betamethasone", "hydrocortisone",
    "fluocinonide", "mometasone", "desonide", "tacrolimus", "pimecrolimus",
    "calcipotriene", "tretinoin", "adapalene", "benzoyl peroxide", "metronidazole",
    "ivermectin", "azelaic acid", "doxycycline", "minocycline", "isotretinoin",
    "methotrexate", "acitretin", "prednisone", "dupilumab", "dupixent", "adalimumab",
    "humira", "etanercept", "secukinumab", "ustekinumab", "fluorouracil", "bleomycin",
];

/// Extract all entities from a note using the fixed vocabularies and the
/// measurement scanner.
pub fn extract_entities(note: &str) -> ExtractedEntities {
    ExtractedEntities {
        diagnoses: match_vocabulary(note, DIAGNOSIS_TERMS, false),
        procedures: match_vocabulary(note, PROCEDURE_TERMS, false),
        anatomic_sites: match_vocabulary(note, SITE_TERMS, true),
        measurements: parse_measurements(note),
        medications: match_vocabulary(note, MEDICATION_TERMS, false),
        time_documentation: extract_time_documentation(note),
    }
}

/// Merge two extractions, primary first. String lists union
/// case-insensitively preserving first-seen order; measurements are kept
/// from both sources.
pub fn merge_entities(
    primary: ExtractedEntities,
    secondary: ExtractedEntities,
) -> ExtractedEntities {
    let mut merged = primary;
    for dx in secondary.diagnoses {
        push_unique(&mut merged.diagnoses, dx);
    }
    for proc in secondary.procedures {
        push_unique(&mut merged.procedures, proc);
    }
    for site in secondary.anatomic_sites {
        push_unique(&mut merged.anatomic_sites, site);
    }
    for med in secondary.medications {
        push_unique(&mut merged.medications, med);
    }
    merged.measurements.extend(secondary.measurements);
    if merged.time_documentation.is_none() {
        merged.time_documentation = secondary.time_documentation;
    }
    merged
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.iter().any(|x| x.eq_ignore_ascii_case(&item)) {
        list.push(item);
    }
}

/// Find a vocabulary term at a word boundary. The character before the
/// match must be non-alphanumeric, and the matched word may only continue
/// as a plural ("s"/"es") so that "forearm" never matches "ear" and
/// "analysis" never matches "anal".
fn find_term(lower: &str, term: &str) -> Option<usize> {
    for (pos, _) in lower.match_indices(term) {
        let starts_word = pos == 0
            || !lower[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if !starts_word {
            continue;
        }
        let rest: String = lower[pos + term.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if matches!(rest.as_str(), "" | "s" | "es") {
            return Some(pos);
        }
    }
    None
}

fn match_vocabulary(text: &str, vocabulary: &[&str], with_direction: bool) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let mut found: Vec<(usize, String)> = Vec::new();
    for term in vocabulary {
        let Some(pos) = find_term(&lower, term) else {
            continue;
        };
        let mut value = term.to_string();
        if with_direction {
            for prefix in DIRECTION_PREFIXES {
                if lower[..pos].ends_with(prefix) {
                    value = format!("{prefix}{term}");
                    break;
                }
            }
        }
        found.push((pos, value));
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut out = Vec::new();
    for (_, value) in found {
        push_unique(&mut out, value);
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct NumberHit {
    value: f64,
    start: usize,
    end: usize,
}

/// Scan for standalone decimal numbers. Numbers glued to a preceding
/// letter (lot numbers, code fragments) are skipped.
fn scan_numbers(lower: &str) -> Vec<NumberHit> {
    let bytes = lower.as_bytes();
    let mut hits = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        let mut seen_dot = false;
        let mut j = i + 1;
        while j < bytes.len() {
            if bytes[j].is_ascii_digit() {
                j += 1;
            } else if bytes[j] == b'.'
                && !seen_dot
                && j + 1 < bytes.len()
                && bytes[j + 1].is_ascii_digit()
            {
                seen_dot = true;
                j += 1;
            } else {
                break;
            }
        }
        let preceded_by_letter = start > 0 && bytes[start - 1].is_ascii_alphabetic();
        if !preceded_by_letter {
            if let Ok(value) = lower[start..j].parse::<f64>() {
                hits.push(NumberHit {
                    value,
                    start,
                    end: j,
                });
            }
        }
        i = j;
    }
    hits
}

fn words_after(lower: &str, from: usize, max: usize) -> Vec<&str> {
    // Trims punctuation off word ends; interior characters ("4.5") survive.
    lower[from..]
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|w| !w.is_empty())
        .take(max)
        .collect()
}

fn slice_context(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(20);
    let mut to = (end + 20).min(text.len());
    while from < text.len() && !text.is_char_boundary(from) {
        from += 1;
    }
    while to > 0 && !text.is_char_boundary(to) {
        to -= 1;
    }
    text[from..to].trim().to_string()
}

fn count_kind(tokens: &[&str]) -> Option<(MeasurementKind, &'static str)> {
    let first = tokens.first().copied().unwrap_or("");
    let second = tokens.get(1).copied().unwrap_or("");

    if (first == "actinic" && second.starts_with("keratos")) || first == "ak" || first == "aks" {
        return Some((MeasurementKind::AkCount, "lesions"));
    }
    if first.starts_with("wart") || first.starts_with("verruca") || first.starts_with("molluscum") {
        return Some((MeasurementKind::WartCount, "lesions"));
    }
    if first == "skin" && second.starts_with("tag") {
        return Some((MeasurementKind::SkinTagCount, "lesions"));
    }
    if (first == "shave" || first == "punch" || first == "incisional") && second.starts_with("biops")
    {
        return Some((MeasurementKind::BiopsyCount, "biopsies"));
    }
    if first.starts_with("biops") {
        return Some((MeasurementKind::BiopsyCount, "biopsies"));
    }
    if first.starts_with("nail") {
        return Some((MeasurementKind::NailCount, "nails"));
    }
    if first.starts_with("lesion")
        || first.starts_with("spot")
        || first.starts_with("mole")
        || first == "nevi"
        || first == "nevus"
    {
        return Some((MeasurementKind::LesionCount, "lesions"));
    }
    None
}

/// Parse sizes, dimension pairs, margins, areas, and per-family lesion
/// counts out of note text.
pub fn parse_measurements(text: &str) -> Vec<Measurement> {
    let lower = text.to_ascii_lowercase();
    let numbers = scan_numbers(&lower);
    let mut consumed = vec![false; numbers.len()];
    let mut out = Vec::new();

    for (idx, hit) in numbers.iter().enumerate() {
        if consumed[idx] {
            continue;
        }
        let tokens = words_after(&lower, hit.end, 4);
        let first = tokens.first().copied().unwrap_or("");
        let second = tokens.get(1).copied().unwrap_or("");
        let context = slice_context(text, hit.start, hit.end);

        // Dimension pair: "A x B cm". The second number is consumed; the
        // largest dimension drives sizing.
        if first == "x" {
            if let Ok(other) = second.parse::<f64>() {
                let unit = tokens.get(2).copied().unwrap_or("");
                if unit == "cm" || unit == "mm" {
                    if let Some(next) = numbers.get(idx + 1) {
                        if next.start > hit.end {
                            consumed[idx + 1] = true;
                        }
                    }
                    out.push(Measurement {
                        kind: MeasurementKind::Dimensions,
                        value: hit.value.max(other),
                        unit: unit.to_string(),
                        context: slice_context(text, hit.start, hit.end + 12),
                    });
                    continue;
                }
            }
        }

        if (first == "sq" && second.starts_with("cm")) || first == "cm2" {
            out.push(Measurement {
                kind: MeasurementKind::Area,
                value: hit.value,
                unit: "sq cm".to_string(),
                context,
            });
            continue;
        }

        if first == "cm" || first == "mm" {
            let before = &lower[hit.start.saturating_sub(20)..hit.start];
            let kind = if second.starts_with("margin") || before.contains("margin") {
                MeasurementKind::Margin
            } else {
                MeasurementKind::Size
            };
            out.push(Measurement {
                kind,
                value: hit.value,
                unit: first.to_string(),
                context,
            });
            continue;
        }

        if let Some((kind, unit)) = count_kind(&tokens) {
            out.push(Measurement {
                kind,
                value: hit.value,
                unit: unit.to_string(),
                context,
            });
        }
    }

    out
}

const TIME_HINTS: &[&str] = &["time", "spent", "counsel", "total"];

/// First documented time-in-minutes phrase, if any.
pub fn extract_time_documentation(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    for hit in scan_numbers(&lower) {
        let tokens = words_after(&lower, hit.end, 2);
        let first = tokens.first().copied().unwrap_or("");
        if !(first == "min" || first == "mins" || first.starts_with("minute")) {
            continue;
        }
        let before = &lower[hit.start.saturating_sub(40)..hit.start];
        let after = words_after(&lower, hit.end, 3).join(" ");
        if TIME_HINTS.iter().any(|h| before.contains(h)) || after.contains("spent") {
            return Some(slice_context(text, hit.start.saturating_sub(20), hit.end + 10));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "Chronic plaque psoriasis, stable on clobetasol. \
        Destroyed 12 actinic keratoses on the scalp and left forearm with \
        liquid nitrogen. Shave biopsy of a 6 mm lesion on the right cheek; \
        margins of 2 mm were marked. Laceration repaired with layered \
        closure, 3.5 cm on the back. Total time spent: 25 minutes.";

    #[test]
    fn vocabulary_matching_dedupes_and_keeps_note_order() {
        let entities = extract_entities(NOTE);
        assert!(entities.diagnoses.iter().any(|d| d == "plaque psoriasis"));
        assert!(entities.procedures.iter().any(|p| p == "shave biopsy"));
        assert!(entities.procedures.iter().any(|p| p == "layered closure"));
        assert!(entities.anatomic_sites.iter().any(|s| s == "scalp"));
        assert!(entities.anatomic_sites.iter().any(|s| s == "left forearm"));
        assert!(entities.medications.iter().any(|m| m == "clobetasol"));
    }

    #[test]
    fn word_boundaries_prevent_embedded_matches() {
        let entities = extract_entities("Dermoscopic analysis of the forearm.");
        assert!(entities.anatomic_sites.iter().any(|s| s == "forearm"));
        assert!(!entities.anatomic_sites.iter().any(|s| s == "anal"));
        assert!(!entities.anatomic_sites.iter().any(|s| s == "ear"));
    }

    #[test]
    fn measurements_capture_counts_sizes_and_margins() {
        let measurements = parse_measurements(NOTE);
        let ak = measurements
            .iter()
            .find(|m| m.kind == MeasurementKind::AkCount)
            .expect("ak count");
        assert_eq!(ak.value, 12.0);

        let size = measurements
            .iter()
            .find(|m| m.kind == MeasurementKind::Size && m.unit == "mm")
            .expect("lesion size");
        assert_eq!(size.value, 6.0);

        let margin = measurements
            .iter()
            .find(|m| m.kind == MeasurementKind::Margin)
            .expect("margin");
        assert_eq!(margin.value, 2.0);

        let repair = measurements
            .iter()
            .find(|m| m.kind == MeasurementKind::Size && m.unit == "cm")
            .expect("repair length");
        assert!((repair.value - 3.5).abs() < 1e-9);
    }

    #[test]
    fn dimension_pairs_consume_both_numbers_and_keep_the_largest() {
        let measurements = parse_measurements("Defect measured 2.5 x 4 cm after excision.");
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].kind, MeasurementKind::Dimensions);
        assert!((measurements[0].value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn area_measurements_use_sq_cm() {
        let measurements = parse_measurements("Flap covered an 8 sq cm defect.");
        assert_eq!(measurements[0].kind, MeasurementKind::Area);
        assert_eq!(measurements[0].unit, "sq cm");
    }

    #[test]
    fn time_documentation_requires_a_time_hint() {
        assert!(extract_time_documentation(NOTE).is_some());
        assert!(extract_time_documentation("Patient is 45 minutes late.").is_none());
    }

    #[test]
    fn merge_unions_case_insensitively_and_prefers_primary_time() {
        let a = ExtractedEntities {
            diagnoses: vec!["Psoriasis".to_string()],
            time_documentation: None,
            ..Default::default()
        };
        let b = ExtractedEntities {
            diagnoses: vec!["psoriasis".to_string(), "acne".to_string()],
            time_documentation: Some("25 minutes".to_string()),
            ..Default::default()
        };
        let merged = merge_entities(a, b);
        assert_eq!(merged.diagnoses, vec!["Psoriasis", "acne"]);
        assert_eq!(merged.time_documentation.as_deref(), Some("25 minutes"));
    }
}
