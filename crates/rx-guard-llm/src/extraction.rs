//! Medicine-name extraction from prescription text.
//!
//! The LLM is asked first; any failure falls back to regex patterns. Either
//! way the candidates go through [`ExtractedMedicines`], which cleans,
//! filters and de-duplicates them lazily and stops after
//! [`MAX_EXTRACTED_MEDICINES`].

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::client::ChatCompletion;
use crate::prompts::{make_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::{ExtractionError, ExtractionResult};

/// Most names yielded for one document.
pub const MAX_EXTRACTED_MEDICINES: usize = 10;

/// Names this short (in characters) or shorter are dropped.
const MIN_NAME_CHARS: usize = 2;

static DOSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s*(?:mg|ml|g|mcg|units?)\b").unwrap());
static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tablet|capsule|syrup|injection|drops?|cream|ointment)\b").unwrap()
});
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

static PRESCRIPTION_LINE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // "1. Paracetamol 650mg - ..."
        Regex::new(r"(?mi)(?:^|\n)\s*\d+\.\s*([A-Za-z][A-Za-z\s]+?)(?:\s+\d+|\s*-|\s*$)").unwrap(),
        // "Rx: Amoxicillin 500", "Tab Dolo"
        Regex::new(r"(?mi)(?:Rx:?|Tab:?|Cap:?|Syp:?)\s*([A-Za-z][A-Za-z\s]+?)(?:\s+\d+|\s*$)").unwrap(),
        // "Ibuprofen 400 mg"
        Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z]?[a-z]+)*)\s+\d+\s*(?:mg|ml|g)\b").unwrap(),
    ]
});

/// Names recognized anywhere in the text, even without a pattern hit.
const COMMON_MEDICINES: &[&str] = &[
    "paracetamol",
    "ibuprofen",
    "aspirin",
    "crocin",
    "dolo",
    "azithromycin",
    "amoxicillin",
];

/// Strip dosages, dosage-form words and punctuation; collapse whitespace.
pub fn clean_medicine_name(name: &str) -> String {
    let name = DOSAGE_RE.replace_all(name, "");
    let name = FORM_RE.replace_all(&name, "");
    let name = PUNCT_RE.replace_all(&name, " ");
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an LLM reply that should hold a JSON array of names.
///
/// Prose around the array is ignored; non-string items are skipped.
pub fn parse_medicine_list(response: &str) -> ExtractionResult<Vec<String>> {
    let start = response
        .find('[')
        .ok_or_else(|| ExtractionError::InvalidFormat("No JSON array found in response".into()))?;
    let end = response
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| ExtractionError::InvalidFormat("No closing bracket found in response".into()))?;

    let value: Value = serde_json::from_str(&response[start..=end])?;
    let items = value
        .as_array()
        .ok_or_else(|| ExtractionError::InvalidFormat("Response is not a JSON array".into()))?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Regex fallback used when no LLM answer is available.
pub fn extract_with_patterns(text: &str) -> ExtractedMedicines {
    let mut candidates: Vec<String> = PRESCRIPTION_LINE_RES
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();

    for word in text.to_lowercase().split_whitespace() {
        if let Some(known) = COMMON_MEDICINES.iter().find(|known| word.contains(*known)) {
            candidates.push(title_case(known));
        }
    }

    ExtractedMedicines::new(candidates)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cleaned, de-duplicated medicine names, at most [`MAX_EXTRACTED_MEDICINES`].
///
/// Consumed once; cleaning happens as items are pulled.
#[derive(Debug)]
pub struct ExtractedMedicines {
    candidates: std::vec::IntoIter<String>,
    seen: HashSet<String>,
}

impl ExtractedMedicines {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates: candidates.into_iter(),
            seen: HashSet::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for ExtractedMedicines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.seen.len() >= MAX_EXTRACTED_MEDICINES {
            return None;
        }
        for raw in self.candidates.by_ref() {
            let name = clean_medicine_name(&raw);
            if name.chars().count() <= MIN_NAME_CHARS {
                continue;
            }
            if self.seen.insert(name.clone()) {
                return Some(name);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = MAX_EXTRACTED_MEDICINES - self.seen.len();
        (0, Some(self.candidates.len().min(left)))
    }
}

impl FusedIterator for ExtractedMedicines {}

/// LLM-first medicine extractor.
pub struct MedicineExtractor<C: ChatCompletion> {
    client: C,
}

impl<C: ChatCompletion> MedicineExtractor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Extract medicine names from prescription text.
    pub fn extract(&self, text: &str) -> ExtractedMedicines {
        if text.trim().is_empty() {
            return ExtractedMedicines::empty();
        }

        let reply = self
            .client
            .complete(EXTRACTION_SYSTEM_PROMPT, &make_extraction_prompt(text))
            .and_then(|reply| parse_medicine_list(&reply));

        match reply {
            Ok(names) => {
                tracing::debug!(candidates = names.len(), "medicine names extracted by LLM");
                ExtractedMedicines::new(names)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM extraction failed, falling back to patterns");
                extract_with_patterns(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reply(Result<&'static str, &'static str>);

    impl ChatCompletion for Reply {
        fn complete(&self, _system: &str, _user: &str) -> ExtractionResult<String> {
            self.0
                .map(String::from)
                .map_err(|e| ExtractionError::Inference(e.to_string()))
        }
    }

    #[test]
    fn test_clean_medicine_name() {
        assert_eq!(clean_medicine_name("Paracetamol 650mg"), "Paracetamol");
        assert_eq!(clean_medicine_name("Amoxicillin 500 mg capsule"), "Amoxicillin");
        assert_eq!(clean_medicine_name("Dolo-650 tablet"), "Dolo 650");
        assert_eq!(clean_medicine_name("  Cough   Syrup 10ml "), "Cough");
    }

    #[test]
    fn test_parse_medicine_list_with_prose() {
        let reply = "Here are the medicines:\n[\"Paracetamol\", \"Ibuprofen\", 3, \"\"]\nDone.";
        assert_eq!(
            parse_medicine_list(reply).unwrap(),
            vec!["Paracetamol", "Ibuprofen"]
        );
    }

    #[test]
    fn test_parse_medicine_list_rejects_objects() {
        assert!(matches!(
            parse_medicine_list(r#"{"medicines": "none"}"#),
            Err(ExtractionError::InvalidFormat(_))
        ));
        assert!(parse_medicine_list("[not json]").is_err());
    }

    #[test]
    fn test_patterns_numbered_list() {
        let text = "1. Paracetamol 650mg - Take twice daily\n2. Ibuprofen 400mg - As needed";
        let names: Vec<String> = extract_with_patterns(text).collect();
        assert_eq!(names, vec!["Paracetamol", "Ibuprofen"]);
    }

    #[test]
    fn test_patterns_rx_prefix() {
        let names: Vec<String> = extract_with_patterns("Rx: Cetirizine 10").collect();
        assert_eq!(names, vec!["Cetirizine"]);
    }

    #[test]
    fn test_short_and_duplicate_names_dropped() {
        let names: Vec<String> = ExtractedMedicines::new(vec![
            "Aspirin".into(),
            "B1".into(),
            "Aspirin 75mg".into(),
            "Zinc".into(),
        ])
        .collect();
        assert_eq!(names, vec!["Aspirin", "Zinc"]);
    }

    #[test]
    fn test_capped_at_max() {
        let candidates = (0..25).map(|i| format!("Medicine{}", (b'a' + i) as char)).collect();
        let extracted = ExtractedMedicines::new(candidates);
        assert_eq!(extracted.count(), MAX_EXTRACTED_MEDICINES);
    }

    #[test]
    fn test_extractor_prefers_llm() {
        let extractor = MedicineExtractor::new(Reply(Ok(r#"["Crocin 500mg", "Azithromycin"]"#)));
        let names: Vec<String> = extractor.extract("Tab Crocin 500mg, Azithral").collect();
        assert_eq!(names, vec!["Crocin", "Azithromycin"]);
    }

    #[test]
    fn test_extractor_falls_back_to_patterns() {
        let extractor = MedicineExtractor::new(Reply(Err("connection refused")));
        let names: Vec<String> = extractor.extract("Rx: Amoxicillin 500").collect();
        assert_eq!(names, vec!["Amoxicillin"]);
    }

    #[test]
    fn test_extractor_blank_text() {
        let extractor = MedicineExtractor::new(Reply(Ok("[\"Aspirin\"]")));
        assert_eq!(extractor.extract("   ").count(), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn extracted_names_are_bounded_and_unique(
                candidates in proptest::collection::vec("[A-Za-z0-9 .-]{0,16}", 0..40)
            ) {
                let names: Vec<String> = ExtractedMedicines::new(candidates).collect();

                prop_assert!(names.len() <= MAX_EXTRACTED_MEDICINES);
                let unique: HashSet<&String> = names.iter().collect();
                prop_assert_eq!(unique.len(), names.len());
                for name in &names {
                    prop_assert!(name.chars().count() > MIN_NAME_CHARS);
                    prop_assert_eq!(name.trim(), name.as_str());
                }
            }

            #[test]
            fn pattern_fallback_never_panics(text in "\\PC{0,200}") {
                prop_assert!(extract_with_patterns(&text).count() <= MAX_EXTRACTED_MEDICINES);
            }
        }
    }
}
