//! Prompts for cross-reactivity analysis and medicine extraction.
//!
//! Both prompts ask for bare JSON; the parsers on the other side still
//! tolerate prose around it.

use rx_guard_core::oracle::CrossReactivityRequest;

/// System prompt for cross-reactivity analysis.
pub const CROSS_REACTIVITY_SYSTEM_PROMPT: &str = r#"You are a medical AI assistant specializing in drug allergy analysis and cross-reactivity detection.

Your task is to analyze potential cross-reactivity between a patient's known allergies and a prescribed medication.

Key principles:
1. Beta-lactam antibiotics (penicillins, cephalosporins, carbapenems) have cross-reactivity
2. Sulfonamide antibiotics may cross-react with sulfonamide diuretics
3. NSAIDs may have cross-reactivity within the class
4. Consider chemical structure similarities
5. Evaluate severity levels carefully

Respond in JSON format with:
{
    "has_cross_reactivity": boolean,
    "confidence": "low|medium|high",
    "explanation": "detailed explanation",
    "risk_level": "low|medium|high|critical",
    "recommendations": ["list of recommendations"]
}"#;

/// System prompt for medicine-name extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a medical AI assistant that extracts medicine names from prescription text. Always respond with a valid JSON array.";

const UNKNOWN: &str = "Unknown";

/// User prompt describing the patient's allergies and the drug under review.
pub fn make_cross_reactivity_prompt(request: &CrossReactivityRequest) -> String {
    let allergies =
        serde_json::to_string_pretty(&request.allergies).unwrap_or_else(|_| "[]".to_string());
    let drug = &request.drug;

    format!(
        r#"
Patient Allergies:
{}

Prescribed Drug:
- Name: {}
- Generic: {}
- Active Ingredient: {}
- Drug Class: {}

Analyze for potential cross-reactivity and provide your assessment."#,
        allergies,
        drug.name,
        drug.generic_name.as_deref().unwrap_or(UNKNOWN),
        drug.active_ingredient.as_deref().unwrap_or(UNKNOWN),
        drug.drug_class.as_deref().unwrap_or(UNKNOWN),
    )
}

/// User prompt asking for the medicine names in `text` as a JSON array.
pub fn make_extraction_prompt(text: &str) -> String {
    format!(
        r#"
PRESCRIPTION TEXT:
{}

TASK: Extract all medicine names from this prescription text.

REQUIREMENTS:
1. Look for medicine names, drug names, and pharmaceutical products
2. Include brand names and generic names
3. Exclude dosage information, instructions, and non-medicine text
4. Clean up the names (remove dosage, mg, ml, etc.)
5. Return only the core medicine names

Return a JSON array of medicine names only:
["medicine1", "medicine2", "medicine3"]

EXAMPLE:
For text "1. Paracetamol 650mg - Take twice daily\n2. Ibuprofen 400mg - As needed"
Return: ["Paracetamol", "Ibuprofen"]"#,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_guard_core::models::{Drug, PatientAllergy, Severity};

    #[test]
    fn test_cross_reactivity_prompt() {
        let drug = Drug::new(1, "Cephalexin 500mg").with_generic("Cephalexin", "Cephalexin");
        let allergy = PatientAllergy::new(1, 10, Severity::Severe).with_reaction("Hives");
        let request = CrossReactivityRequest::new([("Penicillin", &allergy)], &drug);

        let prompt = make_cross_reactivity_prompt(&request);
        assert!(prompt.contains("\"allergen\": \"Penicillin\""));
        assert!(prompt.contains("\"severity\": \"severe\""));
        assert!(prompt.contains("- Name: Cephalexin 500mg"));
        assert!(prompt.contains("- Drug Class: Unknown"));
    }

    #[test]
    fn test_extraction_prompt() {
        let prompt = make_extraction_prompt("Rx: Crocin 500mg");
        assert!(prompt.contains("Rx: Crocin 500mg"));
        assert!(prompt.contains("JSON array"));
    }
}
