//! Allergen and drug reference models.

use serde::{Deserialize, Serialize};

/// Identifier of an allergen row.
pub type AllergenId = i64;

/// Identifier of a drug row.
pub type DrugId = i64;

/// Kind of substance an allergen describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AllergenType {
    DrugClass,
    ActiveIngredient,
    InactiveIngredient,
}

impl AllergenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllergenType::DrugClass => "drug_class",
            AllergenType::ActiveIngredient => "active_ingredient",
            AllergenType::InactiveIngredient => "inactive_ingredient",
        }
    }

    /// Parse a stored type; anything unrecognised is treated as an active ingredient.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "drug_class" | "class" => AllergenType::DrugClass,
            "inactive_ingredient" | "inactive" | "excipient" => AllergenType::InactiveIngredient,
            _ => AllergenType::ActiveIngredient,
        }
    }
}

/// A named substance that can trigger an allergic reaction.
///
/// Immutable reference data once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allergen {
    /// Row identifier
    pub id: AllergenId,
    /// Display name (e.g., "Penicillin")
    pub name: String,
    /// Substance kind
    pub allergen_type: AllergenType,
    /// Cross-sensitivity group tag (e.g., "beta_lactams"); `None` means no group
    pub cross_sensitivity_group: Option<String>,
    /// Free-text description
    pub description: Option<String>,
}

impl Allergen {
    /// Create an allergen with no group membership.
    pub fn new(id: AllergenId, name: impl Into<String>, allergen_type: AllergenType) -> Self {
        Self {
            id,
            name: name.into(),
            allergen_type,
            cross_sensitivity_group: None,
            description: None,
        }
    }

    /// Builder-style group assignment.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.cross_sensitivity_group = Some(group.into());
        self
    }

    /// Group tag, ignoring blank strings.
    pub fn group(&self) -> Option<&str> {
        self.cross_sensitivity_group
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }
}

/// A drug product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    /// Row identifier
    pub id: DrugId,
    /// Product name (e.g., "Amoxicillin 500mg")
    pub name: String,
    /// Generic name
    pub generic_name: Option<String>,
    /// Active ingredient
    pub active_ingredient: Option<String>,
    /// Therapeutic class (e.g., "Penicillin antibiotic")
    pub drug_class: Option<String>,
    /// Strength (e.g., "500mg")
    pub strength: Option<String>,
    /// Dosage form (tablet, capsule, liquid, injection)
    pub dosage_form: Option<String>,
}

impl Drug {
    /// Create a new drug with required fields.
    pub fn new(id: DrugId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            generic_name: None,
            active_ingredient: None,
            drug_class: None,
            strength: None,
            dosage_form: None,
        }
    }

    /// Builder-style generic name and active ingredient.
    pub fn with_generic(mut self, generic_name: &str, active_ingredient: &str) -> Self {
        self.generic_name = Some(generic_name.to_string());
        self.active_ingredient = Some(active_ingredient.to_string());
        self
    }

    /// Builder-style drug class.
    pub fn with_class(mut self, drug_class: &str) -> Self {
        self.drug_class = Some(drug_class.to_string());
        self
    }

    /// Whether any searchable field contains the query (case-insensitive).
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_ascii_lowercase();
        [
            Some(self.name.as_str()),
            self.generic_name.as_deref(),
            self.active_ingredient.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_ascii_lowercase().contains(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allergen_type_parse() {
        assert_eq!(AllergenType::parse("drug_class"), AllergenType::DrugClass);
        assert_eq!(AllergenType::parse("Inactive_Ingredient"), AllergenType::InactiveIngredient);
        assert_eq!(AllergenType::parse("active_ingredient"), AllergenType::ActiveIngredient);
        // Legacy "drug" rows
        assert_eq!(AllergenType::parse("drug"), AllergenType::ActiveIngredient);
    }

    #[test]
    fn test_blank_group_is_no_group() {
        let allergen = Allergen::new(1, "Lactose", AllergenType::InactiveIngredient).with_group("  ");
        assert_eq!(allergen.group(), None);

        let allergen = Allergen::new(2, "Penicillin", AllergenType::ActiveIngredient)
            .with_group("beta_lactams");
        assert_eq!(allergen.group(), Some("beta_lactams"));
    }

    #[test]
    fn test_drug_matches_any_field() {
        let drug = Drug::new(1, "Tylenol 500mg").with_generic("Acetaminophen", "Paracetamol");

        assert!(drug.matches("tylenol"));
        assert!(drug.matches("ACETAMINOPHEN"));
        assert!(drug.matches("paracet"));
        assert!(!drug.matches("ibuprofen"));
    }
}
