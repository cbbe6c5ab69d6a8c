//! In-memory, read-only copy of the catalog.
//!
//! Reference data does not change during a prescription check, so a snapshot
//! can be loaded once and shared across concurrent checks.

use std::collections::{BTreeMap, BTreeSet};

use super::{Catalog, CatalogResult, PREFIX_SUGGESTION_LIMIT, SUBSTRING_SUGGESTION_LIMIT};
use crate::db::{Database, DbResult};
use crate::models::{Allergen, AllergenId, Drug, DrugId};
use crate::resolver::{merge_suggestions, prefix_key, resolve_drug, DrugMatch};

/// Drugs, allergens and mappings held in memory.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    drugs: BTreeMap<DrugId, Drug>,
    allergens: BTreeMap<AllergenId, Allergen>,
    mappings: BTreeMap<DrugId, BTreeSet<AllergenId>>,
}

impl CatalogSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the whole catalog out of the database.
    pub fn load(db: &Database) -> DbResult<Self> {
        let mut snapshot = Self::new();
        for drug in db.list_drugs()? {
            snapshot.drugs.insert(drug.id, drug);
        }
        for allergen in db.list_allergens()? {
            snapshot.allergens.insert(allergen.id, allergen);
        }
        for (drug_id, allergen_id) in db.list_drug_allergen_mappings()? {
            snapshot.mappings.entry(drug_id).or_default().insert(allergen_id);
        }

        tracing::debug!(
            drugs = snapshot.drugs.len(),
            allergens = snapshot.allergens.len(),
            "catalog snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Builder-style drug insertion (replaces a drug with the same ID).
    pub fn with_drug(mut self, drug: Drug) -> Self {
        self.drugs.insert(drug.id, drug);
        self
    }

    /// Builder-style allergen insertion (replaces an allergen with the same ID).
    pub fn with_allergen(mut self, allergen: Allergen) -> Self {
        self.allergens.insert(allergen.id, allergen);
        self
    }

    /// Builder-style mapping; repeating a pair has no effect.
    pub fn with_mapping(mut self, drug_id: DrugId, allergen_id: AllergenId) -> Self {
        self.mappings.entry(drug_id).or_default().insert(allergen_id);
        self
    }

    pub fn drug_count(&self) -> usize {
        self.drugs.len()
    }

    pub fn allergen_count(&self) -> usize {
        self.allergens.len()
    }
}

fn starts_with_ignore_case(field: &str, prefix_lower: &str) -> bool {
    field.to_ascii_lowercase().starts_with(prefix_lower)
}

impl Catalog for CatalogSnapshot {
    fn find_drug(&self, query: &str) -> CatalogResult<Option<DrugMatch>> {
        let candidates: Vec<Drug> = self
            .drugs
            .values()
            .filter(|drug| drug.matches(query.trim()))
            .cloned()
            .collect();
        Ok(resolve_drug(&candidates, query))
    }

    fn suggest_drugs(&self, query: &str, limit: usize) -> CatalogResult<Vec<String>> {
        let prefix_matches: Vec<String> = match prefix_key(query) {
            Some(prefix) => {
                let prefix_lower = prefix.to_ascii_lowercase();
                self.drugs
                    .values()
                    .filter(|drug| {
                        starts_with_ignore_case(&drug.name, &prefix_lower)
                            || drug
                                .generic_name
                                .as_deref()
                                .is_some_and(|g| starts_with_ignore_case(g, &prefix_lower))
                    })
                    .take(PREFIX_SUGGESTION_LIMIT)
                    .map(|drug| drug.name.clone())
                    .collect()
            }
            None => Vec::new(),
        };

        let trimmed = query.trim();
        let substring_matches: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            self.drugs
                .values()
                .filter(|drug| drug.matches(trimmed))
                .take(SUBSTRING_SUGGESTION_LIMIT)
                .map(|drug| drug.name.clone())
                .collect()
        };

        Ok(merge_suggestions(prefix_matches, substring_matches, limit))
    }

    fn allergens_for_drug(&self, drug_id: DrugId) -> CatalogResult<Vec<AllergenId>> {
        Ok(self
            .mappings
            .get(&drug_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn allergen(&self, allergen_id: AllergenId) -> CatalogResult<Option<Allergen>> {
        Ok(self.allergens.get(&allergen_id).cloned())
    }

    fn find_allergen_by_name(&self, name: &str) -> CatalogResult<Option<Allergen>> {
        let needle = name.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let exact = self
            .allergens
            .values()
            .find(|a| a.name.to_ascii_lowercase() == needle);
        let found = exact.or_else(|| {
            self.allergens
                .values()
                .find(|a| a.name.to_ascii_lowercase().contains(&needle))
        });
        Ok(found.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllergenType;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_drug(Drug::new(1, "Amoxicillin 500mg").with_generic("Amoxicillin", "Amoxicillin"))
            .with_drug(Drug::new(2, "Ibuprofen 200mg").with_generic("Ibuprofen", "Ibuprofen"))
            .with_allergen(
                Allergen::new(10, "Penicillin V", AllergenType::ActiveIngredient).with_group("beta_lactams"),
            )
            .with_allergen(
                Allergen::new(11, "Penicillin", AllergenType::ActiveIngredient).with_group("beta_lactams"),
            )
            .with_mapping(1, 11)
            .with_mapping(1, 11)
    }

    #[test]
    fn test_mapping_idempotent() {
        assert_eq!(snapshot().allergens_for_drug(1).unwrap(), vec![11]);
        assert!(snapshot().allergens_for_drug(2).unwrap().is_empty());
    }

    #[test]
    fn test_find_allergen_exact_before_substring() {
        let catalog = snapshot();

        assert_eq!(catalog.find_allergen_by_name("penicillin").unwrap().unwrap().id, 11);
        // Substring: lowest ID wins
        assert_eq!(catalog.find_allergen_by_name("penic").unwrap().unwrap().id, 10);
        assert!(catalog.find_allergen_by_name("sulfa").unwrap().is_none());
    }

    #[test]
    fn test_find_drug_and_suggest() {
        let catalog = snapshot();

        assert_eq!(catalog.find_drug("IBUPROFEN").unwrap().unwrap().drug.id, 2);
        assert!(catalog.find_drug("Ibuprofin").unwrap().is_none());
        assert_eq!(
            catalog.suggest_drugs("Ibuprofin", 3).unwrap(),
            vec!["Ibuprofen 200mg"]
        );
    }

    #[test]
    fn test_load_from_database() {
        let db = Database::open_in_memory().unwrap();
        let drug_id = db.insert_drug(&Drug::new(0, "Aspirin 75mg")).unwrap();
        let allergen = db
            .create_allergen_if_absent("Aspirin", AllergenType::ActiveIngredient, Some("nsaids"))
            .unwrap();
        db.map_drug_to_allergen(drug_id, allergen.id).unwrap();

        let catalog = CatalogSnapshot::load(&db).unwrap();
        assert_eq!(catalog.drug_count(), 1);
        assert_eq!(catalog.allergen_count(), 1);
        assert_eq!(catalog.allergens_for_drug(drug_id).unwrap(), vec![allergen.id]);
    }
}
