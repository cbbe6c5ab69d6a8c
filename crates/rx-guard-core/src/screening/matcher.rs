//! Direct and cross-sensitivity matching of patient allergies against a drug.

use std::collections::{BTreeSet, HashSet};

use crate::catalog::{Catalog, CatalogResult};
use crate::models::{Allergen, AllergenId, ConflictFinding, ConflictType, DrugId, PatientAllergy};

/// An active patient allergy joined with its catalog allergen.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAllergy {
    pub allergy: PatientAllergy,
    pub allergen: Allergen,
}

/// Join active allergy records with their allergens, in record order.
///
/// Inactive records are dropped. Records pointing at a missing allergen are
/// skipped with a warning.
pub fn resolve_patient_allergies<C: Catalog + ?Sized>(
    catalog: &C,
    allergies: &[PatientAllergy],
) -> CatalogResult<Vec<ResolvedAllergy>> {
    let mut resolved = Vec::with_capacity(allergies.len());
    for allergy in allergies.iter().filter(|a| a.is_active()) {
        match catalog.allergen(allergy.allergen_id)? {
            Some(allergen) => resolved.push(ResolvedAllergy {
                allergy: allergy.clone(),
                allergen,
            }),
            None => tracing::warn!(
                allergy_id = allergy.id,
                allergen_id = allergy.allergen_id,
                "patient allergy references a missing allergen; skipped"
            ),
        }
    }
    Ok(resolved)
}

/// Allergens mapped to a drug; dangling IDs are skipped with a warning.
pub fn drug_allergens<C: Catalog + ?Sized>(
    catalog: &C,
    drug_id: DrugId,
) -> CatalogResult<Vec<Allergen>> {
    let mut allergens = Vec::new();
    for allergen_id in catalog.allergens_for_drug(drug_id)? {
        match catalog.allergen(allergen_id)? {
            Some(allergen) => allergens.push(allergen),
            None => tracing::warn!(
                drug_id,
                allergen_id,
                "drug mapping references a missing allergen; skipped"
            ),
        }
    }
    Ok(allergens)
}

/// Find every conflict between the patient's allergies and a drug's allergens.
///
/// Direct findings come first (record order), then cross-sensitivity
/// findings (record order). Severity always comes from the patient's record.
/// A direct match may resurface as a cross-sensitivity finding; callers
/// deduplicate.
pub fn find_conflicts(
    medicine: &str,
    patient: &[ResolvedAllergy],
    drug_allergens: &[Allergen],
) -> Vec<ConflictFinding> {
    let drug_ids: HashSet<AllergenId> = drug_allergens.iter().map(|a| a.id).collect();

    let mut findings: Vec<ConflictFinding> = patient
        .iter()
        .filter(|p| drug_ids.contains(&p.allergy.allergen_id))
        .map(|p| direct_finding(medicine, p))
        .collect();

    let patient_groups: BTreeSet<&str> = patient.iter().filter_map(|p| p.allergen.group()).collect();
    let drug_groups: BTreeSet<&str> = drug_allergens.iter().filter_map(Allergen::group).collect();
    let shared: BTreeSet<&str> = patient_groups.intersection(&drug_groups).copied().collect();

    if !shared.is_empty() {
        findings.extend(patient.iter().filter_map(|p| {
            let group = p.allergen.group()?;
            shared
                .contains(group)
                .then(|| cross_sensitivity_finding(medicine, p, group))
        }));
    }

    findings
}

fn direct_finding(medicine: &str, patient: &ResolvedAllergy) -> ConflictFinding {
    let severity = patient.allergy.severity;
    let reaction = patient.allergy.reaction();
    let reason = if severity.is_contraindicating() {
        format!("Direct allergy match: {reaction}")
    } else {
        format!("Known allergy: {reaction}")
    };

    ConflictFinding {
        medicine_name: medicine.to_string(),
        allergen_id: patient.allergen.id,
        allergen_name: patient.allergen.name.clone(),
        severity,
        conflict_type: ConflictType::Direct,
        cross_sensitivity_group: patient.allergen.group().map(String::from),
        reason,
    }
}

fn cross_sensitivity_finding(medicine: &str, patient: &ResolvedAllergy, group: &str) -> ConflictFinding {
    ConflictFinding {
        medicine_name: medicine.to_string(),
        allergen_id: patient.allergen.id,
        allergen_name: patient.allergen.name.clone(),
        severity: patient.allergy.severity,
        conflict_type: ConflictType::CrossSensitivity,
        cross_sensitivity_group: Some(group.to_string()),
        reason: format!(
            "Cross-sensitivity ({group}) with {}: {}",
            patient.allergen.name,
            patient.allergy.reaction()
        ),
    }
}
