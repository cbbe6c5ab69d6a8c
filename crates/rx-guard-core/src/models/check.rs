//! Prescription check output.

use serde::{Deserialize, Serialize};

use super::finding::{Confidence, ConflictType, RiskLevel};
use super::patient::{PatientId, Severity};

/// A caution-level entry: low-severity conflict, advisory signal, or
/// resolution problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarningItem {
    /// Medicine as prescribed
    pub medicine: String,
    /// Allergen involved (absent for resolution and advisory warnings)
    pub allergen: Option<String>,
    /// Recorded severity (absent for resolution and advisory warnings)
    pub severity: Option<Severity>,
    /// Explanation shown to the prescriber
    pub reason: String,
    /// Confidence of the signal, when one applies
    pub confidence: Option<Confidence>,
    /// Detection path; absent for not-found and manual-review warnings
    pub conflict_type: Option<ConflictType>,
}

/// A conflict severe enough to recommend against the drug.
///
/// Always fully populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContraindicationItem {
    pub medicine: String,
    pub allergen: String,
    pub severity: Severity,
    pub reason: String,
    pub conflict_type: ConflictType,
}

/// Result of screening a whole prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionCheck {
    /// Unique check ID
    pub check_id: String,
    /// When the check ran
    pub checked_at: String,
    /// Patient display name
    pub patient_name: String,
    /// Patient identifier
    pub patient_id: PatientId,
    /// `true` iff there are no contraindications
    pub is_safe: bool,
    /// Warnings in prescription order
    pub warnings: Vec<WarningItem>,
    /// Contraindications in prescription order
    pub contraindications: Vec<ContraindicationItem>,
    /// Medicines with no conflict signal, in prescription order
    pub safe_medicines: Vec<String>,
    /// Maximum risk across all entries
    pub risk_level: RiskLevel,
    /// Ordered, de-duplicated prescriber recommendations
    pub recommendations: Vec<String>,
}

impl PrescriptionCheck {
    /// Serialize to canonical JSON for audit hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Total number of flagged entries.
    pub fn flagged_count(&self) -> usize {
        self.warnings.len() + self.contraindications.len()
    }

    /// Contraindications for one medicine.
    pub fn contraindications_for<'a>(
        &'a self,
        medicine: &'a str,
    ) -> impl Iterator<Item = &'a ContraindicationItem> + 'a {
        self.contraindications
            .iter()
            .filter(move |c| c.medicine == medicine)
    }

    /// Warnings for one medicine.
    pub fn warnings_for<'a>(&'a self, medicine: &'a str) -> impl Iterator<Item = &'a WarningItem> + 'a {
        self.warnings.iter().filter(move |w| w.medicine == medicine)
    }
}
