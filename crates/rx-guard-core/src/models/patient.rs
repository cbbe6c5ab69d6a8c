//! Patient and allergy-history models.

use serde::{Deserialize, Serialize};

use super::catalog::AllergenId;

/// Identifier of a patient row.
pub type PatientId = i64;

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Row identifier (0 until inserted)
    pub id: PatientId,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

impl Patient {
    /// Create a new, not yet persisted patient.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// "First Last".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Recorded severity of an allergic reaction.
///
/// Ordered: `Mild < Moderate < Severe < LifeThreatening`. `Unknown` covers
/// unrecognised stored values and sorts lowest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Unknown,
    Mild,
    Moderate,
    Severe,
    LifeThreatening,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::LifeThreatening => "life_threatening",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "mild" => Severity::Mild,
            "moderate" => Severity::Moderate,
            "severe" => Severity::Severe,
            "life_threatening" => Severity::LifeThreatening,
            _ => Severity::Unknown,
        }
    }

    /// Severe and life-threatening reactions contraindicate the drug.
    pub fn is_contraindicating(&self) -> bool {
        matches!(self, Severity::Severe | Severity::LifeThreatening)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a recorded allergy. Only `Active` records are screened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllergyStatus {
    Active,
    Inactive,
    Resolved,
}

impl AllergyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllergyStatus::Active => "active",
            AllergyStatus::Inactive => "inactive",
            AllergyStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(AllergyStatus::Active),
            "inactive" => Some(AllergyStatus::Inactive),
            "resolved" => Some(AllergyStatus::Resolved),
            _ => None,
        }
    }
}

/// A clinician-recorded allergy. Read-only input to screening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientAllergy {
    /// Row identifier
    pub id: i64,
    /// Owning patient
    pub patient_id: PatientId,
    /// Allergen the patient reacts to
    pub allergen_id: AllergenId,
    /// Recorded severity
    pub severity: Severity,
    /// Free-text reaction description
    pub reaction_description: Option<String>,
    /// Record status
    pub status: AllergyStatus,
}

impl PatientAllergy {
    /// Create an active allergy record.
    pub fn new(patient_id: PatientId, allergen_id: AllergenId, severity: Severity) -> Self {
        Self {
            id: 0,
            patient_id,
            allergen_id,
            severity,
            reaction_description: None,
            status: AllergyStatus::Active,
        }
    }

    /// Builder-style reaction text.
    pub fn with_reaction(mut self, reaction: &str) -> Self {
        self.reaction_description = Some(reaction.to_string());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AllergyStatus::Active
    }

    /// Reaction text or a placeholder.
    pub fn reaction(&self) -> &str {
        self.reaction_description
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("reaction not specified")
    }
}
