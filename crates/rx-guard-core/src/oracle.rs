//! Contract for the external cross-reactivity oracle.
//!
//! The oracle is advisory and untrusted. It hands back a raw payload; the
//! engine parses it leniently into an [`OracleReport`] and folds every
//! failure into [`OracleOutcome::Fallback`] with the fixed default report.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Confidence, Drug, PatientAllergy, RiskLevel, Severity};

/// Explanation used when the payload carries none.
pub const DEFAULT_EXPLANATION: &str = "Potential cross-reactivity detected";

/// Explanation of the fallback report.
pub const UNAVAILABLE_EXPLANATION: &str = "analysis unavailable";

/// Oracle failures. None of these ever reach the caller of a check.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Invalid oracle payload: {0}")]
    InvalidPayload(String),

    #[error("Oracle task failed: {0}")]
    Panicked(String),
}

/// One patient allergy as described to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergySummary {
    pub allergen: String,
    pub severity: Severity,
    pub reaction: String,
}

/// The drug under assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugDescriptor {
    pub name: String,
    pub generic_name: Option<String>,
    pub active_ingredient: Option<String>,
    pub drug_class: Option<String>,
}

impl From<&Drug> for DrugDescriptor {
    fn from(drug: &Drug) -> Self {
        Self {
            name: drug.name.clone(),
            generic_name: drug.generic_name.clone(),
            active_ingredient: drug.active_ingredient.clone(),
            drug_class: drug.drug_class.clone(),
        }
    }
}

/// Input handed to the oracle for one medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossReactivityRequest {
    pub allergies: Vec<AllergySummary>,
    pub drug: DrugDescriptor,
}

impl CrossReactivityRequest {
    /// Build a request from resolved allergies (allergen name paired with the record).
    pub fn new<'a>(
        allergies: impl IntoIterator<Item = (&'a str, &'a PatientAllergy)>,
        drug: &Drug,
    ) -> Self {
        Self {
            allergies: allergies
                .into_iter()
                .map(|(allergen, allergy)| AllergySummary {
                    allergen: allergen.to_string(),
                    severity: allergy.severity,
                    reaction: allergy.reaction().to_string(),
                })
                .collect(),
            drug: DrugDescriptor::from(drug),
        }
    }
}

/// Advisory cross-reactivity judgment.
pub trait CrossReactivityOracle: Send + Sync {
    /// Assess the drug against the allergies and return the raw (JSON) payload.
    fn assess(&self, request: &CrossReactivityRequest) -> Result<String, OracleError>;
}

/// Oracle that is never available. Every medicine falls back to the default
/// report, so results depend on catalog matches only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

impl CrossReactivityOracle for DisabledOracle {
    fn assess(&self, _request: &CrossReactivityRequest) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("no cross-reactivity oracle configured".into()))
    }
}

/// Parsed oracle judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleReport {
    pub has_cross_reactivity: bool,
    pub confidence: Confidence,
    pub explanation: String,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

impl OracleReport {
    /// The fixed safe default substituted on any failure.
    pub fn unavailable() -> Self {
        Self {
            has_cross_reactivity: false,
            confidence: Confidence::Low,
            explanation: UNAVAILABLE_EXPLANATION.to_string(),
            risk_level: RiskLevel::Low,
            recommendations: Vec::new(),
        }
    }

    /// Parse a payload, tolerating prose around the JSON object.
    ///
    /// Missing or mistyped fields default individually; a payload with no
    /// JSON object at all is an error.
    pub fn from_payload(payload: &str) -> Result<Self, OracleError> {
        let json_str = extract_json_object(payload)
            .ok_or_else(|| OracleError::InvalidPayload("no JSON object in payload".into()))?;

        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| OracleError::InvalidPayload(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| OracleError::InvalidPayload("payload is not a JSON object".into()))?;

        let has_cross_reactivity = object
            .get("has_cross_reactivity")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let confidence = object
            .get("confidence")
            .and_then(Value::as_str)
            .and_then(Confidence::parse)
            .unwrap_or(Confidence::Medium);
        let explanation = object
            .get("explanation")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_EXPLANATION)
            .to_string();
        let risk_level = object
            .get("risk_level")
            .and_then(Value::as_str)
            .and_then(RiskLevel::parse)
            .unwrap_or(RiskLevel::Medium);
        let recommendations = object
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            has_cross_reactivity,
            confidence,
            explanation,
            risk_level,
            recommendations,
        })
    }
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(payload: &str) -> Option<&str> {
    let start = payload.find('{')?;
    let end = payload.rfind('}')?;
    (end > start).then(|| &payload[start..=end])
}

/// What the oracle branch of one medicine produced.
#[derive(Debug)]
pub enum OracleOutcome {
    /// Payload parsed.
    Assessed(OracleReport),
    /// Call failed, timed out or returned garbage; `report` is the default.
    Fallback {
        report: OracleReport,
        error: OracleError,
    },
    /// Not consulted (no active allergies, or the medicine did not resolve).
    Skipped,
}

impl OracleOutcome {
    /// Turn a raw oracle result into an outcome. Never fails.
    pub fn from_result(result: Result<String, OracleError>) -> Self {
        match result.and_then(|payload| OracleReport::from_payload(&payload)) {
            Ok(report) => OracleOutcome::Assessed(report),
            Err(error) => OracleOutcome::fallback(error),
        }
    }

    pub fn fallback(error: OracleError) -> Self {
        OracleOutcome::Fallback {
            report: OracleReport::unavailable(),
            error,
        }
    }

    /// The report in effect, if the oracle was consulted.
    pub fn report(&self) -> Option<&OracleReport> {
        match self {
            OracleOutcome::Assessed(report) | OracleOutcome::Fallback { report, .. } => Some(report),
            OracleOutcome::Skipped => None,
        }
    }

    /// Whether the oracle signalled cross-reactivity.
    pub fn signals_cross_reactivity(&self) -> bool {
        self.report().is_some_and(|r| r.has_cross_reactivity)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, OracleOutcome::Fallback { .. })
    }
}
