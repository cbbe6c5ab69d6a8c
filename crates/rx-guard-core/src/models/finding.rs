//! Conflict findings produced while screening a single medicine.

use serde::{Deserialize, Serialize};

use super::catalog::AllergenId;
use super::patient::Severity;

/// How a conflict was detected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Patient allergen is mapped to the drug
    Direct,
    /// Patient allergen shares a cross-sensitivity group with a drug allergen
    CrossSensitivity,
    /// Advisory signal from the cross-reactivity oracle
    AiAdvisory,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Direct => "direct",
            ConflictType::CrossSensitivity => "cross_sensitivity",
            ConflictType::AiAdvisory => "ai_advisory",
        }
    }
}

/// Overall risk level, ordered `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Escalation rank (1-4).
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Critical => 4,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "moderate" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    /// Keep the higher of the two levels; ties keep `self`.
    pub fn escalate(self, candidate: RiskLevel) -> RiskLevel {
        if candidate.rank() > self.rank() {
            candidate
        } else {
            self
        }
    }

    /// Risk contributed by a recorded reaction severity.
    pub fn from_severity(severity: Severity) -> RiskLevel {
        match severity {
            Severity::Mild => RiskLevel::Low,
            Severity::Moderate | Severity::Unknown => RiskLevel::Medium,
            Severity::Severe => RiskLevel::High,
            Severity::LifeThreatening => RiskLevel::Critical,
        }
    }
}

/// Confidence attached to an advisory or resolution warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" | "moderate" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// A single allergy conflict between a patient and one prescribed medicine.
///
/// Transient: produced per prescription check and discarded once the
/// response has been assembled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictFinding {
    /// Medicine name exactly as prescribed
    pub medicine_name: String,
    /// Patient allergen involved
    pub allergen_id: AllergenId,
    /// Patient allergen name
    pub allergen_name: String,
    /// Severity taken from the patient's allergy record
    pub severity: Severity,
    /// Detection path
    pub conflict_type: ConflictType,
    /// Group that linked the allergens (cross-sensitivity only)
    pub cross_sensitivity_group: Option<String>,
    /// Human-readable explanation
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_escalation_keeps_max() {
        assert_eq!(RiskLevel::Low.escalate(RiskLevel::High), RiskLevel::High);
        assert_eq!(RiskLevel::Critical.escalate(RiskLevel::Medium), RiskLevel::Critical);
        assert_eq!(RiskLevel::Medium.escalate(RiskLevel::Medium), RiskLevel::Medium);
    }

    #[test]
    fn test_risk_ranks() {
        let ranks: Vec<u8> = [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ]
        .iter()
        .map(RiskLevel::rank)
        .collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_risk_from_severity() {
        assert_eq!(RiskLevel::from_severity(Severity::Mild), RiskLevel::Low);
        assert_eq!(RiskLevel::from_severity(Severity::Moderate), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_severity(Severity::Severe), RiskLevel::High);
        assert_eq!(
            RiskLevel::from_severity(Severity::LifeThreatening),
            RiskLevel::Critical
        );
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("extreme"), None);
        assert_eq!(Confidence::parse(" medium "), Some(Confidence::Medium));
        assert_eq!(Confidence::parse(""), None);
    }
}
