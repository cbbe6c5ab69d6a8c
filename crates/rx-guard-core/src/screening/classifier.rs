//! Bucketing of findings into contraindications and warnings.

use crate::models::{ConflictFinding, ContraindicationItem, Severity, WarningItem};

/// Bucket a finding lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Contraindication,
    Warning,
}

/// Severe and life-threatening → contraindication; everything else → warning.
pub fn classify(severity: Severity) -> Classification {
    if severity.is_contraindicating() {
        Classification::Contraindication
    } else {
        Classification::Warning
    }
}

/// A classified entry of the prescription result.
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictEntry {
    Contraindication(ContraindicationItem),
    Warning(WarningItem),
}

impl VerdictEntry {
    /// Classify a matcher finding into its bucket.
    pub fn from_finding(finding: &ConflictFinding) -> Self {
        match classify(finding.severity) {
            Classification::Contraindication => VerdictEntry::Contraindication(ContraindicationItem {
                medicine: finding.medicine_name.clone(),
                allergen: finding.allergen_name.clone(),
                severity: finding.severity,
                reason: finding.reason.clone(),
                conflict_type: finding.conflict_type,
            }),
            Classification::Warning => VerdictEntry::Warning(WarningItem {
                medicine: finding.medicine_name.clone(),
                allergen: Some(finding.allergen_name.clone()),
                severity: Some(finding.severity),
                reason: finding.reason.clone(),
                confidence: None,
                conflict_type: Some(finding.conflict_type),
            }),
        }
    }

    pub fn medicine(&self) -> &str {
        match self {
            VerdictEntry::Contraindication(item) => &item.medicine,
            VerdictEntry::Warning(item) => &item.medicine,
        }
    }

    pub fn allergen(&self) -> Option<&str> {
        match self {
            VerdictEntry::Contraindication(item) => Some(&item.allergen),
            VerdictEntry::Warning(item) => item.allergen.as_deref(),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            VerdictEntry::Contraindication(item) => Some(item.severity),
            VerdictEntry::Warning(item) => item.severity,
        }
    }

    pub fn is_contraindication(&self) -> bool {
        matches!(self, VerdictEntry::Contraindication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, RiskLevel};

    fn finding(severity: Severity) -> ConflictFinding {
        ConflictFinding {
            medicine_name: "Amoxicillin 500mg".into(),
            allergen_id: 1,
            allergen_name: "Penicillin".into(),
            severity,
            conflict_type: ConflictType::Direct,
            cross_sensitivity_group: None,
            reason: "Direct allergy match: Hives".into(),
        }
    }

    #[test]
    fn test_classify_threshold() {
        assert_eq!(classify(Severity::LifeThreatening), Classification::Contraindication);
        assert_eq!(classify(Severity::Severe), Classification::Contraindication);
        assert_eq!(classify(Severity::Moderate), Classification::Warning);
        assert_eq!(classify(Severity::Mild), Classification::Warning);
        assert_eq!(classify(Severity::Unknown), Classification::Warning);
    }

    #[test]
    fn test_entry_from_finding() {
        let entry = VerdictEntry::from_finding(&finding(Severity::Severe));
        assert!(entry.is_contraindication());
        assert_eq!(entry.allergen(), Some("Penicillin"));

        let entry = VerdictEntry::from_finding(&finding(Severity::Mild));
        match entry {
            VerdictEntry::Warning(item) => {
                assert_eq!(item.severity, Some(Severity::Mild));
                assert_eq!(item.conflict_type, Some(ConflictType::Direct));
            }
            other => panic!("expected warning, got {:?}", other),
        }
    }

    #[test]
    fn test_risk_contribution_follows_severity() {
        assert_eq!(RiskLevel::from_severity(Severity::Unknown), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_severity(Severity::LifeThreatening), RiskLevel::Critical);
    }
}
