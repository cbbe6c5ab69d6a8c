//! Per-medicine stages.
//!
//! Each stage consumes the previous one and returns a new value:
//!
//! ```text
//! Initialized → DirectMatched → CrossReactivityAssessed → Recommended → MedicineVerdict
//! ```
//!
//! Only the oracle call between `DirectMatched` and `CrossReactivityAssessed`
//! leaves the caller's thread; every other transition is a pure function of
//! its input and the read-only catalog.

use super::classifier::{classify, Classification, VerdictEntry};
use super::matcher::{drug_allergens, find_conflicts, ResolvedAllergy};
use crate::catalog::Catalog;
use crate::models::{Confidence, ConflictFinding, ConflictType, Drug, RiskLevel, WarningItem};
use crate::oracle::{CrossReactivityRequest, OracleError, OracleOutcome};
use crate::resolver::{clean_medicine_name, Resolution, Resolver};

/// Recommendation used when nothing else applies.
pub const NO_CONCERNS_RECOMMENDATION: &str =
    "No specific allergy concerns identified. Monitor patient for any adverse reactions.";

/// Stage 1: the prescribed name and its position in the prescription.
#[derive(Debug, Clone, PartialEq)]
pub struct Initialized {
    pub index: usize,
    /// Name exactly as prescribed
    pub prescribed: String,
    /// Name used for lookups
    pub cleaned: String,
}

impl Initialized {
    pub fn new(index: usize, prescribed: impl Into<String>) -> Self {
        let prescribed = prescribed.into();
        let cleaned = clean_medicine_name(&prescribed);
        Self {
            index,
            prescribed,
            cleaned,
        }
    }

    /// Resolve the drug and run direct/cross-sensitivity matching.
    ///
    /// Catalog errors do not escape: the medicine goes to manual review.
    pub fn match_direct<C: Catalog + ?Sized>(
        self,
        resolver: &Resolver<'_, C>,
        catalog: &C,
        allergies: &[ResolvedAllergy],
    ) -> DirectMatched {
        let resolution = match resolver.resolve(&self.cleaned) {
            Ok(resolution) => resolution,
            Err(e) => return self.manual_review(e.to_string()),
        };

        let state = match resolution {
            Resolution::NotFound { suggestions } => MatchState::NotFound { suggestions },
            Resolution::Found { drug, .. } => match drug_allergens(catalog, drug.id) {
                Ok(allergens) => {
                    let findings = find_conflicts(&self.prescribed, allergies, &allergens);
                    MatchState::Resolved { drug, findings }
                }
                Err(e) => return self.manual_review(e.to_string()),
            },
        };

        tracing::debug!(
            medicine = %self.prescribed,
            state = state.label(),
            "direct match complete"
        );
        DirectMatched {
            initialized: self,
            state,
        }
    }

    /// Skip matching; the medicine needs a human.
    pub fn manual_review(self, reason: String) -> DirectMatched {
        tracing::warn!(medicine = %self.prescribed, error = %reason, "screening incomplete; manual review required");
        DirectMatched {
            initialized: self,
            state: MatchState::ManualReview { reason },
        }
    }
}

/// What direct matching established for one medicine.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchState {
    /// Name did not resolve
    NotFound { suggestions: Vec<String> },
    /// Evaluation failed; `reason` is shown to the prescriber
    ManualReview { reason: String },
    /// Drug resolved; `findings` may be empty
    Resolved {
        drug: Drug,
        findings: Vec<ConflictFinding>,
    },
}

impl MatchState {
    fn label(&self) -> &'static str {
        match self {
            MatchState::NotFound { .. } => "not_found",
            MatchState::ManualReview { .. } => "manual_review",
            MatchState::Resolved { findings, .. } if findings.is_empty() => "no_conflict",
            MatchState::Resolved { .. } => "conflict",
        }
    }
}

/// Stage 2: direct and cross-sensitivity matching done.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectMatched {
    pub initialized: Initialized,
    pub state: MatchState,
}

impl DirectMatched {
    /// Oracle input, if the oracle should be consulted for this medicine.
    ///
    /// `None` when the drug did not resolve or the patient has no active
    /// allergies.
    pub fn oracle_request(&self, allergies: &[ResolvedAllergy]) -> Option<CrossReactivityRequest> {
        match &self.state {
            MatchState::Resolved { drug, .. } if !allergies.is_empty() => Some(CrossReactivityRequest::new(
                allergies
                    .iter()
                    .map(|r| (r.allergen.name.as_str(), &r.allergy)),
                drug,
            )),
            _ => None,
        }
    }

    /// Attach the oracle outcome.
    pub fn assess(self, oracle: OracleOutcome) -> CrossReactivityAssessed {
        if let OracleOutcome::Fallback { error, .. } = &oracle {
            match error {
                OracleError::Unavailable(_) => tracing::debug!(
                    medicine = %self.initialized.prescribed,
                    error = %error,
                    "oracle unavailable; using default report"
                ),
                _ => tracing::warn!(
                    medicine = %self.initialized.prescribed,
                    error = %error,
                    "oracle failed; using default report"
                ),
            }
        }
        CrossReactivityAssessed {
            matched: self,
            oracle,
        }
    }
}

/// Stage 3: advisory oracle signal attached.
#[derive(Debug)]
pub struct CrossReactivityAssessed {
    pub matched: DirectMatched,
    pub oracle: OracleOutcome,
}

impl CrossReactivityAssessed {
    /// Derive prescriber recommendations for this medicine.
    pub fn recommend(self) -> Recommended {
        let mut recommendations = Vec::new();

        if let MatchState::Resolved { findings, .. } = &self.matched.state {
            for finding in findings {
                recommendations.push(match classify(finding.severity) {
                    Classification::Contraindication => format!(
                        "CONTRAINDICATION: Avoid {} due to {} allergy to {}",
                        finding.medicine_name, finding.severity, finding.allergen_name
                    ),
                    Classification::Warning => format!(
                        "CAUTION: Monitor patient for allergic reactions to {}",
                        finding.allergen_name
                    ),
                });
            }
        }

        if let Some(report) = self.oracle.report().filter(|r| r.has_cross_reactivity) {
            recommendations.extend(report.recommendations.iter().cloned());
        }

        Recommended {
            assessed: self,
            recommendations,
        }
    }
}

/// Stage 4: recommendations derived.
#[derive(Debug)]
pub struct Recommended {
    pub assessed: CrossReactivityAssessed,
    pub recommendations: Vec<String>,
}

impl Recommended {
    /// Classify and produce the final per-medicine verdict.
    pub fn finalize(self) -> MedicineVerdict {
        let Recommended {
            assessed,
            recommendations,
        } = self;
        let CrossReactivityAssessed { matched, oracle } = assessed;
        let Initialized {
            index, prescribed, ..
        } = matched.initialized;

        let signal = oracle.report().filter(|r| r.has_cross_reactivity);
        let mut risk_level = RiskLevel::Low;
        let mut entries = Vec::new();

        match matched.state {
            MatchState::NotFound { suggestions } => {
                entries.push(VerdictEntry::Warning(not_found_warning(&prescribed, &suggestions)));
            }
            MatchState::ManualReview { reason } => {
                risk_level = risk_level.escalate(RiskLevel::Medium);
                entries.push(VerdictEntry::Warning(manual_review_warning(&prescribed, &reason)));
            }
            MatchState::Resolved { findings, .. } if !findings.is_empty() => {
                for finding in &findings {
                    risk_level = risk_level.escalate(RiskLevel::from_severity(finding.severity));
                    entries.push(VerdictEntry::from_finding(finding));
                }
                // Advisory warning is suppressed, its risk still counts
                if let Some(report) = signal {
                    risk_level = risk_level.escalate(report.risk_level);
                }
            }
            MatchState::Resolved { .. } => {
                if let Some(report) = signal {
                    risk_level = risk_level.escalate(report.risk_level);
                    entries.push(VerdictEntry::Warning(WarningItem {
                        medicine: prescribed.clone(),
                        allergen: None,
                        severity: None,
                        reason: report.explanation.clone(),
                        confidence: Some(report.confidence),
                        conflict_type: Some(ConflictType::AiAdvisory),
                    }));
                }
            }
        }

        MedicineVerdict {
            index,
            is_safe: entries.is_empty(),
            medicine: prescribed,
            entries,
            risk_level,
            recommendations,
            oracle_fallback: oracle.is_fallback(),
        }
    }
}

/// Stage 5: everything the aggregate needs from one medicine.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicineVerdict {
    /// Position in the prescription
    pub index: usize,
    /// Name exactly as prescribed
    pub medicine: String,
    /// Classified entries, before prescription-wide deduplication
    pub entries: Vec<VerdictEntry>,
    /// No conflict signal at all
    pub is_safe: bool,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    /// Oracle was consulted and fell back to the default report
    pub oracle_fallback: bool,
}

fn not_found_warning(medicine: &str, suggestions: &[String]) -> WarningItem {
    let suggestion_text = if suggestions.is_empty() {
        String::new()
    } else {
        format!(" Did you mean: {}?", suggestions.join(", "))
    };

    WarningItem {
        medicine: medicine.to_string(),
        allergen: None,
        severity: None,
        reason: format!(
            "Medicine '{medicine}' not found in drug database. Please verify the spelling or check if it's available under a different name.{suggestion_text}"
        ),
        confidence: Some(Confidence::High),
        conflict_type: None,
    }
}

fn manual_review_warning(medicine: &str, reason: &str) -> WarningItem {
    WarningItem {
        medicine: medicine.to_string(),
        allergen: None,
        severity: None,
        reason: format!(
            "Unable to complete allergy screening for '{medicine}': manual review required ({reason})"
        ),
        confidence: Some(Confidence::Low),
        conflict_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::models::{Allergen, AllergenType, PatientAllergy, Severity};
    use crate::oracle::OracleReport;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_drug(Drug::new(1, "Amoxicillin 500mg").with_generic("Amoxicillin", "Amoxicillin"))
            .with_drug(Drug::new(2, "Cefalexin 250mg").with_generic("Cephalexin", "Cephalexin"))
            .with_allergen(
                Allergen::new(10, "Penicillin", AllergenType::ActiveIngredient).with_group("beta_lactams"),
            )
            .with_mapping(1, 10)
    }

    fn penicillin_allergy(severity: Severity) -> Vec<ResolvedAllergy> {
        vec![ResolvedAllergy {
            allergy: PatientAllergy::new(1, 10, severity).with_reaction("Anaphylaxis"),
            allergen: Allergen::new(10, "Penicillin", AllergenType::ActiveIngredient)
                .with_group("beta_lactams"),
        }]
    }

    fn advisory(risk_level: RiskLevel) -> OracleOutcome {
        OracleOutcome::Assessed(OracleReport {
            has_cross_reactivity: true,
            confidence: Confidence::Medium,
            explanation: "Cephalosporins may cross-react with penicillins".into(),
            risk_level,
            recommendations: vec!["Consider a non-beta-lactam alternative".into()],
        })
    }

    fn run(name: &str, allergies: &[ResolvedAllergy], oracle: OracleOutcome) -> MedicineVerdict {
        let catalog = catalog();
        let resolver = Resolver::new(&catalog, 3);
        Initialized::new(0, name)
            .match_direct(&resolver, &catalog, allergies)
            .assess(oracle)
            .recommend()
            .finalize()
    }

    #[test]
    fn test_initialized_cleans_name() {
        let init = Initialized::new(2, " \"Amoxicillin 500mg\" ");
        assert_eq!(init.cleaned, "Amoxicillin 500mg");
        assert_eq!(init.prescribed, " \"Amoxicillin 500mg\" ");
    }

    #[test]
    fn test_direct_conflict_verdict() {
        let verdict = run("Amoxicillin 500mg", &penicillin_allergy(Severity::Severe), OracleOutcome::Skipped);

        assert!(!verdict.is_safe);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert!(verdict.entries.iter().all(VerdictEntry::is_contraindication));
        assert_eq!(
            verdict.recommendations[0],
            "CONTRAINDICATION: Avoid Amoxicillin 500mg due to severe allergy to Penicillin"
        );
    }

    #[test]
    fn test_direct_conflict_suppresses_advisory_but_keeps_risk() {
        let verdict = run(
            "Amoxicillin 500mg",
            &penicillin_allergy(Severity::Mild),
            advisory(RiskLevel::Critical),
        );

        assert!(verdict
            .entries
            .iter()
            .all(|e| matches!(e, VerdictEntry::Warning(w) if w.conflict_type != Some(ConflictType::AiAdvisory))));
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert!(verdict
            .recommendations
            .contains(&"Consider a non-beta-lactam alternative".to_string()));
    }

    #[test]
    fn test_advisory_warning_without_direct_conflict() {
        let verdict = run("Cefalexin 250mg", &penicillin_allergy(Severity::Severe), advisory(RiskLevel::High));

        assert_eq!(verdict.entries.len(), 1);
        match &verdict.entries[0] {
            VerdictEntry::Warning(w) => {
                assert_eq!(w.conflict_type, Some(ConflictType::AiAdvisory));
                assert_eq!(w.confidence, Some(Confidence::Medium));
                assert_eq!(w.allergen, None);
            }
            other => panic!("expected advisory warning, got {:?}", other),
        }
        assert_eq!(verdict.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_fallback_resolves_to_safe() {
        let verdict = run(
            "Cefalexin 250mg",
            &penicillin_allergy(Severity::Severe),
            OracleOutcome::fallback(OracleError::Timeout(std::time::Duration::from_secs(30))),
        );

        assert!(verdict.is_safe);
        assert!(verdict.oracle_fallback);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn test_not_found_verdict() {
        let verdict = run("Amoxycilin", &[], OracleOutcome::Skipped);

        assert!(!verdict.is_safe);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        match &verdict.entries[0] {
            VerdictEntry::Warning(w) => {
                assert!(w.reason.contains("not found"));
                assert!(w.reason.ends_with("Did you mean: Amoxicillin 500mg?"));
                assert_eq!(w.confidence, Some(Confidence::High));
            }
            other => panic!("expected warning, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_review_verdict() {
        let verdict = Initialized::new(0, "Amoxicillin 500mg")
            .manual_review("database is locked".into())
            .assess(OracleOutcome::Skipped)
            .recommend()
            .finalize();

        assert!(!verdict.is_safe);
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        match &verdict.entries[0] {
            VerdictEntry::Warning(w) => assert!(w.reason.contains("manual review required")),
            other => panic!("expected warning, got {:?}", other),
        }
    }

    #[test]
    fn test_oracle_request_only_when_useful() {
        let catalog = catalog();
        let resolver = Resolver::new(&catalog, 3);
        let allergies = penicillin_allergy(Severity::Severe);

        let resolved = Initialized::new(0, "Amoxicillin 500mg").match_direct(&resolver, &catalog, &allergies);
        assert!(resolved.oracle_request(&allergies).is_some());
        assert!(resolved.oracle_request(&[]).is_none());

        let missing = Initialized::new(1, "Xyzmedicine123").match_direct(&resolver, &catalog, &allergies);
        assert!(missing.oracle_request(&allergies).is_none());
    }
}
