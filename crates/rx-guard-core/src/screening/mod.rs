//! Prescription screening engine.
//!
//! Per medicine: resolve → direct/cross-sensitivity match → oracle →
//! recommend → verdict (see [`pipeline`]). Oracle calls run concurrently,
//! bounded by a semaphore and each under a timeout; verdicts are folded back
//! in prescription order so output does not depend on scheduling.

pub mod classifier;
pub mod dedup;
pub mod matcher;
pub mod pipeline;

pub use classifier::{classify, Classification, VerdictEntry};
pub use dedup::{DedupKey, DedupLedger};
pub use matcher::{find_conflicts, resolve_patient_allergies, ResolvedAllergy};
pub use pipeline::{MedicineVerdict, NO_CONCERNS_RECOMMENDATION};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::models::{Patient, PatientAllergy, PrescriptionCheck, RiskLevel};
use crate::oracle::{CrossReactivityOracle, CrossReactivityRequest, OracleError, OracleOutcome};
use crate::resolver::Resolver;
use pipeline::{DirectMatched, Initialized};

/// Screens prescriptions against a catalog with an advisory oracle.
pub struct PrescriptionChecker<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    oracle: Arc<dyn CrossReactivityOracle>,
    config: EngineConfig,
}

impl<'a, C: Catalog + ?Sized> PrescriptionChecker<'a, C> {
    pub fn new(catalog: &'a C, oracle: Arc<dyn CrossReactivityOracle>, config: EngineConfig) -> Self {
        Self {
            catalog,
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Screen `medicines` for `patient`.
    ///
    /// Always returns a complete result: lookup, catalog and oracle failures
    /// degrade into warnings rather than errors. Only `Active` records in
    /// `allergies` are considered. Must run inside a Tokio runtime.
    pub async fn check_prescription<I, S>(
        &self,
        patient: &Patient,
        allergies: &[PatientAllergy],
        medicines: I,
    ) -> PrescriptionCheck
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resolver = Resolver::new(self.catalog, self.config.max_suggestions);

        let (patient_allergies, allergy_error) =
            match resolve_patient_allergies(self.catalog, allergies) {
                Ok(resolved) => (resolved, None),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };

        // Stages 1-2 (synchronous, catalog only)
        let matched: Vec<DirectMatched> = medicines
            .into_iter()
            .enumerate()
            .map(|(index, medicine)| {
                let initialized = Initialized::new(index, medicine);
                match &allergy_error {
                    Some(reason) => initialized.manual_review(reason.clone()),
                    None => initialized.match_direct(&resolver, self.catalog, &patient_allergies),
                }
            })
            .collect();

        // Oracle calls, launched together, bounded by the semaphore
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let pending: Vec<Option<JoinHandle<OracleOutcome>>> = matched
            .iter()
            .map(|m| {
                m.oracle_request(&patient_allergies).map(|request| {
                    tokio::spawn(consult_oracle(
                        Arc::clone(&self.oracle),
                        Arc::clone(&semaphore),
                        request,
                        self.config.oracle_timeout,
                    ))
                })
            })
            .collect();

        // Stages 3-5, in prescription order
        let mut verdicts = Vec::with_capacity(matched.len());
        for (m, handle) in matched.into_iter().zip(pending) {
            let outcome = match handle {
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => OracleOutcome::fallback(OracleError::Panicked(e.to_string())),
                },
                None => OracleOutcome::Skipped,
            };
            verdicts.push(m.assess(outcome).recommend().finalize());
        }

        let check = aggregate(patient, verdicts);
        tracing::info!(
            check_id = %check.check_id,
            patient_id = check.patient_id,
            medicines = check.safe_medicines.len() + count_flagged_medicines(&check),
            warnings = check.warnings.len(),
            contraindications = check.contraindications.len(),
            risk_level = check.risk_level.as_str(),
            is_safe = check.is_safe,
            "prescription checked"
        );
        check
    }
}

/// Run one oracle call on the blocking pool under a permit and a timeout.
async fn consult_oracle(
    oracle: Arc<dyn CrossReactivityOracle>,
    semaphore: Arc<Semaphore>,
    request: CrossReactivityRequest,
    limit: Duration,
) -> OracleOutcome {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return OracleOutcome::fallback(OracleError::Unavailable(e.to_string())),
    };

    let call = tokio::task::spawn_blocking(move || oracle.assess(&request));
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(result)) => OracleOutcome::from_result(result),
        Ok(Err(join_error)) => OracleOutcome::fallback(OracleError::Panicked(join_error.to_string())),
        Err(_) => OracleOutcome::fallback(OracleError::Timeout(limit)),
    }
}

/// Fold per-medicine verdicts (already in prescription order) into one check.
pub fn aggregate(patient: &Patient, verdicts: Vec<MedicineVerdict>) -> PrescriptionCheck {
    let mut ledger = DedupLedger::new();
    let mut warnings = Vec::new();
    let mut contraindications = Vec::new();
    let mut safe_medicines = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();
    let mut risk_level = RiskLevel::Low;

    for verdict in verdicts {
        risk_level = risk_level.escalate(verdict.risk_level);

        if verdict.is_safe {
            safe_medicines.push(verdict.medicine);
        }

        for entry in verdict.entries {
            if !ledger.admit(&entry) {
                tracing::debug!(
                    medicine = entry.medicine(),
                    allergen = entry.allergen().unwrap_or_default(),
                    "duplicate finding dropped"
                );
                continue;
            }
            match entry {
                VerdictEntry::Contraindication(item) => contraindications.push(item),
                VerdictEntry::Warning(item) => warnings.push(item),
            }
        }

        for recommendation in verdict.recommendations {
            if !recommendations.contains(&recommendation) {
                recommendations.push(recommendation);
            }
        }
    }

    if recommendations.is_empty() {
        recommendations.push(NO_CONCERNS_RECOMMENDATION.to_string());
    }

    PrescriptionCheck {
        check_id: uuid::Uuid::new_v4().to_string(),
        checked_at: chrono::Utc::now().to_rfc3339(),
        patient_name: patient.full_name(),
        patient_id: patient.id,
        is_safe: contraindications.is_empty(),
        warnings,
        contraindications,
        safe_medicines,
        risk_level,
        recommendations,
    }
}

fn count_flagged_medicines(check: &PrescriptionCheck) -> usize {
    let mut names: Vec<&str> = check
        .warnings
        .iter()
        .map(|w| w.medicine.as_str())
        .chain(check.contraindications.iter().map(|c| c.medicine.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();
    names.len()
}
