//! Rx-Guard Core Library
//!
//! Prescription allergy-conflict screening.
//!
//! # Architecture
//!
//! ```text
//! Prescription (patient + medicine names)
//!              │
//!              ▼
//!   Resolver (catalog lookup, brand aliases, suggestions)
//!              │
//!              ▼
//!   Matcher (direct + cross-sensitivity findings)
//!              │
//!              ▼
//!   Oracle (advisory, bounded, timed out, best effort)
//!              │
//!              ▼
//!   Classifier → Dedup → Aggregate verdict
//!              │
//!              ▼
//!   Audit log (payload + SHA-256)      Allergy pattern report
//! ```
//!
//! # Core Principle
//!
//! **A check always completes.** Lookup, catalog and oracle failures become
//! warnings; they never abort the prescription.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence and the audit log
//! - [`models`]: Domain types (Drug, Allergen, Patient, PrescriptionCheck, etc.)
//! - [`catalog`]: Catalog trait and in-memory snapshot
//! - [`resolver`]: Medicine-name resolution (normalizer + disambiguator)
//! - [`oracle`]: Cross-reactivity oracle contract
//! - [`screening`]: The staged screening pipeline and aggregation
//! - [`config`] / [`telemetry`]: Environment configuration and tracing
//! - [`export`]: Allergy pattern report

pub mod catalog;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod oracle;
pub mod resolver;
pub mod screening;
pub mod telemetry;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogSnapshot};
pub use config::EngineConfig;
pub use db::Database;
pub use models::{
    Allergen, AllergenType, AllergyStatus, Drug, Patient, PatientAllergy, PrescriptionCheck,
    RiskLevel, Severity,
};
pub use oracle::{CrossReactivityOracle, DisabledOracle};
pub use screening::PrescriptionChecker;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use config::TelemetryConfig;
use db::PrescriptionCheckRecord;
use models::{ContraindicationItem, WarningItem};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RxGuardError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<db::DbError> for RxGuardError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => RxGuardError::NotFound(what),
            db::DbError::Constraint(what) => RxGuardError::InvalidInput(what),
            other => RxGuardError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RxGuardError {
    fn from(e: serde_json::Error) -> Self {
        RxGuardError::SerializationError(e.to_string())
    }
}

impl From<telemetry::TelemetryError> for RxGuardError {
    fn from(e: telemetry::TelemetryError) -> Self {
        RxGuardError::InvalidInput(e.to_string())
    }
}

impl From<std::io::Error> for RxGuardError {
    fn from(e: std::io::Error) -> Self {
        RxGuardError::RuntimeError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RxGuardError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        RxGuardError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<RxGuardCore>, RxGuardError> {
    RxGuardCore::new(Database::open(&path)?)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<RxGuardCore>, RxGuardError> {
    RxGuardCore::new(Database::open_in_memory()?)
}

/// Install the tracing subscriber. `RUST_LOG` overrides `level`.
///
/// Calling it again once a subscriber is installed is a no-op.
#[uniffi::export]
pub fn init_logging(level: String) -> Result<(), RxGuardError> {
    match telemetry::init(&TelemetryConfig { log_level: level }) {
        Err(telemetry::TelemetryError::Subscriber(e)) => {
            tracing::debug!(error = %e, "tracing subscriber already installed");
            Ok(())
        }
        other => Ok(other?),
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct RxGuardCore {
    db: Arc<Mutex<Database>>,
    config: EngineConfig,
    runtime: tokio::runtime::Runtime,
}

impl RxGuardCore {
    fn new(db: Database) -> Result<Arc<Self>, RxGuardError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()?;
        let config = EngineConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid engine configuration, using defaults");
            EngineConfig::default()
        });
        Ok(Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            runtime,
        }))
    }
}

#[uniffi::export]
impl RxGuardCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add a drug and return its ID.
    pub fn add_drug(&self, drug: FfiDrug) -> Result<i64, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.insert_drug(&drug.into())?)
    }

    /// Update a drug in place. `false` if it does not exist.
    pub fn update_drug(&self, drug: FfiDrug) -> Result<bool, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.update_drug(&drug.into())?)
    }

    /// Get a drug by ID.
    pub fn get_drug(&self, drug_id: i64) -> Result<Option<FfiDrug>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.get_drug(drug_id)?.map(Into::into))
    }

    /// Search drugs by name, generic name or active ingredient.
    pub fn search_drugs(&self, query: String) -> Result<Vec<FfiDrug>, RxGuardError> {
        let db = self.db.lock()?;
        let drugs = db.search_drugs(&query, crate::db::DRUG_SEARCH_LIMIT)?;
        Ok(drugs.into_iter().map(Into::into).collect())
    }

    /// Delete a drug and its allergen mappings.
    pub fn delete_drug(&self, drug_id: i64) -> Result<bool, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.delete_drug(drug_id)?)
    }

    /// Return the allergen with this name, creating it if needed.
    pub fn create_allergen(
        &self,
        name: String,
        allergen_type: String,
        cross_sensitivity_group: Option<String>,
    ) -> Result<FfiAllergen, RxGuardError> {
        let db = self.db.lock()?;
        let allergen = db.create_allergen_if_absent(
            &name,
            AllergenType::parse(&allergen_type),
            cross_sensitivity_group.as_deref(),
        )?;
        Ok(allergen.into())
    }

    /// Find an allergen by name.
    pub fn find_allergen(&self, name: String) -> Result<Option<FfiAllergen>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.find_allergen_by_name(&name)?.map(Into::into))
    }

    /// List all allergens.
    pub fn list_allergens(&self) -> Result<Vec<FfiAllergen>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.list_allergens()?.into_iter().map(Into::into).collect())
    }

    /// Link a drug to an allergen it contains. `false` if already linked.
    pub fn map_drug_to_allergen(&self, drug_id: i64, allergen_id: i64) -> Result<bool, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.map_drug_to_allergen(drug_id, allergen_id)?)
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create a new patient.
    pub fn create_patient(
        &self,
        first_name: String,
        last_name: String,
        date_of_birth: Option<String>,
    ) -> Result<FfiPatient, RxGuardError> {
        let db = self.db.lock()?;
        let mut patient = Patient::new(first_name, last_name);
        patient.date_of_birth = date_of_birth;
        patient.id = db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: i64) -> Result<Option<FfiPatient>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(patient_id)?.map(Into::into))
    }

    /// Find a patient by (partial) name.
    pub fn find_patient(&self, name: String) -> Result<Option<FfiPatient>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.find_patient_by_name(&name)?.map(Into::into))
    }

    /// List all patients.
    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.list_patients()?.into_iter().map(Into::into).collect())
    }

    /// Record an allergy and return its ID.
    pub fn add_patient_allergy(
        &self,
        patient_id: i64,
        allergen_id: i64,
        severity: String,
        reaction_description: Option<String>,
    ) -> Result<i64, RxGuardError> {
        let db = self.db.lock()?;
        let mut allergy = PatientAllergy::new(patient_id, allergen_id, Severity::parse(&severity));
        allergy.reaction_description = reaction_description;
        Ok(db.add_patient_allergy(&allergy)?)
    }

    /// Set an allergy's status (`active`, `inactive`, `resolved`).
    pub fn set_allergy_status(&self, allergy_id: i64, status: String) -> Result<bool, RxGuardError> {
        let status = AllergyStatus::parse(&status)
            .ok_or_else(|| RxGuardError::InvalidInput(format!("unknown allergy status '{status}'")))?;
        let db = self.db.lock()?;
        Ok(db.set_allergy_status(allergy_id, status)?)
    }

    /// All allergy records of a patient.
    pub fn list_patient_allergies(
        &self,
        patient_id: i64,
    ) -> Result<Vec<FfiPatientAllergy>, RxGuardError> {
        let db = self.db.lock()?;
        let allergies = db.list_patient_allergies(patient_id)?;
        Ok(allergies.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Screening Operations
    // =========================================================================

    /// Screen a prescription and record the result in the audit log.
    ///
    /// No oracle is attached here, so the verdict rests on catalog matches.
    pub fn check_prescription(
        &self,
        patient_id: i64,
        medicines: Vec<String>,
    ) -> Result<FfiPrescriptionCheck, RxGuardError> {
        let db = self.db.lock()?;
        let patient = db
            .get_patient(patient_id)?
            .ok_or_else(|| RxGuardError::NotFound(format!("patient {patient_id}")))?;
        let allergies = db.list_active_allergies(patient_id)?;

        let checker = PrescriptionChecker::new(&*db, Arc::new(DisabledOracle), self.config.clone());
        let check = self.runtime.block_on(checker.check_prescription(
            &patient,
            &allergies,
            medicines.iter().cloned(),
        ));

        if let Err(e) = db.record_prescription_check(&check, &medicines) {
            tracing::warn!(check_id = %check.check_id, error = %e, "failed to record prescription check");
        }

        Ok(check.into())
    }

    /// Audit history of a patient, newest first.
    pub fn prescription_history(
        &self,
        patient_id: i64,
    ) -> Result<Vec<FfiCheckRecord>, RxGuardError> {
        let db = self.db.lock()?;
        let records = db.list_prescription_checks(patient_id)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Whether a stored check still matches its recorded hash.
    pub fn verify_prescription_check(&self, check_id: String) -> Result<bool, RxGuardError> {
        let db = self.db.lock()?;
        Ok(db.verify_prescription_check(&check_id)?)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Allergy pattern report as JSON.
    pub fn allergy_patterns_json(&self) -> Result<String, RxGuardError> {
        let db = self.db.lock()?;
        let report = export::AllergyPatternReport::generate(&db)?;
        Ok(report.to_json()?)
    }

    /// Allergy pattern report as CSV.
    pub fn allergy_patterns_csv(&self) -> Result<String, RxGuardError> {
        let db = self.db.lock()?;
        Ok(export::AllergyPatternReport::generate(&db)?.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe drug.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrug {
    pub id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub active_ingredient: Option<String>,
    pub drug_class: Option<String>,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
}

impl From<Drug> for FfiDrug {
    fn from(drug: Drug) -> Self {
        Self {
            id: drug.id,
            name: drug.name,
            generic_name: drug.generic_name,
            active_ingredient: drug.active_ingredient,
            drug_class: drug.drug_class,
            strength: drug.strength,
            dosage_form: drug.dosage_form,
        }
    }
}

impl From<FfiDrug> for Drug {
    fn from(drug: FfiDrug) -> Self {
        Drug {
            id: drug.id,
            name: drug.name,
            generic_name: drug.generic_name,
            active_ingredient: drug.active_ingredient,
            drug_class: drug.drug_class,
            strength: drug.strength,
            dosage_form: drug.dosage_form,
        }
    }
}

/// FFI-safe allergen.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAllergen {
    pub id: i64,
    pub name: String,
    pub allergen_type: String,
    pub cross_sensitivity_group: Option<String>,
    pub description: Option<String>,
}

impl From<Allergen> for FfiAllergen {
    fn from(allergen: Allergen) -> Self {
        Self {
            id: allergen.id,
            name: allergen.name,
            allergen_type: allergen.allergen_type.as_str().to_string(),
            cross_sensitivity_group: allergen.cross_sensitivity_group,
            description: allergen.description,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            date_of_birth: patient.date_of_birth,
            created_at: patient.created_at,
        }
    }
}

/// FFI-safe allergy record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientAllergy {
    pub id: i64,
    pub patient_id: i64,
    pub allergen_id: i64,
    pub severity: String,
    pub reaction_description: Option<String>,
    pub status: String,
}

impl From<PatientAllergy> for FfiPatientAllergy {
    fn from(allergy: PatientAllergy) -> Self {
        Self {
            id: allergy.id,
            patient_id: allergy.patient_id,
            allergen_id: allergy.allergen_id,
            severity: allergy.severity.as_str().to_string(),
            reaction_description: allergy.reaction_description,
            status: allergy.status.as_str().to_string(),
        }
    }
}

/// FFI-safe warning.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWarning {
    pub medicine: String,
    pub allergen: Option<String>,
    pub severity: Option<String>,
    pub reason: String,
    pub confidence: Option<String>,
    pub conflict_type: Option<String>,
}

impl From<WarningItem> for FfiWarning {
    fn from(item: WarningItem) -> Self {
        Self {
            medicine: item.medicine,
            allergen: item.allergen,
            severity: item.severity.map(|s| s.as_str().to_string()),
            reason: item.reason,
            confidence: item.confidence.map(|c| c.as_str().to_string()),
            conflict_type: item.conflict_type.map(|t| t.as_str().to_string()),
        }
    }
}

/// FFI-safe contraindication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiContraindication {
    pub medicine: String,
    pub allergen: String,
    pub severity: String,
    pub reason: String,
    pub conflict_type: String,
}

impl From<ContraindicationItem> for FfiContraindication {
    fn from(item: ContraindicationItem) -> Self {
        Self {
            medicine: item.medicine,
            allergen: item.allergen,
            severity: item.severity.as_str().to_string(),
            reason: item.reason,
            conflict_type: item.conflict_type.as_str().to_string(),
        }
    }
}

/// FFI-safe prescription check result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescriptionCheck {
    pub check_id: String,
    pub checked_at: String,
    pub patient_name: String,
    pub patient_id: i64,
    pub is_safe: bool,
    pub warnings: Vec<FfiWarning>,
    pub contraindications: Vec<FfiContraindication>,
    pub safe_medicines: Vec<String>,
    pub risk_level: String,
    pub recommendations: Vec<String>,
}

impl From<PrescriptionCheck> for FfiPrescriptionCheck {
    fn from(check: PrescriptionCheck) -> Self {
        Self {
            check_id: check.check_id,
            checked_at: check.checked_at,
            patient_name: check.patient_name,
            patient_id: check.patient_id,
            is_safe: check.is_safe,
            warnings: check.warnings.into_iter().map(Into::into).collect(),
            contraindications: check.contraindications.into_iter().map(Into::into).collect(),
            safe_medicines: check.safe_medicines,
            risk_level: check.risk_level.as_str().to_string(),
            recommendations: check.recommendations,
        }
    }
}

/// FFI-safe audit log row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCheckRecord {
    pub check_id: String,
    pub patient_id: i64,
    pub medicines: Vec<String>,
    pub is_safe: bool,
    pub risk_level: String,
    pub payload_hash: String,
    pub checked_at: String,
}

impl From<PrescriptionCheckRecord> for FfiCheckRecord {
    fn from(record: PrescriptionCheckRecord) -> Self {
        Self {
            check_id: record.check_id,
            patient_id: record.patient_id,
            medicines: record.medicines,
            is_safe: record.is_safe,
            risk_level: record.risk_level.as_str().to_string(),
            payload_hash: record.payload_hash,
            checked_at: record.checked_at,
        }
    }
}
