//! SQLite schema definition.

/// Complete database schema for rx-guard.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Allergen Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS allergens (
    allergen_id INTEGER PRIMARY KEY AUTOINCREMENT,
    allergen_name TEXT NOT NULL,
    allergen_type TEXT NOT NULL DEFAULT 'active_ingredient'
        CHECK (allergen_type IN ('drug_class', 'active_ingredient', 'inactive_ingredient')),
    cross_sensitivity_group TEXT,                -- NULL means no group membership
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per name regardless of case
CREATE UNIQUE INDEX IF NOT EXISTS idx_allergens_name ON allergens(allergen_name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_allergens_group ON allergens(cross_sensitivity_group);

-- ============================================================================
-- Drugs
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    drug_id INTEGER PRIMARY KEY AUTOINCREMENT,
    drug_name TEXT NOT NULL,
    generic_name TEXT,
    active_ingredient TEXT,
    drug_class TEXT,
    strength TEXT,
    dosage_form TEXT,                            -- tablet, capsule, liquid, injection
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_drugs_name ON drugs(drug_name);
CREATE INDEX IF NOT EXISTS idx_drugs_generic ON drugs(generic_name);

-- Drug to allergen mapping (idempotent via composite key)
CREATE TABLE IF NOT EXISTS drug_allergen_mapping (
    drug_id INTEGER NOT NULL REFERENCES drugs(drug_id) ON DELETE CASCADE,
    allergen_id INTEGER NOT NULL REFERENCES allergens(allergen_id),
    PRIMARY KEY (drug_id, allergen_id)
);

CREATE INDEX IF NOT EXISTS idx_mapping_allergen ON drug_allergen_mapping(allergen_id);

-- ============================================================================
-- Patients and Allergy History
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_first_name ON patients(first_name);

CREATE TABLE IF NOT EXISTS patient_allergies (
    allergy_id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    allergen_id INTEGER NOT NULL REFERENCES allergens(allergen_id),
    severity TEXT NOT NULL
        CHECK (severity IN ('mild', 'moderate', 'severe', 'life_threatening', 'unknown')),
    reaction_description TEXT,
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'inactive', 'resolved')),
    entry_date TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patient_allergies_patient ON patient_allergies(patient_id, status);

-- ============================================================================
-- Prescription Check Audit Log (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescription_checks (
    check_id TEXT PRIMARY KEY,
    patient_id INTEGER NOT NULL,
    medicines TEXT NOT NULL DEFAULT '[]',        -- JSON array of prescribed names
    is_safe INTEGER NOT NULL,
    risk_level TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- canonical JSON of the check
    payload_hash TEXT NOT NULL,                  -- SHA-256 hex of payload
    checked_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_checks_patient ON prescription_checks(patient_id, checked_at);

CREATE TABLE IF NOT EXISTS allergy_alerts (
    alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
    check_id TEXT NOT NULL REFERENCES prescription_checks(check_id),
    patient_id INTEGER NOT NULL,
    medicine TEXT NOT NULL,
    allergen_name TEXT,
    alert_level TEXT NOT NULL CHECK (alert_level IN ('warning', 'contraindication')),
    alert_message TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_alerts_check ON allergy_alerts(check_id);

-- Audit rows are immutable
CREATE TRIGGER IF NOT EXISTS prescription_checks_no_update BEFORE UPDATE ON prescription_checks
BEGIN
    SELECT RAISE(ABORT, 'Prescription checks are append-only');
END;
"#;
