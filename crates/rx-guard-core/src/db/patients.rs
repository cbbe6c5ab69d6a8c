//! Patient and allergy-history database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{AllergenId, AllergyStatus, Patient, PatientAllergy, PatientId, Severity};

const PATIENT_COLUMNS: &str = "patient_id, first_name, last_name, date_of_birth, created_at";

const ALLERGY_COLUMNS: &str =
    "allergy_id, patient_id, allergen_id, severity, reaction_description, status";

impl Database {
    /// Insert a new patient and return its ID. `patient.id` is ignored.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<PatientId> {
        self.conn.execute(
            r#"
            INSERT INTO patients (first_name, last_name, date_of_birth, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                patient.first_name,
                patient.last_name,
                patient.date_of_birth,
                patient.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: PatientId) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?"),
                [patient_id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find a patient by name.
    ///
    /// Matches the first word of `name` against first names (substring,
    /// case-insensitive); the lowest ID wins.
    pub fn find_patient_by_name(&self, name: &str) -> DbResult<Option<Patient>> {
        let first_word = match name.split_whitespace().next() {
            Some(word) => word,
            None => return Ok(None),
        };
        let pattern = format!("%{}%", super::catalog::escape_like(first_word));

        self.conn
            .query_row(
                &format!(
                    r#"
                    SELECT {PATIENT_COLUMNS} FROM patients
                    WHERE first_name LIKE ?1 ESCAPE '\'
                    ORDER BY patient_id
                    LIMIT 1
                    "#
                ),
                [pattern],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY last_name, first_name"
        ))?;
        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a patient (allergy records cascade).
    pub fn delete_patient(&self, patient_id: PatientId) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE patient_id = ?", [patient_id])?;
        Ok(rows_affected > 0)
    }

    /// Record an allergy for a patient and return its ID.
    pub fn add_patient_allergy(&self, allergy: &PatientAllergy) -> DbResult<i64> {
        if self.get_patient(allergy.patient_id)?.is_none() {
            return Err(DbError::NotFound(format!("patient {}", allergy.patient_id)));
        }

        self.conn.execute(
            r#"
            INSERT INTO patient_allergies (
                patient_id, allergen_id, severity, reaction_description, status
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                allergy.patient_id,
                allergy.allergen_id,
                allergy.severity.as_str(),
                allergy.reaction_description,
                allergy.status.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Change the status of an allergy record.
    pub fn set_allergy_status(&self, allergy_id: i64, status: AllergyStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patient_allergies SET status = ?1 WHERE allergy_id = ?2",
            params![status.as_str(), allergy_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// All allergy records of a patient, in entry order.
    pub fn list_patient_allergies(&self, patient_id: PatientId) -> DbResult<Vec<PatientAllergy>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALLERGY_COLUMNS} FROM patient_allergies WHERE patient_id = ? ORDER BY allergy_id"
        ))?;
        let rows = stmt.query_map([patient_id], allergy_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Active allergy records of a patient, in entry order.
    pub fn list_active_allergies(&self, patient_id: PatientId) -> DbResult<Vec<PatientAllergy>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {ALLERGY_COLUMNS} FROM patient_allergies
            WHERE patient_id = ? AND status = 'active'
            ORDER BY allergy_id
            "#
        ))?;
        let rows = stmt.query_map([patient_id], allergy_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Patients with at least one active allergy to `allergen_id`.
    pub fn count_patients_allergic_to(&self, allergen_id: AllergenId) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(DISTINCT patient_id) FROM patient_allergies
            WHERE allergen_id = ? AND status = 'active'
            "#,
            [allergen_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn allergy_from_row(row: &Row<'_>) -> rusqlite::Result<PatientAllergy> {
    let severity: String = row.get(3)?;
    let status: String = row.get(5)?;
    Ok(PatientAllergy {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        allergen_id: row.get(2)?,
        severity: Severity::parse(&severity),
        reaction_description: row.get(4)?,
        // CHECK constraint keeps this in range; treat anything else as inactive
        status: AllergyStatus::parse(&status).unwrap_or(AllergyStatus::Inactive),
    })
}
