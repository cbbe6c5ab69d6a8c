//! Append-only audit log of prescription checks.
//!
//! Each check is stored with its canonical JSON payload and the SHA-256 of
//! that payload, so a stored verdict can later be re-verified.

use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::{Database, DbError, DbResult};
use crate::models::{PatientId, PrescriptionCheck, RiskLevel};

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionCheckRecord {
    pub check_id: String,
    pub patient_id: PatientId,
    pub medicines: Vec<String>,
    pub is_safe: bool,
    pub risk_level: RiskLevel,
    pub payload_hash: String,
    pub checked_at: String,
}

/// SHA-256 hex digest of a payload.
pub fn payload_digest(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

impl Database {
    /// Append a completed check, plus one alert row per warning and
    /// contraindication. Returns the payload hash.
    pub fn record_prescription_check(
        &self,
        check: &PrescriptionCheck,
        medicines: &[String],
    ) -> DbResult<String> {
        let payload = check.to_canonical_json()?;
        let hash = payload_digest(&payload);
        let medicines_json = serde_json::to_string(medicines)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO prescription_checks (
                check_id, patient_id, medicines, is_safe, risk_level,
                payload, payload_hash, checked_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                check.check_id,
                check.patient_id,
                medicines_json,
                check.is_safe,
                check.risk_level.as_str(),
                payload,
                hash,
                check.checked_at,
            ],
        )?;

        {
            let mut alert = tx.prepare(
                r#"
                INSERT INTO allergy_alerts (
                    check_id, patient_id, medicine, allergen_name, alert_level, alert_message
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for item in &check.contraindications {
                alert.execute(params![
                    check.check_id,
                    check.patient_id,
                    item.medicine,
                    item.allergen,
                    "contraindication",
                    item.reason,
                ])?;
            }
            for item in &check.warnings {
                alert.execute(params![
                    check.check_id,
                    check.patient_id,
                    item.medicine,
                    item.allergen,
                    "warning",
                    item.reason,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            check_id = %check.check_id,
            patient_id = check.patient_id,
            is_safe = check.is_safe,
            "recorded prescription check"
        );
        Ok(hash)
    }

    /// Audit history for a patient, newest first.
    pub fn list_prescription_checks(
        &self,
        patient_id: PatientId,
    ) -> DbResult<Vec<PrescriptionCheckRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT check_id, patient_id, medicines, is_safe, risk_level, payload_hash, checked_at
            FROM prescription_checks
            WHERE patient_id = ?
            ORDER BY checked_at DESC, rowid DESC
            "#,
        )?;
        let rows = stmt.query_map([patient_id], record_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Load the stored check back from its payload.
    pub fn get_prescription_check(&self, check_id: &str) -> DbResult<Option<PrescriptionCheck>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM prescription_checks WHERE check_id = ?",
                [check_id],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Recompute the payload hash and compare it with the stored one.
    pub fn verify_prescription_check(&self, check_id: &str) -> DbResult<bool> {
        let (payload, stored_hash): (String, String) = self
            .conn
            .query_row(
                "SELECT payload, payload_hash FROM prescription_checks WHERE check_id = ?",
                [check_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("prescription check {check_id}")))?;

        Ok(payload_digest(&payload) == stored_hash)
    }

    /// Number of alert rows written for a check.
    pub fn count_alerts(&self, check_id: &str) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM allergy_alerts WHERE check_id = ?",
            [check_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionCheckRecord> {
    let medicines: String = row.get(2)?;
    let risk_level: String = row.get(4)?;
    Ok(PrescriptionCheckRecord {
        check_id: row.get(0)?,
        patient_id: row.get(1)?,
        medicines: serde_json::from_str(&medicines).unwrap_or_default(),
        is_safe: row.get(3)?,
        risk_level: RiskLevel::parse(&risk_level).unwrap_or(RiskLevel::Medium),
        payload_hash: row.get(5)?,
        checked_at: row.get(6)?,
    })
}
