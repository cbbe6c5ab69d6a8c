//! Allergy pattern report across all patients.

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::Severity;

/// Allergens listed in the report.
pub const TOP_ALLERGEN_LIMIT: usize = 10;

/// One allergen and how many allergy records name it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergenCount {
    pub allergen: String,
    pub patient_count: u32,
}

/// Allergy records per recorded severity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: u32,
}

/// Most common allergens and the severity distribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyPatternReport {
    /// Generation timestamp
    pub generated_at: String,
    /// Most common allergens, most frequent first
    pub common_allergies: Vec<AllergenCount>,
    /// Counts per severity, mildest first
    pub severity_distribution: Vec<SeverityCount>,
}

impl AllergyPatternReport {
    /// Build the report from every recorded allergy, whatever its status.
    pub fn generate(db: &Database) -> DbResult<Self> {
        let mut stmt = db.conn().prepare(
            r#"
            SELECT a.allergen_name, COUNT(pa.allergy_id) AS n
            FROM patient_allergies pa
            JOIN allergens a ON a.allergen_id = pa.allergen_id
            GROUP BY a.allergen_id
            ORDER BY n DESC, a.allergen_name
            LIMIT ?
            "#,
        )?;
        let common_allergies = stmt
            .query_map([TOP_ALLERGEN_LIMIT as i64], |row| {
                Ok(AllergenCount {
                    allergen: row.get(0)?,
                    patient_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = db
            .conn()
            .prepare("SELECT severity, COUNT(*) FROM patient_allergies GROUP BY severity")?;
        let mut severity_distribution = stmt
            .query_map([], |row| {
                let severity: String = row.get(0)?;
                Ok(SeverityCount {
                    severity: Severity::parse(&severity),
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        severity_distribution.sort_by_key(|s| s.severity);

        Ok(Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            common_allergies,
            severity_distribution,
        })
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV, one section per table.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("allergen,patient_count\n");
        for row in &self.common_allergies {
            csv.push_str(&format!("{},{}\n", escape_csv(&row.allergen), row.patient_count));
        }

        csv.push('\n');
        csv.push_str("severity,count\n");
        for row in &self.severity_distribution {
            csv.push_str(&format!("{},{}\n", row.severity.as_str(), row.count));
        }

        csv
    }
}

/// Escape a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllergenType, Patient, PatientAllergy};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let john = db.insert_patient(&Patient::new("John", "Smith")).unwrap();
        let jane = db.insert_patient(&Patient::new("Jane", "Doe")).unwrap();

        let penicillin = db
            .create_allergen_if_absent("Penicillin", AllergenType::ActiveIngredient, Some("beta_lactams"))
            .unwrap();
        let dye = db
            .create_allergen_if_absent("Dye, Red #40", AllergenType::InactiveIngredient, None)
            .unwrap();

        db.add_patient_allergy(&PatientAllergy::new(john, penicillin.id, Severity::Severe))
            .unwrap();
        db.add_patient_allergy(&PatientAllergy::new(jane, penicillin.id, Severity::Mild))
            .unwrap();
        db.add_patient_allergy(&PatientAllergy::new(jane, dye.id, Severity::Mild))
            .unwrap();
        db
    }

    #[test]
    fn test_generate_report() {
        let db = setup_db();
        let report = AllergyPatternReport::generate(&db).unwrap();

        assert_eq!(report.common_allergies[0].allergen, "Penicillin");
        assert_eq!(report.common_allergies[0].patient_count, 2);
        assert_eq!(report.common_allergies.len(), 2);

        assert_eq!(
            report.severity_distribution,
            vec![
                SeverityCount { severity: Severity::Mild, count: 2 },
                SeverityCount { severity: Severity::Severe, count: 1 },
            ]
        );
    }

    #[test]
    fn test_csv_escapes_names() {
        let db = setup_db();
        let csv = AllergyPatternReport::generate(&db).unwrap().to_csv();

        assert!(csv.starts_with("allergen,patient_count\nPenicillin,2\n"));
        assert!(csv.contains("\"Dye, Red #40\",1"));
        assert!(csv.contains("severity,count\nmild,2\nsevere,1\n"));
    }

    #[test]
    fn test_empty_report_json() {
        let db = Database::open_in_memory().unwrap();
        let json = AllergyPatternReport::generate(&db).unwrap().to_json().unwrap();

        assert!(json.contains("\"common_allergies\": []"));
    }
}
