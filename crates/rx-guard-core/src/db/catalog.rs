//! Drug and allergen catalog database operations.

use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::{Database, DbError, DbResult};
use crate::models::{Allergen, AllergenId, AllergenType, Drug, DrugId};

/// Maximum rows returned by a drug search.
pub const DRUG_SEARCH_LIMIT: usize = 50;

const DRUG_COLUMNS: &str =
    "drug_id, drug_name, generic_name, active_ingredient, drug_class, strength, dosage_form";

const ALLERGEN_COLUMNS: &str =
    "allergen_id, allergen_name, allergen_type, cross_sensitivity_group, description";

impl Database {
    // =========================================================================
    // Drugs
    // =========================================================================

    /// Insert a drug and return its new ID. `drug.id` is ignored.
    pub fn insert_drug(&self, drug: &Drug) -> DbResult<DrugId> {
        self.conn.execute(
            r#"
            INSERT INTO drugs (
                drug_name, generic_name, active_ingredient, drug_class, strength, dosage_form
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                drug.name,
                drug.generic_name,
                drug.active_ingredient,
                drug.drug_class,
                drug.strength,
                drug.dosage_form,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Update an existing drug.
    pub fn update_drug(&self, drug: &Drug) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE drugs SET
                drug_name = ?2,
                generic_name = ?3,
                active_ingredient = ?4,
                drug_class = ?5,
                strength = ?6,
                dosage_form = ?7,
                updated_at = datetime('now')
            WHERE drug_id = ?1
            "#,
            params![
                drug.id,
                drug.name,
                drug.generic_name,
                drug.active_ingredient,
                drug.drug_class,
                drug.strength,
                drug.dosage_form,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a drug by ID.
    pub fn get_drug(&self, drug_id: DrugId) -> DbResult<Option<Drug>> {
        self.conn
            .query_row(
                &format!("SELECT {DRUG_COLUMNS} FROM drugs WHERE drug_id = ?"),
                [drug_id],
                drug_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Search drugs by name, generic name or active ingredient (substring,
    /// ASCII case-insensitive like every `LIKE` here).
    pub fn search_drugs(&self, query: &str, limit: usize) -> DbResult<Vec<Drug>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {DRUG_COLUMNS}
            FROM drugs
            WHERE drug_name LIKE ?1 ESCAPE '\'
               OR generic_name LIKE ?1 ESCAPE '\'
               OR active_ingredient LIKE ?1 ESCAPE '\'
            ORDER BY drug_id
            LIMIT ?2
            "#
        ))?;

        let rows = stmt.query_map(params![pattern, sql_limit(limit)], drug_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Drugs whose name or generic name starts with `prefix`, oldest first.
    pub fn drugs_with_prefix(&self, prefix: &str, limit: usize) -> DbResult<Vec<Drug>> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {DRUG_COLUMNS}
            FROM drugs
            WHERE drug_name LIKE ?1 ESCAPE '\'
               OR generic_name LIKE ?1 ESCAPE '\'
            ORDER BY drug_id
            LIMIT ?2
            "#
        ))?;

        let rows = stmt.query_map(params![pattern, sql_limit(limit)], drug_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all drugs ordered by ID.
    pub fn list_drugs(&self) -> DbResult<Vec<Drug>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DRUG_COLUMNS} FROM drugs ORDER BY drug_id"))?;
        let rows = stmt.query_map([], drug_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a drug (mappings cascade).
    pub fn delete_drug(&self, drug_id: DrugId) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM drugs WHERE drug_id = ?", [drug_id])?;
        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Allergens
    // =========================================================================

    /// Get an allergen by ID.
    pub fn get_allergen(&self, allergen_id: AllergenId) -> DbResult<Option<Allergen>> {
        self.conn
            .query_row(
                &format!("SELECT {ALLERGEN_COLUMNS} FROM allergens WHERE allergen_id = ?"),
                [allergen_id],
                allergen_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Find an allergen by name, case-insensitive.
    ///
    /// An exact name match wins; otherwise the lowest-ID allergen whose name
    /// contains `name` is returned.
    pub fn find_allergen_by_name(&self, name: &str) -> DbResult<Option<Allergen>> {
        find_allergen(&self.conn, name)
    }

    /// Return the allergen found by [`Database::find_allergen_by_name`], or insert it.
    ///
    /// Runs inside an IMMEDIATE transaction so concurrent creators of the same
    /// name serialize on the write lock.
    pub fn create_allergen_if_absent(
        &self,
        name: &str,
        allergen_type: AllergenType,
        cross_sensitivity_group: Option<&str>,
    ) -> DbResult<Allergen> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::Constraint("allergen name must not be empty".into()));
        }

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        if let Some(existing) = find_allergen(&tx, name)? {
            tx.commit()?;
            return Ok(existing);
        }

        tx.execute(
            r#"
            INSERT OR IGNORE INTO allergens (allergen_name, allergen_type, cross_sensitivity_group)
            VALUES (?1, ?2, ?3)
            "#,
            params![name, allergen_type.as_str(), cross_sensitivity_group],
        )?;

        let created = tx
            .query_row(
                &format!(
                    "SELECT {ALLERGEN_COLUMNS} FROM allergens WHERE allergen_name = ?1 COLLATE NOCASE"
                ),
                [name],
                allergen_from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("allergen '{}'", name)))?;

        tx.commit()?;
        tracing::debug!(allergen = %created.name, id = created.id, "allergen created");
        Ok(created)
    }

    /// List all allergens ordered by ID.
    pub fn list_allergens(&self) -> DbResult<Vec<Allergen>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALLERGEN_COLUMNS} FROM allergens ORDER BY allergen_id"
        ))?;
        let rows = stmt.query_map([], allergen_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // =========================================================================
    // Drug-Allergen Mapping
    // =========================================================================

    /// Map a drug to an allergen. A repeated pair is a no-op.
    ///
    /// Returns `true` if a new mapping was created.
    pub fn map_drug_to_allergen(&self, drug_id: DrugId, allergen_id: AllergenId) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "INSERT OR IGNORE INTO drug_allergen_mapping (drug_id, allergen_id) VALUES (?1, ?2)",
            params![drug_id, allergen_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Allergen IDs mapped to a drug, ascending.
    pub fn allergen_ids_for_drug(&self, drug_id: DrugId) -> DbResult<Vec<AllergenId>> {
        let mut stmt = self.conn.prepare(
            "SELECT allergen_id FROM drug_allergen_mapping WHERE drug_id = ? ORDER BY allergen_id",
        )?;
        let rows = stmt.query_map([drug_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All mapping pairs, for building in-memory snapshots.
    pub fn list_drug_allergen_mappings(&self) -> DbResult<Vec<(DrugId, AllergenId)>> {
        let mut stmt = self.conn.prepare(
            "SELECT drug_id, allergen_id FROM drug_allergen_mapping ORDER BY drug_id, allergen_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn find_allergen(conn: &rusqlite::Connection, name: &str) -> DbResult<Option<Allergen>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    let exact = conn
        .query_row(
            &format!(
                "SELECT {ALLERGEN_COLUMNS} FROM allergens WHERE allergen_name = ?1 COLLATE NOCASE"
            ),
            [name],
            allergen_from_row,
        )
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }

    let pattern = format!("%{}%", escape_like(name));
    conn.query_row(
        &format!(
            r#"
            SELECT {ALLERGEN_COLUMNS} FROM allergens
            WHERE allergen_name LIKE ?1 ESCAPE '\'
            ORDER BY allergen_id
            LIMIT 1
            "#
        ),
        [pattern],
        allergen_from_row,
    )
    .optional()
    .map_err(Into::into)
}

fn drug_from_row(row: &Row<'_>) -> rusqlite::Result<Drug> {
    Ok(Drug {
        id: row.get(0)?,
        name: row.get(1)?,
        generic_name: row.get(2)?,
        active_ingredient: row.get(3)?,
        drug_class: row.get(4)?,
        strength: row.get(5)?,
        dosage_form: row.get(6)?,
    })
}

fn allergen_from_row(row: &Row<'_>) -> rusqlite::Result<Allergen> {
    let allergen_type: String = row.get(2)?;
    Ok(Allergen {
        id: row.get(0)?,
        name: row.get(1)?,
        allergen_type: AllergenType::parse(&allergen_type),
        cross_sensitivity_group: row.get(3)?,
        description: row.get(4)?,
    })
}

/// SQLite LIMIT value; `usize::MAX` means unbounded.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Escape LIKE wildcards so user input matches literally.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get_drug() {
        let db = setup_db();

        let drug = Drug::new(0, "Amoxicillin 500mg")
            .with_generic("Amoxicillin", "Amoxicillin")
            .with_class("Penicillin antibiotic");
        let id = db.insert_drug(&drug).unwrap();

        let retrieved = db.get_drug(id).unwrap().unwrap();
        assert_eq!(retrieved.id, id);
        assert_eq!(retrieved.name, "Amoxicillin 500mg");
        assert_eq!(retrieved.generic_name, Some("Amoxicillin".into()));
        assert_eq!(retrieved.drug_class, Some("Penicillin antibiotic".into()));
    }

    #[test]
    fn test_update_drug() {
        let db = setup_db();

        let id = db.insert_drug(&Drug::new(0, "Original Name")).unwrap();
        let mut drug = db.get_drug(id).unwrap().unwrap();
        drug.name = "Updated Name".into();
        assert!(db.update_drug(&drug).unwrap());

        assert_eq!(db.get_drug(id).unwrap().unwrap().name, "Updated Name");
    }

    #[test]
    fn test_search_drugs_all_fields() {
        let db = setup_db();
        db.insert_drug(&Drug::new(0, "Tylenol 500mg").with_generic("Acetaminophen", "Paracetamol"))
            .unwrap();
        db.insert_drug(&Drug::new(0, "Ibuprofen 200mg").with_generic("Ibuprofen", "Ibuprofen"))
            .unwrap();

        assert_eq!(db.search_drugs("tylenol", 10).unwrap().len(), 1);
        assert_eq!(db.search_drugs("ACETAMINOPHEN", 10).unwrap().len(), 1);
        assert_eq!(db.search_drugs("paracet", 10).unwrap().len(), 1);
        assert_eq!(db.search_drugs("mg", 10).unwrap().len(), 2);
        assert_eq!(db.search_drugs("mg", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let db = setup_db();
        db.insert_drug(&Drug::new(0, "Aspirin 325mg")).unwrap();

        assert!(db.search_drugs("%", 10).unwrap().is_empty());
        assert!(db.search_drugs("_spirin", 10).unwrap().is_empty());
    }

    #[test]
    fn test_drugs_with_prefix() {
        let db = setup_db();
        db.insert_drug(&Drug::new(0, "Amoxicillin 500mg")).unwrap();
        db.insert_drug(&Drug::new(0, "Amlodipine 5mg")).unwrap();
        db.insert_drug(&Drug::new(0, "Aspirin 325mg")).unwrap();

        let results = db.drugs_with_prefix("Amo", 3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Amoxicillin 500mg");
    }

    #[test]
    fn test_find_allergen_prefers_exact_match() {
        let db = setup_db();
        db.create_allergen_if_absent("Sulfa", AllergenType::DrugClass, Some("sulfonamides"))
            .unwrap();
        db.create_allergen_if_absent("Sulfamethoxazole", AllergenType::ActiveIngredient, Some("sulfonamides"))
            .unwrap();

        let exact = db.find_allergen_by_name("sulfa").unwrap().unwrap();
        assert_eq!(exact.name, "Sulfa");

        let partial = db.find_allergen_by_name("methox").unwrap().unwrap();
        assert_eq!(partial.name, "Sulfamethoxazole");

        assert!(db.find_allergen_by_name("latex").unwrap().is_none());
        assert!(db.find_allergen_by_name("   ").unwrap().is_none());
    }

    #[test]
    fn test_create_allergen_if_absent_is_idempotent() {
        let db = setup_db();

        let first = db
            .create_allergen_if_absent("Penicillin", AllergenType::ActiveIngredient, Some("beta_lactams"))
            .unwrap();
        let second = db
            .create_allergen_if_absent("PENICILLIN", AllergenType::DrugClass, None)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.cross_sensitivity_group, Some("beta_lactams".into()));
        assert_eq!(db.list_allergens().unwrap().len(), 1);
    }

    #[test]
    fn test_create_allergen_if_absent_reuses_substring_match() {
        let db = setup_db();

        let existing = db
            .create_allergen_if_absent("Sulfamethoxazole", AllergenType::ActiveIngredient, Some("sulfonamides"))
            .unwrap();
        let reused = db
            .create_allergen_if_absent("Sulfa", AllergenType::DrugClass, None)
            .unwrap();

        assert_eq!(reused.id, existing.id);
        assert_eq!(reused.name, "Sulfamethoxazole");
        assert_eq!(db.list_allergens().unwrap().len(), 1);
    }

    #[test]
    fn test_create_allergen_rejects_blank_name() {
        let db = setup_db();
        let result = db.create_allergen_if_absent("  ", AllergenType::ActiveIngredient, None);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_map_drug_to_allergen_is_idempotent() {
        let db = setup_db();
        let drug_id = db.insert_drug(&Drug::new(0, "Amoxicillin 500mg")).unwrap();
        let penicillin = db
            .create_allergen_if_absent("Penicillin", AllergenType::ActiveIngredient, Some("beta_lactams"))
            .unwrap();

        assert!(db.map_drug_to_allergen(drug_id, penicillin.id).unwrap());
        assert!(!db.map_drug_to_allergen(drug_id, penicillin.id).unwrap());

        assert_eq!(db.allergen_ids_for_drug(drug_id).unwrap(), vec![penicillin.id]);
        assert_eq!(db.list_drug_allergen_mappings().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_drug_cascades_mappings() {
        let db = setup_db();
        let drug_id = db.insert_drug(&Drug::new(0, "Amoxicillin 500mg")).unwrap();
        let allergen = db
            .create_allergen_if_absent("Penicillin", AllergenType::ActiveIngredient, None)
            .unwrap();
        db.map_drug_to_allergen(drug_id, allergen.id).unwrap();

        assert!(db.delete_drug(drug_id).unwrap());
        assert!(db.allergen_ids_for_drug(drug_id).unwrap().is_empty());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
