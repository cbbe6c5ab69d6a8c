//! Read-side catalog contract used by the screening engine.
//!
//! The engine never talks to SQLite directly; it takes any [`Catalog`]. Two
//! implementations ship with the crate: [`Database`] itself and the
//! in-memory [`CatalogSnapshot`].

mod snapshot;

pub use snapshot::CatalogSnapshot;

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{Allergen, AllergenId, DrugId};
use crate::resolver::{merge_suggestions, prefix_key, resolve_drug, DrugMatch};

/// Prefix-match suggestions fetched before merging.
pub const PREFIX_SUGGESTION_LIMIT: usize = 3;

/// Substring-match suggestions fetched before merging.
pub const SUBSTRING_SUGGESTION_LIMIT: usize = 2;

/// Catalog lookup errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Drug and allergen reference data.
pub trait Catalog {
    /// Resolve a prescribed name to a single drug (see [`resolve_drug`]).
    fn find_drug(&self, query: &str) -> CatalogResult<Option<DrugMatch>>;

    /// Names to suggest for an unresolved query, at most `limit`.
    fn suggest_drugs(&self, query: &str, limit: usize) -> CatalogResult<Vec<String>>;

    /// Allergen IDs mapped to a drug.
    fn allergens_for_drug(&self, drug_id: DrugId) -> CatalogResult<Vec<AllergenId>>;

    /// Allergen by ID; `None` when the ID is dangling.
    fn allergen(&self, allergen_id: AllergenId) -> CatalogResult<Option<Allergen>>;

    /// Allergen by name: exact match first, then lowest-ID substring match.
    fn find_allergen_by_name(&self, name: &str) -> CatalogResult<Option<Allergen>>;
}

impl Catalog for Database {
    fn find_drug(&self, query: &str) -> CatalogResult<Option<DrugMatch>> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        let candidates = self.search_drugs(query, usize::MAX)?;
        Ok(resolve_drug(&candidates, query))
    }

    fn suggest_drugs(&self, query: &str, limit: usize) -> CatalogResult<Vec<String>> {
        let prefix_matches = match prefix_key(query) {
            Some(prefix) => self.drugs_with_prefix(&prefix, PREFIX_SUGGESTION_LIMIT)?,
            None => Vec::new(),
        };
        let substring_matches = if query.trim().is_empty() {
            Vec::new()
        } else {
            self.search_drugs(query, SUBSTRING_SUGGESTION_LIMIT)?
        };

        Ok(merge_suggestions(
            prefix_matches.into_iter().map(|d| d.name),
            substring_matches.into_iter().map(|d| d.name),
            limit,
        ))
    }

    fn allergens_for_drug(&self, drug_id: DrugId) -> CatalogResult<Vec<AllergenId>> {
        Ok(self.allergen_ids_for_drug(drug_id)?)
    }

    fn allergen(&self, allergen_id: AllergenId) -> CatalogResult<Option<Allergen>> {
        Ok(self.get_allergen(allergen_id)?)
    }

    fn find_allergen_by_name(&self, name: &str) -> CatalogResult<Option<Allergen>> {
        Ok(Database::find_allergen_by_name(self, name)?)
    }
}
