//! Resolution of prescribed medicine names to catalog drugs.
//!
//! Pipeline: Cleaning → Catalog lookup → Brand-name retry → Suggestions

mod normalizer;
mod disambiguator;

pub use normalizer::*;
pub use disambiguator::*;

use crate::catalog::{Catalog, CatalogResult};
use crate::models::Drug;

/// Outcome of resolving one prescribed name.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The name (or its generic expansion) matched a catalog drug.
    Found {
        drug: Drug,
        tier: MatchTier,
        /// Generic name used when the prescribed name only matched as a brand
        via_alias: Option<String>,
    },
    /// Nothing matched; `suggestions` are close catalog names.
    NotFound { suggestions: Vec<String> },
}

/// Resolves prescribed names against a catalog.
pub struct Resolver<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    normalizer: Normalizer,
    max_suggestions: usize,
}

impl<'a, C: Catalog + ?Sized> Resolver<'a, C> {
    /// Create a new resolver.
    pub fn new(catalog: &'a C, max_suggestions: usize) -> Self {
        Self {
            catalog,
            normalizer: Normalizer::new(),
            max_suggestions,
        }
    }

    /// Resolve an already cleaned medicine name.
    pub fn resolve(&self, name: &str) -> CatalogResult<Resolution> {
        if let Some(found) = self.catalog.find_drug(name)? {
            return Ok(Resolution::Found {
                drug: found.drug,
                tier: found.tier,
                via_alias: None,
            });
        }

        if let Some(generic) = self.normalizer.expand_alias(name) {
            if let Some(found) = self.catalog.find_drug(&generic)? {
                tracing::debug!(medicine = name, generic = %generic, "resolved through brand alias");
                return Ok(Resolution::Found {
                    drug: found.drug,
                    tier: found.tier,
                    via_alias: Some(generic),
                });
            }
        }

        let suggestions = self.catalog.suggest_drugs(name, self.max_suggestions)?;
        Ok(Resolution::NotFound { suggestions })
    }
}
