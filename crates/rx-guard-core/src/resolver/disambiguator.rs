//! Deterministic choice among catalog drugs matching a prescribed name.
//!
//! Tiers, first tier with any case-insensitive substring hit wins:
//! - Product name
//! - Generic name
//! - Active ingredient
//!
//! Within a tier: exact (case-insensitive) match first, then Jaro-Winkler
//! similarity to the query, then lowest ID.
//!
//! Case folding is ASCII-only, the same as SQLite `LIKE` and `NOCASE`, so
//! the SQL catalog and the in-memory snapshot agree on every name.

use std::cmp::Ordering;

use strsim::jaro_winkler;

use crate::models::Drug;

/// Number of leading characters used for prefix suggestions.
pub const SUGGESTION_PREFIX_LEN: usize = 3;

/// Field a drug was resolved through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Name,
    GenericName,
    ActiveIngredient,
}

impl MatchTier {
    const ALL: [MatchTier; 3] = [
        MatchTier::Name,
        MatchTier::GenericName,
        MatchTier::ActiveIngredient,
    ];

    fn field<'d>(&self, drug: &'d Drug) -> Option<&'d str> {
        match self {
            MatchTier::Name => Some(drug.name.as_str()),
            MatchTier::GenericName => drug.generic_name.as_deref(),
            MatchTier::ActiveIngredient => drug.active_ingredient.as_deref(),
        }
    }
}

/// A drug picked for a prescribed name.
#[derive(Debug, Clone, PartialEq)]
pub struct DrugMatch {
    pub drug: Drug,
    pub tier: MatchTier,
    pub exact: bool,
    pub similarity: f64,
}

/// Pick the best drug for `query` among `candidates`.
///
/// Candidates that do not contain the query in any tier field are ignored,
/// so callers may pass a superset.
pub fn resolve_drug(candidates: &[Drug], query: &str) -> Option<DrugMatch> {
    let query_lower = query.trim().to_ascii_lowercase();
    if query_lower.is_empty() {
        return None;
    }

    MatchTier::ALL.iter().find_map(|tier| {
        candidates
            .iter()
            .filter_map(|drug| score_in_tier(drug, *tier, &query_lower))
            .max_by(compare_matches)
    })
}

fn score_in_tier(drug: &Drug, tier: MatchTier, query_lower: &str) -> Option<DrugMatch> {
    let field = tier.field(drug)?.to_ascii_lowercase();
    if !field.contains(query_lower) {
        return None;
    }

    Some(DrugMatch {
        drug: drug.clone(),
        tier,
        exact: field == query_lower,
        similarity: jaro_winkler(query_lower, &field),
    })
}

/// Ordering where the preferred match compares greatest.
fn compare_matches(a: &DrugMatch, b: &DrugMatch) -> Ordering {
    a.exact
        .cmp(&b.exact)
        .then_with(|| {
            a.similarity
                .partial_cmp(&b.similarity)
                .unwrap_or(Ordering::Equal)
        })
        // Lower ID wins, so reverse
        .then_with(|| b.drug.id.cmp(&a.drug.id))
}

/// Leading characters used for prefix suggestions, if the name is long enough.
pub fn prefix_key(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.chars().count() < SUGGESTION_PREFIX_LEN {
        return None;
    }
    Some(trimmed.chars().take(SUGGESTION_PREFIX_LEN).collect())
}

/// Concatenate prefix and substring suggestions, dropping repeats, keeping
/// first-seen order, and truncating to `limit`.
pub fn merge_suggestions(
    prefix_matches: impl IntoIterator<Item = String>,
    substring_matches: impl IntoIterator<Item = String>,
    limit: usize,
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for name in prefix_matches.into_iter().chain(substring_matches) {
        if !merged.contains(&name) {
            merged.push(name);
        }
    }
    merged.truncate(limit);
    merged
}
