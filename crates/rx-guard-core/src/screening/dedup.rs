//! Prescription-wide deduplication of classified entries.

use std::collections::HashSet;

use super::classifier::VerdictEntry;
use crate::models::Severity;

/// (medicine, allergen or "", severity or "").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    medicine: String,
    allergen: String,
    severity: String,
}

impl DedupKey {
    pub fn new(medicine: &str, allergen: Option<&str>, severity: Option<Severity>) -> Self {
        Self {
            medicine: medicine.to_string(),
            allergen: allergen.unwrap_or_default().to_string(),
            severity: severity.map(|s| s.as_str()).unwrap_or_default().to_string(),
        }
    }

    pub fn of(entry: &VerdictEntry) -> Self {
        Self::new(entry.medicine(), entry.allergen(), entry.severity())
    }
}

/// Keys already emitted in this prescription check. First occurrence wins.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<DedupKey>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entry's key; `false` if it was already present.
    pub fn admit(&mut self, entry: &VerdictEntry) -> bool {
        self.seen.insert(DedupKey::of(entry))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
