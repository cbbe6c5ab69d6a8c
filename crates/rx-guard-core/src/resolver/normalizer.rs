//! Medicine name normalizer.
//!
//! Handles:
//! - Trimming of whitespace and quote characters around prescribed names
//! - Brand-name expansion (advil→ibuprofen, crocin→paracetamol) used as a
//!   second chance when a name does not resolve as written

use std::collections::HashMap;

/// Characters stripped from both ends of a prescribed name.
const QUOTE_CHARS: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Strip surrounding whitespace and quotes from a prescribed medicine name.
pub fn clean_medicine_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || QUOTE_CHARS.contains(&c))
        .to_string()
}

/// Normalizer for prescribed medicine names.
pub struct Normalizer {
    /// Alias map: brand name → generic name
    aliases: HashMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }

    /// Expand a brand name to its generic name.
    ///
    /// The whole name is tried first, then its first word, so
    /// "Crocin 650" expands like "crocin". Returns `None` for unknown names.
    pub fn expand_alias(&self, name: &str) -> Option<String> {
        let lower = clean_medicine_name(name).to_lowercase();
        if let Some(generic) = self.aliases.get(&lower) {
            return Some(generic.clone());
        }
        lower
            .split_whitespace()
            .next()
            .and_then(|word| self.aliases.get(word))
            .cloned()
    }

    /// Add a custom alias mapping.
    pub fn add_alias(&mut self, alias: &str, generic: &str) {
        self.aliases
            .insert(alias.to_lowercase(), generic.to_lowercase());
    }

    /// Default brand-name mappings.
    fn default_aliases() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Analgesics / antipyretics
        map.insert("tylenol".into(), "acetaminophen".into());
        map.insert("panadol".into(), "paracetamol".into());
        map.insert("crocin".into(), "paracetamol".into());
        map.insert("dolo".into(), "paracetamol".into());
        map.insert("calpol".into(), "paracetamol".into());

        // NSAIDs
        map.insert("advil".into(), "ibuprofen".into());
        map.insert("motrin".into(), "ibuprofen".into());
        map.insert("brufen".into(), "ibuprofen".into());
        map.insert("aleve".into(), "naproxen".into());
        map.insert("naprosyn".into(), "naproxen".into());
        map.insert("disprin".into(), "aspirin".into());
        map.insert("ecosprin".into(), "aspirin".into());
        map.insert("voltaren".into(), "diclofenac".into());
        map.insert("celebrex".into(), "celecoxib".into());

        // Beta-lactams
        map.insert("amoxil".into(), "amoxicillin".into());
        map.insert("augmentin".into(), "amoxicillin".into());
        map.insert("keflex".into(), "cephalexin".into());
        map.insert("rocephin".into(), "ceftriaxone".into());

        // Other antibiotics
        map.insert("zithromax".into(), "azithromycin".into());
        map.insert("azee".into(), "azithromycin".into());
        map.insert("cipro".into(), "ciprofloxacin".into());
        map.insert("bactrim".into(), "sulfamethoxazole".into());
        map.insert("septra".into(), "sulfamethoxazole".into());

        // Others
        map.insert("lasix".into(), "furosemide".into());
        map.insert("glucophage".into(), "metformin".into());
        map.insert("zyrtec".into(), "cetirizine".into());

        map
    }
}
