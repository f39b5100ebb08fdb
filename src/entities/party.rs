// 🏛️ Party Entity - alias table for party names
//
// Rebrands and affiliated parties are folded into one label before grouping:
// "Co-operative Party" → "Labour Party". The table is data, loaded from JSON
// or built in code; nothing here knows about a particular deployment.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const UNKNOWN_PARTY: &str = "Unknown Party";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct PartyAliases {
    /// alias (exact, trimmed) → canonical label
    aliases: BTreeMap<String, String>,
}

impl PartyAliases {
    /// Empty table: every name maps to itself
    pub fn new() -> Self {
        Self::default()
    }

    /// The aliases used for the UK register so far
    pub fn uk_defaults() -> Self {
        let mut table = PartyAliases::new();
        table.add_alias("Co-operative Party", "Labour Party");
        table.add_alias("Plaid Cymru - The Party of Wales", "Plaid Cymru");
        table.add_alias("Scottish National Party (SNP)", "Scottish National Party");
        table.add_alias("Conservative and Unionist Party", "Conservative");
        table
    }

    /// Load a JSON object of `{"alias": "canonical"}` pairs
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::InvalidConfig(format!("party alias file {}: {}", path.display(), e))
        })
    }

    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        let alias = alias.trim();
        let canonical = canonical.trim();
        if alias.is_empty() || canonical.is_empty() || alias == canonical {
            return;
        }
        self.aliases.insert(alias.to_string(), canonical.to_string());
    }

    /// Canonical label for a raw party name (exact match after trimming).
    pub fn canonicalize(&self, party_name: &str) -> String {
        let name = party_name.trim();
        if name.is_empty() {
            return UNKNOWN_PARTY.to_string();
        }
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// Every deserialized table goes through add_alias
impl From<BTreeMap<String, String>> for PartyAliases {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let mut table = PartyAliases::new();
        for (alias, canonical) in &raw {
            table.add_alias(alias, canonical);
        }
        table
    }
}

impl From<PartyAliases> for BTreeMap<String, String> {
    fn from(table: PartyAliases) -> Self {
        table.aliases
    }
}
