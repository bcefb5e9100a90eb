//! Carrier name remapping
//!
//! Carrier names come back from the API in whatever form the carrier
//! registered them; the remap table normalizes them to the names downstream
//! reports expect. The table is a TOML file:
//!
//! ```toml
//! [carriers]
//! "ACME LOGISTICA LTDA" = "ACME"
//! ```
//!
//! Lookup keys are trimmed and uppercased. Names without an entry pass
//! through unchanged and are collected for the end-of-run report.

use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RemapFile {
    #[serde(default)]
    carriers: HashMap<String, String>,
}

pub struct CarrierRemap {
    mapping: HashMap<String, String>,
    unmapped: BTreeSet<String>,
}

impl CarrierRemap {
    /// Load the remap table. A missing or unparseable file is fatal; the
    /// caller treats this as a startup configuration error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading carrier remap table {}", path.display()))?;
        let file: RemapFile = toml::from_str(&content)
            .with_context(|| format!("parsing carrier remap table {}", path.display()))?;

        let mapping: HashMap<String, String> = file
            .carriers
            .into_iter()
            .map(|(original, replacement)| (normalize(&original), replacement.trim().to_string()))
            .collect();
        info!(entries = mapping.len(), path = %path.display(), "remap_table_loaded");
        Ok(Self { mapping, unmapped: BTreeSet::new() })
    }

    /// Build from an in-memory table (tests, embedded defaults).
    pub fn from_mapping(mapping: HashMap<String, String>) -> Self {
        let mapping = mapping
            .into_iter()
            .map(|(original, replacement)| (normalize(&original), replacement.trim().to_string()))
            .collect();
        Self { mapping, unmapped: BTreeSet::new() }
    }

    /// Remap a carrier name, defaulting to identity and recording names
    /// with no entry.
    pub fn remap(&mut self, name: &str) -> String {
        match self.mapping.get(&normalize(name)) {
            Some(replacement) => replacement.clone(),
            None => {
                if !name.trim().is_empty() {
                    self.unmapped.insert(name.trim().to_string());
                }
                name.to_string()
            }
        }
    }

    /// Names seen this run with no mapping entry, sorted.
    pub fn unmapped(&self) -> Vec<String> {
        self.unmapped.iter().cloned().collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}
