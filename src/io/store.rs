//! Shipment store - persisted history in JSONL format
//!
//! One JSON object per line, one line per shipment. The table is small
//! enough to hold in memory, so access is read-all/write-all only; the
//! write goes through a temp file and rename so an interrupted run leaves
//! the previous version intact.

use crate::domain::types::{InvoiceKey, ShipmentRecord};
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ShipmentStore {
    path: PathBuf,
}

impl ShipmentStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load the full table. A missing file is an empty store (first run);
    /// a malformed line is skipped with a warning.
    pub fn load(&self) -> anyhow::Result<HashMap<InvoiceKey, ShipmentRecord>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "store_absent");
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading store {}", self.path.display()))?;

        let mut records = HashMap::new();
        let mut skipped = 0usize;
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ShipmentRecord>(line) {
                Ok(record) => {
                    records.insert(record.invoice_key.clone(), record);
                }
                Err(e) => {
                    skipped += 1;
                    warn!(line = lineno + 1, error = %e, "store_line_skipped");
                }
            }
        }
        info!(shipments = records.len(), skipped, "store_loaded");
        Ok(records)
    }

    /// Write the full table, sorted by invoice key for stable diffs.
    pub fn save(&self, records: &HashMap<InvoiceKey, ShipmentRecord>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let mut keys: Vec<&InvoiceKey> = records.keys().collect();
        keys.sort();

        let tmp = self.path.with_extension("tmp");
        let mut out = Vec::with_capacity(records.len() * 128);
        for key in keys {
            serde_json::to_writer(&mut out, &records[key])?;
            out.write_all(b"\n")?;
        }
        fs::write(&tmp, &out).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        info!(shipments = records.len(), path = %self.path.display(), "store_saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::CanonicalStatus;
    use crate::domain::types::parse_occurrence_ts;
    use tempfile::tempdir;

    fn record(key: &str) -> ShipmentRecord {
        ShipmentRecord {
            invoice_key: InvoiceKey(key.to_string()),
            invoice_number: "42".to_string(),
            series: "1".to_string(),
            carrier: "ACME LOG".to_string(),
            status: CanonicalStatus::Delivered,
            last_occurrence: parse_occurrence_ts("2024-03-01T09:05:00"),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = ShipmentStore::new(dir.path().join("shipments.jsonl"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = ShipmentStore::new(dir.path().join("shipments.jsonl"));

        let table = HashMap::from([
            (InvoiceKey("K1".to_string()), record("K1")),
            (InvoiceKey("K2".to_string()), record("K2")),
        ]);
        store.save(&table).unwrap();
        assert_eq!(store.load().unwrap(), table);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.jsonl");
        let good = serde_json::to_string(&record("K1")).unwrap();
        fs::write(&path, format!("{}\nnot json\n", good)).unwrap();

        let store = ShipmentStore::new(&path);
        let table = store.load().unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&InvoiceKey("K1".to_string())));
    }

    #[test]
    fn save_is_deterministically_ordered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.jsonl");
        let store = ShipmentStore::new(&path);

        let table = HashMap::from([
            (InvoiceKey("K2".to_string()), record("K2")),
            (InvoiceKey("K1".to_string()), record("K1")),
        ]);
        store.save(&table).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        store.save(&table).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);

        let keys: Vec<String> = first
            .lines()
            .map(|l| serde_json::from_str::<ShipmentRecord>(l).unwrap().invoice_key.0)
            .collect();
        assert_eq!(keys, vec!["K1", "K2"]);
    }
}
