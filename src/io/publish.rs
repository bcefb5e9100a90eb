//! Published snapshot sink
//!
//! The merged table is published as an ordered list of fixed-column rows.
//! Sinks clear and fully overwrite their target; the table is a snapshot,
//! never an append log. The shipped sink writes a CSV file; spreadsheet
//! uploaders implement the same trait outside this crate.

use crate::domain::types::{InvoiceKey, ShipmentRecord};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One published row, columns in sink order.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRow {
    pub invoice_number: String,
    pub series: String,
    pub invoice_key: String,
    pub carrier: String,
    pub status: String,
    pub last_occurrence: String,
}

/// Flatten the merged table into rows sorted by invoice key, so identical
/// state publishes identical output.
pub fn to_rows(records: &HashMap<InvoiceKey, ShipmentRecord>) -> Vec<PublishRow> {
    let mut keys: Vec<&InvoiceKey> = records.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let r = &records[key];
            PublishRow {
                invoice_number: r.invoice_number.clone(),
                series: r.series.clone(),
                invoice_key: r.invoice_key.0.clone(),
                carrier: r.carrier.clone(),
                status: r.status.as_str().to_string(),
                last_occurrence: r
                    .last_occurrence
                    .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

#[async_trait]
pub trait Publish: Send + Sync {
    /// Replace the sink's entire contents with `rows`.
    async fn publish(&self, rows: &[PublishRow]) -> anyhow::Result<()>;
}

/// CSV file sink. Truncates and rewrites the target on every publish.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Publish for CsvSink {
    async fn publish(&self, rows: &[PublishRow]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let mut out = String::with_capacity(rows.len() * 96 + 64);
        out.push_str("invoice_number,series,invoice_key,carrier,status,last_occurrence\n");
        for row in rows {
            let fields = [
                &row.invoice_number,
                &row.series,
                &row.invoice_key,
                &row.carrier,
                &row.status,
                &row.last_occurrence,
            ];
            let line: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &out).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        info!(rows = rows.len(), path = %self.path.display(), "snapshot_published");
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn quote_field(value: &str) -> String {
    let needs_quoting =
        value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r');
    if needs_quoting {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
