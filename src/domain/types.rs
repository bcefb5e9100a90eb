//! Shared types for the status pipeline

use crate::domain::status::CanonicalStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fiscal-document series excluded from every output (symbolic invoices,
/// never physical shipments).
pub const EXCLUDED_SERIES: &str = "3";

/// Newtype wrapper for the NF-e invoice key, the shipment primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceKey(pub String);

impl InvoiceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvoiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One raw occurrence record from the tracking API. Ephemeral: consumed once
/// per run and never persisted verbatim.
#[derive(Debug, Clone)]
pub struct OccurrenceEvent {
    /// Missing on some malformed records; such events are dropped.
    pub invoice_key: Option<String>,
    pub invoice_number: String,
    pub series: String,
    pub carrier: String,
    pub code: String,
    pub occurred_at: Option<NaiveDateTime>,
}

/// The persisted unit of state: one row per shipment, keyed by invoice key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub invoice_key: InvoiceKey,
    pub invoice_number: String,
    pub series: String,
    pub carrier: String,
    pub status: CanonicalStatus,
    /// Timestamp of the occurrence that produced the current status.
    #[serde(default)]
    pub last_occurrence: Option<NaiveDateTime>,
}

/// Parse an occurrence timestamp as reported by the API.
///
/// Accepts ISO 8601 with either `T` or space separator, with or without
/// fractional seconds, tolerating a trailing `Z`. Anything else yields `None`
/// and compares as "earliest possible" downstream.
pub fn parse_occurrence_ts(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.trim().trim_end_matches('Z').replace('T', " ");
    if cleaned.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(ts);
        }
    }
    None
}
