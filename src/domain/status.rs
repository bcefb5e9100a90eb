//! Canonical shipment statuses and occurrence-code resolution
//!
//! The tracking API reports numeric occurrence codes; only a fixed subset maps
//! to a canonical status. The statuses form a total priority order: within one
//! reduction a shipment known `Delivered` can never be downgraded by a
//! lower-priority occurrence, regardless of arrival order.

use serde::{Deserialize, Serialize};

/// Canonical shipment status, listed from highest to lowest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    #[serde(rename = "DELIVERED")]
    Delivered,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "DATA_CONFIRMED")]
    DataConfirmed,
    #[serde(rename = "CONTACT_CONFIRMED")]
    ContactConfirmed,
}

impl CanonicalStatus {
    /// Priority rank: lower value wins.
    pub fn rank(self) -> u8 {
        match self {
            CanonicalStatus::Delivered => 0,
            CanonicalStatus::Cancelled => 1,
            CanonicalStatus::DataConfirmed => 2,
            CanonicalStatus::ContactConfirmed => 3,
        }
    }

    /// True when `self` is strictly higher priority than `other`.
    pub fn outranks(self, other: CanonicalStatus) -> bool {
        self.rank() < other.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Delivered => "DELIVERED",
            CanonicalStatus::Cancelled => "CANCELLED",
            CanonicalStatus::DataConfirmed => "DATA_CONFIRMED",
            CanonicalStatus::ContactConfirmed => "CONTACT_CONFIRMED",
        }
    }
}

impl std::fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occurrence codes recognized by the resolver, grouped by status.
const DELIVERED_CODES: &[&str] = &["1", "2", "37", "999"];
const CANCELLED_CODES: &[&str] = &["25", "102", "203", "303", "325", "327"];
const DATA_CONFIRMED_CODES: &[&str] = &["200", "201", "202"];
const CONTACT_CONFIRMED_CODES: &[&str] = &["7", "206"];

/// Map a raw occurrence code to its canonical status.
///
/// Total over all inputs; unrecognized codes yield `None` and the caller
/// drops the event.
pub fn resolve(code: &str) -> Option<CanonicalStatus> {
    let code = code.trim();
    if DELIVERED_CODES.contains(&code) {
        Some(CanonicalStatus::Delivered)
    } else if CANCELLED_CODES.contains(&code) {
        Some(CanonicalStatus::Cancelled)
    } else if DATA_CONFIRMED_CODES.contains(&code) {
        Some(CanonicalStatus::DataConfirmed)
    } else if CONTACT_CONFIRMED_CODES.contains(&code) {
        Some(CanonicalStatus::ContactConfirmed)
    } else {
        None
    }
}

/// Comma-joined list of every recognized code, sent as the API-side
/// occurrence filter so the source only returns mappable events.
pub fn code_filter() -> String {
    DELIVERED_CODES
        .iter()
        .chain(CANCELLED_CODES)
        .chain(DATA_CONFIRMED_CODES)
        .chain(CONTACT_CONFIRMED_CODES)
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}
