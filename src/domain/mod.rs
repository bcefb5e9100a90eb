//! Domain models - canonical statuses and shipment records
//!
//! This module contains the canonical data types used throughout the system:
//! - `CanonicalStatus` - the fixed, totally ordered set of shipment outcomes
//! - `OccurrenceEvent` - one raw event from the tracking API
//! - `ShipmentRecord` - the persisted one-row-per-shipment state
//! - `InvoiceKey` - the shipment primary key

pub mod status;
pub mod types;

// Re-export commonly used types
pub use status::{resolve, CanonicalStatus};
pub use types::{InvoiceKey, OccurrenceEvent, ShipmentRecord, EXCLUDED_SERIES};
