//! Historical merge - fold the current run's records into the persisted store
//!
//! The store is append/update only: shipments observed by earlier runs are
//! never deleted, even when absent from the current window. An incoming
//! record replaces the persisted one only when it would also win the
//! within-run comparison, so a late-arriving low-priority occurrence in a
//! later window cannot downgrade a shipment already known delivered.

use crate::domain::types::{InvoiceKey, ShipmentRecord};
use crate::services::reconciler::supersedes;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Merge `incoming` into `persisted` and return the combined table.
pub fn merge(
    persisted: HashMap<InvoiceKey, ShipmentRecord>,
    incoming: HashMap<InvoiceKey, ShipmentRecord>,
) -> HashMap<InvoiceKey, ShipmentRecord> {
    let mut merged = persisted;
    let mut inserted = 0usize;
    let mut updated = 0usize;
    let mut retained = 0usize;

    for (key, record) in incoming {
        match merged.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                if supersedes(&record, slot.get()) {
                    slot.insert(record);
                    updated += 1;
                } else {
                    retained += 1;
                }
            }
        }
    }

    debug!(inserted, updated, retained, total = merged.len(), "store_merged");
    merged
}
