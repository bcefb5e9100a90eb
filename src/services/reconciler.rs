//! Reconciliation - reduce a stream of occurrence events to one record per shipment
//!
//! Events arrive across many pages and page order is not guaranteed. The
//! reduction is commutative and associative over the status priority order,
//! so concurrently fetched batches can be folded in any order.

use crate::domain::status::resolve;
use crate::domain::types::{InvoiceKey, OccurrenceEvent, ShipmentRecord, EXCLUDED_SERIES};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Decide whether `challenger` should replace `incumbent` for the same key.
///
/// Strictly higher priority always wins. On equal priority the challenger
/// wins only with a strictly later timestamp; an undated incumbent loses to
/// any dated challenger, and an undated challenger never displaces anything.
pub fn supersedes(challenger: &ShipmentRecord, incumbent: &ShipmentRecord) -> bool {
    if challenger.status.outranks(incumbent.status) {
        return true;
    }
    if incumbent.status.outranks(challenger.status) {
        return false;
    }
    match (challenger.last_occurrence, incumbent.last_occurrence) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Reduce an event sequence to the highest-priority, most-recent record per
/// invoice key.
///
/// Events with a missing key, the excluded series, or an unresolvable code
/// are dropped; keys with only dropped events are absent from the result.
pub fn reconcile(
    events: impl IntoIterator<Item = OccurrenceEvent>,
) -> HashMap<InvoiceKey, ShipmentRecord> {
    let mut resolved: HashMap<InvoiceKey, ShipmentRecord> = HashMap::new();
    let mut seen = 0usize;
    let mut dropped = 0usize;

    for event in events {
        seen += 1;
        let Some(record) = to_record(event) else {
            dropped += 1;
            continue;
        };
        match resolved.entry(record.invoice_key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if supersedes(&record, slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }

    debug!(events = seen, dropped, shipments = resolved.len(), "reconcile_reduced");
    resolved
}

/// Classify one raw event, returning `None` when it must be dropped.
fn to_record(event: OccurrenceEvent) -> Option<ShipmentRecord> {
    let key = event.invoice_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
    if event.series.trim() == EXCLUDED_SERIES {
        return None;
    }
    let status = resolve(&event.code)?;
    Some(ShipmentRecord {
        invoice_key: InvoiceKey(key.to_string()),
        invoice_number: event.invoice_number,
        series: event.series,
        carrier: event.carrier,
        status,
        last_occurrence: event.occurred_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::CanonicalStatus;
    use crate::domain::types::parse_occurrence_ts;

    // invoice_number carries the code so same-priority winners are
    // distinguishable in assertions
    fn event(key: &str, code: &str, ts: &str) -> OccurrenceEvent {
        OccurrenceEvent {
            invoice_key: if key.is_empty() { None } else { Some(key.to_string()) },
            invoice_number: code.to_string(),
            series: "1".to_string(),
            carrier: "ACME LOG".to_string(),
            code: code.to_string(),
            occurred_at: parse_occurrence_ts(ts),
        }
    }

    #[test]
    fn higher_priority_later_event_replaces() {
        // Scenario A: contact confirmation at 09:00, delivery at 09:05
        let events = vec![
            event("K1", "7", "2024-03-01T09:00:00"),
            event("K1", "1", "2024-03-01T09:05:00"),
        ];
        let out = reconcile(events);
        let record = &out[&InvoiceKey("K1".to_string())];
        assert_eq!(record.status, CanonicalStatus::Delivered);
        assert_eq!(record.last_occurrence, parse_occurrence_ts("2024-03-01T09:05:00"));
    }

    #[test]
    fn lower_priority_never_downgrades_even_when_later() {
        // Scenario B: cancellation arrives an hour after the delivery
        let events = vec![
            event("K2", "1", "2024-03-01T10:00:00"),
            event("K2", "25", "2024-03-01T11:00:00"),
        ];
        let out = reconcile(events);
        assert_eq!(out[&InvoiceKey("K2".to_string())].status, CanonicalStatus::Delivered);
    }

    #[test]
    fn reduction_is_order_independent() {
        let forward = vec![
            event("K1", "7", "2024-03-01T09:00:00"),
            event("K1", "25", "2024-03-01T09:10:00"),
            event("K1", "1", "2024-03-01T09:05:00"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        let a = reconcile(forward);
        let b = reconcile(reversed);
        assert_eq!(a, b);
        assert_eq!(a[&InvoiceKey("K1".to_string())].status, CanonicalStatus::Delivered);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let events = vec![
            event("K1", "7", "2024-03-01T09:00:00"),
            event("K2", "200", "2024-03-01T09:30:00"),
            event("K1", "1", "2024-03-01T09:05:00"),
        ];
        let first = reconcile(events.clone());
        let second = reconcile(events);
        assert_eq!(first, second);
    }

    #[test]
    fn equal_priority_tie_breaks_on_recency() {
        let events = vec![
            event("K1", "1", "2024-03-01T10:00:00"),
            event("K1", "2", "2024-03-01T12:00:00"),
            event("K1", "37", "2024-03-01T11:00:00"),
        ];
        let out = reconcile(events);
        let record = &out[&InvoiceKey("K1".to_string())];
        assert_eq!(record.last_occurrence, parse_occurrence_ts("2024-03-01T12:00:00"));
        assert_eq!(record.invoice_number, "2");
    }

    #[test]
    fn undated_candidate_loses_to_dated_same_priority() {
        let events = vec![event("K1", "1", ""), event("K1", "2", "2024-03-01T12:00:00")];
        let out = reconcile(events);
        assert_eq!(
            out[&InvoiceKey("K1".to_string())].last_occurrence,
            parse_occurrence_ts("2024-03-01T12:00:00")
        );
    }

    #[test]
    fn undated_challenger_never_replaces_dated() {
        let events = vec![event("K1", "1", "2024-03-01T12:00:00"), event("K1", "2", "")];
        let out = reconcile(events);
        assert_eq!(
            out[&InvoiceKey("K1".to_string())].last_occurrence,
            parse_occurrence_ts("2024-03-01T12:00:00")
        );
    }

    #[test]
    fn missing_key_and_excluded_series_are_dropped() {
        let mut excluded = event("K9", "1", "2024-03-01T08:00:00");
        excluded.series = "3".to_string();
        let events = vec![event("", "1", "2024-03-01T08:00:00"), excluded];
        assert!(reconcile(events).is_empty());
    }

    #[test]
    fn unmapped_code_alongside_valid_event_changes_nothing() {
        // Scenario D
        let valid_only = reconcile(vec![event("K5", "200", "2024-03-01T08:00:00")]);
        let with_noise = reconcile(vec![
            event("K5", "999999", "2024-03-01T09:00:00"),
            event("K5", "200", "2024-03-01T08:00:00"),
        ]);
        assert_eq!(valid_only, with_noise);
    }

    #[test]
    fn keys_with_only_dropped_events_are_absent() {
        let out = reconcile(vec![
            event("K6", "999999", "2024-03-01T08:00:00"),
            event("K7", "1", "2024-03-01T08:00:00"),
        ]);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(&InvoiceKey("K7".to_string())));
    }
}
