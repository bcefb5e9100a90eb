//! Pipeline orchestration
//!
//! One run, sequential: window → fetch → reconcile → remap → merge → store
//! write → publish → watermark commit. Every persistent write happens after
//! all in-memory work succeeded, and the watermark is the last write of all,
//! so an interrupted run leaves state exactly as it was and the next run
//! re-requests the same window. Re-processing is safe because both the
//! reduction and the merge are idempotent.

use crate::infra::config::Config;
use crate::io::publish::{to_rows, Publish};
use crate::io::remap::CarrierRemap;
use crate::io::source::OccurrenceClient;
use crate::io::store::ShipmentStore;
use crate::io::watermark::Watermark;
use crate::services::merger::merge;
use crate::services::reconciler::reconcile;
use anyhow::Context;
use chrono::Local;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Counters reported after a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub events_fetched: usize,
    pub shipments_in_window: usize,
    pub shipments_total: usize,
    pub unmapped_carriers: usize,
}

pub struct Pipeline {
    source: Arc<OccurrenceClient>,
    store: ShipmentStore,
    watermark: Watermark,
    remap: CarrierRemap,
    /// None when running with --no-publish
    sink: Option<Box<dyn Publish>>,
    publish_file: String,
}

impl Pipeline {
    pub fn new(config: &Config, sink: Option<Box<dyn Publish>>) -> anyhow::Result<Self> {
        Ok(Self {
            source: Arc::new(OccurrenceClient::new(config)?),
            store: ShipmentStore::new(config.store_file()),
            watermark: Watermark::new(config.watermark_file(), config.lookback_days()),
            remap: CarrierRemap::from_file(config.remap_file())?,
            sink,
            publish_file: config.publish_file().to_string(),
        })
    }

    pub async fn run(&mut self) -> anyhow::Result<RunSummary> {
        let run_start = Instant::now();
        let now = Local::now().naive_local();
        let (window_start, window_end) = self.watermark.current_window(now);
        info!(start = %window_start, end = %window_end, "window_selected");

        let events = Arc::clone(&self.source).fetch_window(window_start, window_end).await?;
        let events_fetched = events.len();

        let mut current = reconcile(events);
        let shipments_in_window = current.len();
        for record in current.values_mut() {
            record.carrier = self.remap.remap(&record.carrier);
        }
        info!(events = events_fetched, shipments = shipments_in_window, "window_reconciled");

        let persisted = self.store.load()?;
        let merged = merge(persisted, current);

        // First persistent write of the run
        self.store.save(&merged).context("writing shipment store")?;

        if let Some(sink) = &self.sink {
            let rows = to_rows(&merged);
            sink.publish(&rows).await.context("publishing snapshot")?;
        } else {
            info!("publish_skipped");
        }

        let unmapped = self.remap.unmapped();
        if !unmapped.is_empty() {
            warn!(count = unmapped.len(), carriers = ?unmapped, "carriers_unmapped");
            self.write_unmapped_report(&unmapped);
        }

        self.watermark.commit(window_end).context("committing watermark")?;

        let summary = RunSummary {
            events_fetched,
            shipments_in_window,
            shipments_total: merged.len(),
            unmapped_carriers: unmapped.len(),
        };
        info!(
            shipments_total = summary.shipments_total,
            elapsed_ms = run_start.elapsed().as_millis() as u64,
            "run_complete"
        );
        Ok(summary)
    }

    /// Companion file next to the sink listing carriers with no remap entry.
    /// Written only when a sink is active; best effort, failure never fails
    /// the run.
    fn write_unmapped_report(&self, unmapped: &[String]) {
        if self.sink.is_none() {
            return;
        }
        let path = format!("{}.unmapped.txt", self.publish_file);
        let mut body = unmapped.join("\n");
        body.push('\n');
        if let Err(e) = fs::write(&path, body) {
            warn!(path = %path, error = %e, "unmapped_report_write_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::publish::CsvSink;
    use std::io::Write;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> Config {
        let remap_path = dir.join("carriers.toml");
        std::fs::write(&remap_path, "[carriers]\n").unwrap();

        let config_path = dir.join("dev.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            "[api]\nemail = \"a@b.test\"\npassword = \"p\"\n\n[remap]\nfile = {:?}\n\n[publish]\nfile = {:?}",
            remap_path.display().to_string(),
            dir.join("status.csv").display().to_string(),
        )
        .unwrap();
        Config::from_file(&config_path).unwrap()
    }

    #[test]
    fn unmapped_report_is_skipped_without_a_sink() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let pipeline = Pipeline::new(&config, None).unwrap();
        pipeline.write_unmapped_report(&["Rapid Freight".to_string()]);
        assert!(!dir.path().join("status.csv.unmapped.txt").exists());
    }

    #[test]
    fn unmapped_report_lands_next_to_the_sink() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let sink = Box::new(CsvSink::new(config.publish_file()));
        let pipeline = Pipeline::new(&config, Some(sink)).unwrap();
        pipeline.write_unmapped_report(&["Rapid Freight".to_string(), "Slow Freight".to_string()]);

        let report = dir.path().join("status.csv.unmapped.txt");
        let body = std::fs::read_to_string(&report).unwrap();
        assert_eq!(body, "Rapid Freight\nSlow Freight\n");
    }
}
