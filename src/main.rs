//! tracksync - incremental delivery-status pipeline
//!
//! Fetches delivery-occurrence events from the tracking API for an
//! incremental time window, reduces them to one canonical-status record per
//! shipment, merges the result into a persistent history, and publishes the
//! full snapshot to a CSV sink.
//!
//! Module structure:
//! - `domain/` - canonical statuses, occurrence events, shipment records
//! - `io/` - tracking API client, store, watermark, remap table, sink
//! - `services/` - reconciliation, historical merge, run orchestration
//! - `infra/` - configuration

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use tracksync::infra::Config;
use tracksync::io::CsvSink;
use tracksync::services::Pipeline;

/// Incremental delivery-status pipeline
#[derive(Parser, Debug)]
#[command(name = "tracksync", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml", env = "TRACKSYNC_CONFIG")]
    config: String,

    /// Override the first-run lookback window, in days
    #[arg(long)]
    lookback: Option<i64>,

    /// Fetch, merge, and persist, but skip the publish step
    #[arg(long)]
    no_publish: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, level via RUST_LOG (default: info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(git_hash = env!("GIT_HASH"), "tracksync starting");

    let mut config = Config::from_file(&args.config)?;
    if let Some(days) = args.lookback {
        config.set_lookback_days(days);
    }
    config.validate()?;

    info!(
        config_file = %config.config_file(),
        base_url = %config.api_base_url(),
        page_size = %config.api_page_size(),
        lookback_days = %config.lookback_days(),
        store_file = %config.store_file(),
        publish_file = %config.publish_file(),
        no_publish = %args.no_publish,
        "config_loaded"
    );

    let sink = if args.no_publish {
        None
    } else {
        Some(Box::new(CsvSink::new(config.publish_file())) as Box<dyn tracksync::io::Publish>)
    };

    let mut pipeline = Pipeline::new(&config, sink)?;
    match pipeline.run().await {
        Ok(summary) => {
            info!(
                events = summary.events_fetched,
                window_shipments = summary.shipments_in_window,
                total_shipments = summary.shipments_total,
                unmapped_carriers = summary.unmapped_carriers,
                "tracksync finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "run_failed");
            Err(e)
        }
    }
}
