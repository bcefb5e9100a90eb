//! Watermark persistence - the boundary between processed and unrequested events
//!
//! A single ISO 8601 timestamp on disk. Read at the start of every run to
//! compute the request window; overwritten only after the whole run
//! succeeds, so a failed run retries the same window instead of skipping
//! events.

use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct Watermark {
    path: PathBuf,
    lookback: Duration,
}

impl Watermark {
    pub fn new<P: AsRef<Path>>(path: P, lookback_days: i64) -> Self {
        Self { path: path.as_ref().to_path_buf(), lookback: Duration::days(lookback_days) }
    }

    /// Compute the request window ending at `now`.
    ///
    /// With a persisted watermark the window starts one second past it;
    /// otherwise it falls back to the configured lookback.
    pub fn current_window(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match self.read() {
            Some(mark) => {
                let start = mark + Duration::seconds(1);
                info!(watermark = %mark.format(TIMESTAMP_FORMAT), "incremental_window");
                (start, now)
            }
            None => {
                let start = now - self.lookback;
                info!(lookback_days = self.lookback.num_days(), "lookback_window");
                (start, now)
            }
        }
    }

    /// Persist `end` as the new watermark. Called only after the full
    /// pipeline succeeded; write goes through a temp file so a crash cannot
    /// leave a half-written value.
    pub fn commit(&self, end: NaiveDateTime) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, end.format(TIMESTAMP_FORMAT).to_string())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("committing {}", self.path.display()))?;
        info!(watermark = %end.format(TIMESTAMP_FORMAT), "watermark_committed");
        Ok(())
    }

    fn read(&self) -> Option<NaiveDateTime> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT) {
            Ok(mark) => Some(mark),
            Err(e) => {
                // A corrupt watermark means re-fetching a superset window,
                // which the idempotent merge absorbs.
                warn!(path = %self.path.display(), error = %e, "watermark_unreadable");
                None
            }
        }
    }
}
