//! Services - business logic
//!
//! This module contains the core business logic:
//! - `reconciler` - reduce occurrence events to one record per shipment
//! - `merger` - fold the current run into the persisted history
//! - `pipeline` - one full run, fetch through publish

pub mod merger;
pub mod pipeline;
pub mod reconciler;

// Re-export commonly used types
pub use merger::merge;
pub use pipeline::{Pipeline, RunSummary};
pub use reconciler::{reconcile, supersedes};
