//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `source` - authenticated, paginated occurrence fetch from the tracking API
//! - `store` - persisted shipment history (JSONL, read-all/write-all)
//! - `watermark` - last-processed-timestamp persistence
//! - `remap` - carrier name remapping table
//! - `publish` - snapshot sink trait and the CSV file sink

pub mod publish;
pub mod remap;
pub mod source;
pub mod store;
pub mod watermark;

// Re-export commonly used types
pub use publish::{to_rows, CsvSink, Publish, PublishRow};
pub use remap::CarrierRemap;
pub use source::{OccurrenceClient, SourceError};
pub use store::ShipmentStore;
pub use watermark::Watermark;
