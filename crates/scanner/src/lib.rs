//! # trailscan scanner
//!
//! Paginated ingestion of audit events and the identifier-discovery pipeline
//! around the pure pieces in `trailscan-discovery`.
//!
//! ## Pipeline
//!
//! ```text
//! EventSource (LookupEvents)
//!     │
//!     ├──> PaginationDriver (token following, bounded retry)
//!     │      └─> bounded queue
//!     │
//!     ├──> EventWorker (flatten → normalize → classify)
//!     │      └─> DiscoveryCache, owned by the worker
//!     │
//!     └──> Coordinator (interrupt, drain, summary exactly once)
//!            └─> summary.csv
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trailscan_scanner::{Coordinator, ReplaySource, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> trailscan_scanner::Result<()> {
//!     let config = ScanConfig::default();
//!     let source = ReplaySource::open("events.json".as_ref(), config.page_size, None).await?;
//!     let report = Coordinator::new(Arc::new(source), config)
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     println!("{} identifier paths found", report.discoveries.len());
//!     Ok(())
//! }
//! ```

mod config;
mod coordinator;
mod error;
mod event;
mod pagination;
mod source;
mod summary;
mod worker;

pub use config::{
    RetryPolicy, ScanConfig, DEFAULT_PAGE_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_REGION,
    DEFAULT_SUMMARY_PATH,
};
pub use coordinator::{Coordinator, ScanReport, ScanTrigger, SummaryGate};
pub use error::{Result, ScanError, SourceError};
pub use event::{EventPage, EventResource, PageToken, RawEvent};
pub use pagination::{PaginationDriver, PaginationOutcome, PaginationReport};
pub use source::{EventSource, ReplaySource};
pub use summary::{render_csv, SummaryWriter, SUMMARY_HEADER};
pub use worker::{EventWorker, WorkerReport, WorkerStats};
