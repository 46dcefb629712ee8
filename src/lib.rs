//! Amplify Access Log Archiver
//!
//! Retrieves hosting access logs for Amplify applications over long time
//! periods and persists them as dated artifacts.
//!
//! # Overview
//!
//! The log API refuses to return logs for a window that holds "too many
//! records", without telling the caller what the limit is. The archiver
//! therefore splits the requested interval into fixed-size chunks and, for
//! each chunk the API refuses, bisects it recursively down to a bounded
//! depth. Transient failures (throttling, timeouts, 5xx) are retried on the
//! same window with exponential backoff and never cause a split.
//!
//! # Architecture
//!
//! - [`RangeGenerator`]: Splits a calendar interval into candidate chunks
//! - [`AdaptiveFetcher`]: Fetches one chunk, splitting and retrying as needed
//! - [`ChunkOrchestrator`]: Drives chunks in order and persists results
//! - [`LogSource`]: Remote primitive, implemented by [`AmplifyLogSource`]
//! - [`LogStore`]: Storage collaborator, implemented by [`FileLogStore`]
//!   and [`ObjectStore`]
//! - [`FetchMetrics`]: Counters shared by everything above
//! - [`RunReport`]: JSON summary written at the end of a run
//!
//! # Configuration
//!
//! ```yaml
//! applications:
//!   - app_id: d3f9qt4fnd0v
//!     domain_name: booking.example.com
//!     app_name: booking_example_com
//!     region: eu-central-1
//! chunk_days: 14
//! fetch:
//!   max_depth: 3
//!   max_attempts: 3
//! storage:
//!   backend: file
//!   output_dir: amplify_logs
//! ```
//!
//! See [`ArchiveConfig`] for every option.
//!
//! # Example
//!
//! ```rust,no_run
//! use amplify_logs::{
//!     AdaptiveFetcher, AmplifyLogSource, ArchiveConfig, ChunkOrchestrator, StorageBackend,
//! };
//! use chrono::NaiveDate;
//!
//! # async fn run() -> amplify_logs::Result<()> {
//! let config = ArchiveConfig::from_file("amplify_logs.yaml")?;
//! let app = config.applications[0].clone();
//!
//! let source = AmplifyLogSource::new(config.api_endpoint_for(&app), app.clone())?;
//! let store = StorageBackend::from_config(&config.storage, &app.app_name)?;
//! let fetcher = AdaptiveFetcher::new(source, config.fetch.policy());
//! let orchestrator =
//!     ChunkOrchestrator::new(fetcher, store, app.app_name.clone(), config.fetch.chunk_delay());
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let stats = orchestrator.run(start, end, config.chunk_days).await?;
//! println!("{} chunks, {} failed", stats.total_chunks, stats.failed_chunks);
//! # Ok(())
//! # }
//! ```

pub mod adaptive_fetcher;
pub mod config;
pub mod error;
pub mod log_source;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod range_generator;
pub mod report;
pub mod storage;

// Re-export commonly used types
pub use adaptive_fetcher::{AdaptiveFetcher, FetchPolicy, RetryPolicy};
pub use config::{AppConfig, ArchiveConfig, FetchConfig, StorageConfig};
pub use error::{ArchiveError, Result};
pub use log_source::{AmplifyLogSource, LogResponse, LogSource};
pub use metrics::{FetchMetrics, FetchMetricsSnapshot};
pub use models::{
    ArtifactRef, ChunkFetch, ChunkResult, FetchOutcome, LeafResult, LeafStatus, TimeRange,
};
pub use orchestrator::{run_applications, ChunkOrchestrator, RunStatistics};
pub use range_generator::{retention_window, RangeGenerator};
pub use report::{RunReport, RunTotals};
pub use storage::{FileLogStore, KeyLayout, LogStore, ObjectStore, StorageBackend};
