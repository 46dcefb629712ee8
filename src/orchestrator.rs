//! Chunk orchestrator
//!
//! Drives candidate chunks one at a time through the [`AdaptiveFetcher`],
//! persists every leaf that carried a payload, and accumulates the run's
//! statistics. Per-chunk failures are recorded and never abort the run.

use crate::adaptive_fetcher::AdaptiveFetcher;
use crate::config::{AppConfig, ArchiveConfig};
use crate::error::Result;
use crate::log_source::{AmplifyLogSource, LogSource};
use crate::metrics::FetchMetrics;
use crate::models::{ArtifactRef, ChunkFetch, ChunkResult, FetchOutcome, LeafStatus, TimeRange};
use crate::range_generator::RangeGenerator;
use crate::report::RunReport;
use crate::storage::{LogStore, StorageBackend};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Counters and per-leaf records for one application run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub app_name: String,
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub empty_chunks: usize,
    pub failed_chunks: usize,
    pub upload_failures: usize,
    /// Leaf ranges that could not be fetched
    pub failed_ranges: Vec<TimeRange>,
    /// One record per leaf range, in processing order
    pub results: Vec<ChunkResult>,
}

impl RunStatistics {
    pub fn new(app_name: impl Into<String>) -> Self {
        RunStatistics {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Artifacts stored during the run
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.results.iter().filter_map(|r| r.artifact.as_ref())
    }

    /// Whether at least one artifact was stored
    pub fn files_produced(&self) -> bool {
        self.artifacts().next().is_some()
    }

    /// Total payload bytes fetched
    pub fn bytes_fetched(&self) -> u64 {
        self.results.iter().map(|r| r.bytes).sum()
    }
}

/// Sequential driver for one application's chunks
pub struct ChunkOrchestrator<S, T> {
    fetcher: AdaptiveFetcher<S>,
    store: T,
    app_name: String,
    chunk_delay: Duration,
}

impl<S: LogSource, T: LogStore> ChunkOrchestrator<S, T> {
    /// Create a new ChunkOrchestrator
    ///
    /// # Arguments
    /// * `fetcher` - Fetcher bound to the application's log source
    /// * `store` - Storage collaborator for successful payloads
    /// * `app_name` - Name recorded in the statistics
    /// * `chunk_delay` - Pause between consecutive top-level chunks
    pub fn new(
        fetcher: AdaptiveFetcher<S>,
        store: T,
        app_name: impl Into<String>,
        chunk_delay: Duration,
    ) -> Self {
        ChunkOrchestrator {
            fetcher,
            store,
            app_name: app_name.into(),
            chunk_delay,
        }
    }

    pub fn fetcher(&self) -> &AdaptiveFetcher<S> {
        &self.fetcher
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Archive every chunk between two calendar dates
    ///
    /// Fails only when `chunk_days` is zero; every other problem ends up in
    /// the returned statistics.
    pub async fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        chunk_days: u32,
    ) -> Result<RunStatistics> {
        let generator = RangeGenerator::new(chunk_days)?;
        let chunks = generator.generate(start, end);

        info!(
            "Processing {}: {} chunks from {} to {}",
            self.app_name,
            chunks.len(),
            start,
            end
        );

        Ok(self.run_ranges(chunks).await)
    }

    /// Archive an explicit list of chunks, in order
    pub async fn run_ranges(&self, chunks: Vec<TimeRange>) -> RunStatistics {
        let mut stats = RunStatistics::new(self.app_name.clone());
        stats.total_chunks = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                sleep(self.chunk_delay).await;
            }

            info!(
                "Processing chunk {}/{} for {}",
                i + 1,
                stats.total_chunks,
                self.app_name
            );

            let fetch = self.fetcher.fetch(chunk).await;
            self.record_chunk(&mut stats, fetch).await;
        }

        info!(
            "Completed {}: {} successful ({} empty), {} failed, {} upload failures",
            self.app_name,
            stats.successful_chunks,
            stats.empty_chunks,
            stats.failed_chunks,
            stats.upload_failures
        );

        stats
    }

    async fn record_chunk(&self, stats: &mut RunStatistics, fetch: ChunkFetch) {
        let succeeded = fetch.succeeded();
        let all_empty = fetch.all_empty();
        let chunk = fetch.chunk;

        for leaf in fetch.leaves {
            let range = leaf.range;
            let result = match leaf.outcome {
                FetchOutcome::Success(payload) => {
                    let bytes = payload.len() as u64;
                    match self.persist(&payload, range).await {
                        Ok(artifact) => ChunkResult {
                            range,
                            status: LeafStatus::Success,
                            bytes,
                            artifact: Some(artifact),
                            upload_error: None,
                            failure: None,
                        },
                        Err(e) => {
                            stats.upload_failures += 1;
                            ChunkResult {
                                range,
                                status: LeafStatus::Success,
                                bytes,
                                artifact: None,
                                upload_error: Some(e.to_string()),
                                failure: None,
                            }
                        }
                    }
                }
                FetchOutcome::Empty => {
                    info!("Logs are empty for {}, skipping storage", range);
                    ChunkResult {
                        range,
                        status: LeafStatus::Empty,
                        bytes: 0,
                        artifact: None,
                        upload_error: None,
                        failure: None,
                    }
                }
                FetchOutcome::TerminalFailure(reason) => {
                    stats.failed_ranges.push(range);
                    Self::failed(range, reason)
                }
                // The fetcher resolves these before returning a leaf.
                FetchOutcome::NeedsSplit => {
                    stats.failed_ranges.push(range);
                    Self::failed(range, "unresolved split signal".to_string())
                }
                FetchOutcome::TransientFailure(e) => {
                    stats.failed_ranges.push(range);
                    Self::failed(range, e.to_string())
                }
            };
            stats.results.push(result);
        }

        if succeeded {
            stats.successful_chunks += 1;
            if all_empty {
                stats.empty_chunks += 1;
            }
        } else {
            warn!("Chunk {} failed for {}", chunk, self.app_name);
            stats.failed_chunks += 1;
        }
    }

    async fn persist(&self, payload: &bytes::Bytes, range: TimeRange) -> Result<ArtifactRef> {
        let started = Instant::now();
        let result = self.store.persist(payload, range.end).await;
        self.fetcher
            .metrics()
            .record_storage(result.is_ok(), started.elapsed());

        if let Err(e) = &result {
            error!("Failed to store logs for {}: {}", range, e);
        }
        result
    }

    fn failed(range: TimeRange, reason: String) -> ChunkResult {
        ChunkResult {
            range,
            status: LeafStatus::Failed,
            bytes: 0,
            artifact: None,
            upload_error: None,
            failure: Some(reason),
        }
    }
}

/// Archive the given applications one after another into a single report
///
/// Each application gets its own log source and storage backend built from
/// `config`; all of them record into one metrics collector.
pub async fn run_applications(
    config: &ArchiveConfig,
    apps: &[AppConfig],
    start: NaiveDate,
    end: NaiveDate,
    chunk_days: u32,
) -> Result<RunReport> {
    let metrics = Arc::new(FetchMetrics::new());
    let mut runs = Vec::with_capacity(apps.len());

    for app in apps {
        app.validate()?;

        let source = AmplifyLogSource::with_timeout(
            config.api_endpoint_for(app),
            app.clone(),
            config.fetch.request_timeout(),
        )?;
        let store = StorageBackend::from_config(&config.storage, &app.app_name)?;
        info!("Storing logs for {} in {}", app.app_name, store.describe());

        let fetcher = AdaptiveFetcher::with_metrics(source, config.fetch.policy(), metrics.clone());
        let orchestrator =
            ChunkOrchestrator::new(fetcher, store, app.app_name.clone(), config.fetch.chunk_delay());

        runs.push(orchestrator.run(start, end, chunk_days).await?);
    }

    Ok(RunReport::new(start, end, chunk_days, runs, metrics.snapshot()))
}
