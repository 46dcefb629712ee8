//! Adaptive fetcher that bisects oversized windows and retries transient failures
//!
//! The log API refuses windows holding "too many records" without saying
//! what the limit is. The fetcher answers that refusal by halving the window
//! and fetching each half, down to a bounded depth. Transient failures are
//! retried on the same window with exponential backoff and never cause a
//! split.

use crate::error::ArchiveError;
use crate::log_source::{LogResponse, LogSource};
use crate::metrics::FetchMetrics;
use crate::models::{ChunkFetch, FetchOutcome, LeafResult, TimeRange};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per range, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy with exponential backoff
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
        }
    }

    /// Check if another attempt should follow the failed attempt `attempt` (0-based)
    pub fn should_retry(&self, attempt: u32, error: &ArchiveError) -> bool {
        attempt + 1 < self.max_attempts && error.should_retry()
    }

    /// Backoff before retrying after the failed attempt `attempt`: `base_delay * 2^attempt`
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(2))
    }
}

/// Limits and pacing for one fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Deepest level at which a window may still be requested
    pub max_depth: u32,
    /// Retry behaviour for transient failures
    pub retry: RetryPolicy,
    /// Pause between requesting the two halves of a split window
    pub split_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            max_depth: 3,
            retry: RetryPolicy::default(),
            split_delay: Duration::from_secs(1),
        }
    }
}

impl FetchPolicy {
    /// Same limits with every delay removed
    pub fn without_delays(mut self) -> Self {
        self.retry.base_delay = Duration::ZERO;
        self.split_delay = Duration::ZERO;
        self
    }
}

/// Fetcher for candidate chunks
pub struct AdaptiveFetcher<S> {
    source: S,
    policy: FetchPolicy,
    metrics: Arc<FetchMetrics>,
}

impl<S: LogSource> AdaptiveFetcher<S> {
    /// Create a new AdaptiveFetcher with its own metrics collector
    pub fn new(source: S, policy: FetchPolicy) -> Self {
        Self::with_metrics(source, policy, Arc::new(FetchMetrics::new()))
    }

    /// Create a new AdaptiveFetcher recording into a shared collector
    pub fn with_metrics(source: S, policy: FetchPolicy, metrics: Arc<FetchMetrics>) -> Self {
        AdaptiveFetcher {
            source,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<FetchMetrics> {
        &self.metrics
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch one candidate chunk
    ///
    /// Every leaf range the chunk was resolved into is returned in
    /// chronological order, each with a final outcome (success, empty or
    /// terminal failure).
    pub async fn fetch(&self, chunk: TimeRange) -> ChunkFetch {
        let leaves = self.fetch_from_depth(chunk, 0).await;
        ChunkFetch { chunk, leaves }
    }

    /// Fetch a range as if it had already been split `depth` times
    pub async fn fetch_from_depth(&self, range: TimeRange, depth: u32) -> Vec<LeafResult> {
        let mut leaves = Vec::new();
        self.fetch_at_depth(range, depth, &mut leaves).await;
        leaves
    }

    fn fetch_at_depth<'a>(
        &'a self,
        range: TimeRange,
        depth: u32,
        leaves: &'a mut Vec<LeafResult>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.policy.max_depth {
                warn!("Max split depth exceeded for {} (depth {})", range, depth);
                self.metrics.record_depth_limit();
                leaves.push(LeafResult {
                    range,
                    outcome: FetchOutcome::TerminalFailure(format!(
                        "split depth {} exceeds maximum {}",
                        depth, self.policy.max_depth
                    )),
                    depth,
                });
                return;
            }

            let hours = range.duration().num_seconds() as f64 / 3600.0;
            info!("Processing range (depth {}): {} ({:.1} hours)", depth, range, hours);

            match self.fetch_with_retry(&range).await {
                FetchOutcome::NeedsSplit => {
                    if depth >= self.policy.max_depth {
                        warn!("Max split depth reached for {}, giving up", range);
                        self.metrics.record_depth_limit();
                        leaves.push(LeafResult {
                            range,
                            outcome: FetchOutcome::TerminalFailure(format!(
                                "range still too large at max split depth {}",
                                self.policy.max_depth
                            )),
                            depth,
                        });
                        return;
                    }

                    let Some((first, second)) = range.split() else {
                        warn!("Range {} is a single second and cannot be split", range);
                        leaves.push(LeafResult {
                            range,
                            outcome: FetchOutcome::TerminalFailure(
                                "single-second range reported as too large".to_string(),
                            ),
                            depth,
                        });
                        return;
                    };

                    info!("Splitting {} into {} and {}", range, first, second);
                    self.metrics.record_split();

                    self.fetch_at_depth(first, depth + 1, leaves).await;
                    self.pause(self.policy.split_delay).await;
                    self.fetch_at_depth(second, depth + 1, leaves).await;
                }
                outcome => leaves.push(LeafResult {
                    range,
                    outcome,
                    depth,
                }),
            }
        })
    }

    /// Fetch a range, retrying transient failures
    ///
    /// Never returns `TransientFailure`: exhausted retries become a
    /// `TerminalFailure`. A split signal is returned as soon as it is seen
    /// and does not count against the retry budget.
    async fn fetch_with_retry(&self, range: &TimeRange) -> FetchOutcome {
        let mut attempt = 0;

        loop {
            match self.attempt(range).await {
                FetchOutcome::TransientFailure(e) => {
                    if !self.policy.retry.should_retry(attempt, &e) {
                        warn!(
                            "Giving up on {} after {} attempts: {}",
                            range,
                            attempt + 1,
                            e
                        );
                        return FetchOutcome::TerminalFailure(format!(
                            "failed after {} attempts: {}",
                            attempt + 1,
                            e
                        ));
                    }

                    let backoff = self.policy.retry.backoff_duration(attempt);
                    warn!(
                        "Fetch failed for {} (attempt {}/{}), retrying after {:?}: {}",
                        range,
                        attempt + 1,
                        self.policy.retry.max_attempts,
                        backoff,
                        e
                    );
                    self.metrics.record_retry();
                    self.pause(backoff).await;

                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Make a single request and classify the answer
    pub async fn attempt(&self, range: &TimeRange) -> FetchOutcome {
        let started = Instant::now();
        let result = self.source.request_logs(range).await;
        let elapsed = started.elapsed();

        match result {
            Ok(LogResponse::Content(payload)) if payload.is_empty() => {
                self.metrics.record_api_call(true, elapsed);
                self.metrics.record_empty_window();
                info!("Retrieved empty logs for {}", range);
                FetchOutcome::Empty
            }
            Ok(LogResponse::Content(payload)) => {
                self.metrics.record_api_call(true, elapsed);
                self.metrics.record_payload(payload.len() as u64);
                info!("Retrieved logs for {}: {} bytes", range, payload.len());
                FetchOutcome::Success(payload)
            }
            Ok(LogResponse::NoLogUrl) => {
                self.metrics.record_api_call(true, elapsed);
                self.metrics.record_empty_window();
                info!("No log URL for {}, treating as empty", range);
                FetchOutcome::Empty
            }
            Err(e) if e.is_range_too_large() => {
                self.metrics.record_api_call(true, elapsed);
                debug!("Log API asked to reduce time range for {}: {}", range, e);
                FetchOutcome::NeedsSplit
            }
            Err(e) if e.should_retry() => {
                self.metrics.record_api_call(false, elapsed);
                FetchOutcome::TransientFailure(e)
            }
            Err(e) => {
                self.metrics.record_api_call(false, elapsed);
                warn!("Permanent error for {}: {}", range, e);
                FetchOutcome::TerminalFailure(e.to_string())
            }
        }
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
