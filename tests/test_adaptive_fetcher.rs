//! Integration tests for AdaptiveFetcher against a scripted log source

use amplify_logs::adaptive_fetcher::{AdaptiveFetcher, FetchPolicy, RetryPolicy};
use amplify_logs::error::{ArchiveError, Result};
use amplify_logs::log_source::{LogResponse, LogSource};
use amplify_logs::models::{FetchOutcome, TimeRange};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Log source answering from a closure of (range, call index)
struct ScriptedSource<F> {
    respond: F,
    calls: Mutex<Vec<TimeRange>>,
}

impl<F> ScriptedSource<F>
where
    F: Fn(&TimeRange, usize) -> Result<LogResponse> + Send + Sync,
{
    fn new(respond: F) -> Self {
        ScriptedSource {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<TimeRange> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> LogSource for ScriptedSource<F>
where
    F: Fn(&TimeRange, usize) -> Result<LogResponse> + Send + Sync,
{
    async fn request_logs(&self, range: &TimeRange) -> Result<LogResponse> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(*range);
            calls.len() - 1
        };
        (self.respond)(range, index)
    }
}

fn fourteen_days() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 59).unwrap(),
    )
    .unwrap()
}

fn policy(max_depth: u32, max_attempts: u32) -> FetchPolicy {
    FetchPolicy {
        max_depth,
        retry: RetryPolicy::new(max_attempts, Duration::ZERO),
        split_delay: Duration::ZERO,
    }
}

fn too_large() -> ArchiveError {
    ArchiveError::RangeTooLarge("Please reduce time range".to_string())
}

fn payload() -> Result<LogResponse> {
    Ok(LogResponse::Content(Bytes::from_static(
        b"date,time,x-edge-location,sc-bytes\n2024-01-01,00:00:01,FRA56,512\n",
    )))
}

#[tokio::test]
async fn test_success_without_split() {
    let source = ScriptedSource::new(|_, _| payload());
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(fourteen_days()).await;

    assert_eq!(fetch.leaves.len(), 1);
    assert!(matches!(fetch.leaves[0].outcome, FetchOutcome::Success(_)));
    assert_eq!(fetch.leaves[0].range, fourteen_days());
    assert_eq!(fetch.leaves[0].depth, 0);
    assert_eq!(fetcher.source().calls().len(), 1);
}

#[tokio::test]
async fn test_split_once_then_succeed() {
    let chunk = fourteen_days();
    let source = ScriptedSource::new(move |range, _| {
        if *range == chunk {
            Err(too_large())
        } else {
            payload()
        }
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(chunk).await;
    let (first, second) = chunk.split().unwrap();

    assert_eq!(fetch.leaves.len(), 2);
    assert_eq!(fetch.leaves[0].range, first);
    assert_eq!(fetch.leaves[1].range, second);
    assert!(fetch.leaves.iter().all(|l| l.depth == 1));
    assert_eq!(fetch.payload_count(), 2);
    assert!(fetch.failed_ranges().is_empty());

    assert_eq!(fetcher.source().calls(), vec![chunk, first, second]);
    assert_eq!(fetcher.metrics().snapshot().splits, 1);
}

#[tokio::test]
async fn test_depth_bound_always_too_large() {
    let source = ScriptedSource::new(|_, _| Err(too_large()));
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(fourteen_days()).await;
    let calls = fetcher.source().calls();

    // 1 + 2 + 4 + 8 requests, the deepest level being 2^3 windows
    assert_eq!(calls.len(), 15);
    assert_eq!(fetch.leaves.len(), 8);
    assert!(fetch.leaves.iter().all(|l| l.depth == 3));
    assert!(fetch
        .leaves
        .iter()
        .all(|l| matches!(l.outcome, FetchOutcome::TerminalFailure(_))));
    assert!(!fetch.succeeded());
    assert_eq!(fetch.failed_ranges().len(), 8);

    let stats = fetcher.metrics().snapshot();
    assert_eq!(stats.splits, 7);
    assert_eq!(stats.depth_limit_hits, 8);
}

#[tokio::test]
async fn test_retry_bound_always_transient() {
    let source = ScriptedSource::new(|_, _| Err(ArchiveError::Throttled("Rate exceeded".to_string())));
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(fourteen_days()).await;
    let calls = fetcher.source().calls();

    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|r| *r == fourteen_days()), "transient failures never split");
    assert_eq!(fetch.leaves.len(), 1);
    assert!(matches!(
        fetch.leaves[0].outcome,
        FetchOutcome::TerminalFailure(_)
    ));

    let stats = fetcher.metrics().snapshot();
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.splits, 0);
}

#[tokio::test]
async fn test_transient_then_success() {
    let source = ScriptedSource::new(|_, index| {
        if index < 2 {
            Err(ArchiveError::UpstreamServer {
                status: 503,
                message: "Service Unavailable".to_string(),
            })
        } else {
            payload()
        }
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(fourteen_days()).await;

    assert_eq!(fetcher.source().calls().len(), 3);
    assert!(matches!(fetch.leaves[0].outcome, FetchOutcome::Success(_)));
}

#[tokio::test]
async fn test_split_signal_does_not_consume_retries() {
    let chunk = fourteen_days();
    // Whole chunk is too large; both halves come back without a log URL
    let source = ScriptedSource::new(move |range, _| {
        if *range == chunk {
            return Err(too_large());
        }
        Ok(LogResponse::NoLogUrl)
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 1));

    let fetch = fetcher.fetch(chunk).await;

    // With a single attempt allowed, the split still happens
    assert_eq!(fetcher.source().calls().len(), 3);
    assert_eq!(fetch.leaves.len(), 2);
    assert!(fetch.all_empty());
}

#[tokio::test]
async fn test_retries_after_split() {
    let chunk = fourteen_days();
    let (first, _) = chunk.split().unwrap();
    let first_attempts = Mutex::new(0u32);
    let source = ScriptedSource::new(move |range, _| {
        if *range == chunk {
            return Err(too_large());
        }
        if *range == first {
            let mut attempts = first_attempts.lock().unwrap();
            *attempts += 1;
            if *attempts < 3 {
                return Err(ArchiveError::Timeout("operation timed out".to_string()));
            }
        }
        payload()
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(chunk).await;

    // 1 split + 3 attempts for the first half + 1 for the second
    assert_eq!(fetcher.source().calls().len(), 5);
    assert_eq!(fetch.payload_count(), 2);
}

#[tokio::test]
async fn test_client_error_is_terminal() {
    let source = ScriptedSource::new(|_, _| {
        Err(ArchiveError::UpstreamClient {
            status: 404,
            message: "App not found".to_string(),
        })
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(fourteen_days()).await;

    assert_eq!(fetcher.source().calls().len(), 1);
    assert!(matches!(
        fetch.leaves[0].outcome,
        FetchOutcome::TerminalFailure(ref reason) if reason.contains("404")
    ));
}

#[tokio::test]
async fn test_empty_outcomes() {
    let source = ScriptedSource::new(|_, index| {
        if index == 0 {
            Ok(LogResponse::Content(Bytes::new()))
        } else {
            Ok(LogResponse::NoLogUrl)
        }
    });
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    assert!(matches!(
        fetcher.attempt(&fourteen_days()).await,
        FetchOutcome::Empty
    ));
    assert!(matches!(
        fetcher.attempt(&fourteen_days()).await,
        FetchOutcome::Empty
    ));
    assert_eq!(fetcher.metrics().snapshot().empty_windows, 2);
}

#[tokio::test]
async fn test_beyond_max_depth_makes_no_call() {
    let source = ScriptedSource::new(|_, _| payload());
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let leaves = fetcher.fetch_from_depth(fourteen_days(), 4).await;

    assert!(fetcher.source().calls().is_empty());
    assert_eq!(leaves.len(), 1);
    assert!(matches!(leaves[0].outcome, FetchOutcome::TerminalFailure(_)));
}

#[tokio::test]
async fn test_single_second_range_cannot_split() {
    let instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let range = TimeRange::new(instant, instant).unwrap();
    let source = ScriptedSource::new(|_, _| Err(too_large()));
    let fetcher = AdaptiveFetcher::new(source, policy(3, 3));

    let fetch = fetcher.fetch(range).await;

    assert_eq!(fetcher.source().calls().len(), 1);
    assert_eq!(fetch.leaves.len(), 1);
    assert!(matches!(
        fetch.leaves[0].outcome,
        FetchOutcome::TerminalFailure(_)
    ));
}

#[tokio::test]
async fn test_default_policy_without_delays() {
    let source = ScriptedSource::new(|_, _| Err(ArchiveError::Network("reset".to_string())));
    let fetcher = AdaptiveFetcher::new(source, FetchPolicy::default().without_delays());

    let fetch = fetcher.fetch(fourteen_days()).await;

    assert_eq!(fetcher.source().calls().len(), 3);
    assert!(!fetch.succeeded());
}

/// Virtual time offsets agree to the millisecond
fn assert_elapsed(actual: Duration, expected_secs: u64) {
    let expected = Duration::from_secs(expected_secs);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(10),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_backoff_doubles() {
    let started = Instant::now();
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let recorded = offsets.clone();
    let source = ScriptedSource::new(move |_, _| {
        recorded.lock().unwrap().push(started.elapsed());
        Err(ArchiveError::Throttled("Rate exceeded".to_string()))
    });
    let fetcher = AdaptiveFetcher::new(
        source,
        FetchPolicy {
            max_depth: 3,
            retry: RetryPolicy::new(3, Duration::from_secs(2)),
            split_delay: Duration::ZERO,
        },
    );

    let fetch = fetcher.fetch(fourteen_days()).await;

    assert!(matches!(fetch.leaves[0].outcome, FetchOutcome::TerminalFailure(_)));
    let offsets = offsets.lock().unwrap().clone();
    assert_eq!(offsets.len(), 3);
    assert_elapsed(offsets[0], 0);
    assert_elapsed(offsets[1], 2);
    assert_elapsed(offsets[2], 6);
    // No backoff after the final attempt
    assert_elapsed(started.elapsed(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_single_pause_between_halves() {
    let chunk = fourteen_days();
    let started = Instant::now();
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let recorded = offsets.clone();
    let source = ScriptedSource::new(move |range, _| {
        recorded.lock().unwrap().push(started.elapsed());
        if *range == chunk {
            Err(too_large())
        } else {
            payload()
        }
    });
    let fetcher = AdaptiveFetcher::new(
        source,
        FetchPolicy {
            max_depth: 3,
            retry: RetryPolicy::new(3, Duration::ZERO),
            split_delay: Duration::from_secs(1),
        },
    );

    let fetch = fetcher.fetch(chunk).await;

    assert_eq!(fetch.payload_count(), 2);
    let offsets = offsets.lock().unwrap().clone();
    assert_eq!(offsets.len(), 3);
    assert_elapsed(offsets[0], 0);
    assert_elapsed(offsets[1], 0);
    assert_elapsed(offsets[2], 1);
    assert_elapsed(started.elapsed(), 1);
}
