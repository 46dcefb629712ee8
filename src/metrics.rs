//! Metrics collection for log fetching and storage
//!
//! Counters are atomics so a single collector can be shared by reference
//! between the fetcher and the orchestrator.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for one archiver process
#[derive(Debug, Default)]
pub struct FetchMetrics {
    // Log API statistics
    api_calls: AtomicU64,
    api_failures: AtomicU64,
    retries: AtomicU64,
    splits: AtomicU64,
    depth_limit_hits: AtomicU64,

    // Payload statistics
    payloads: AtomicU64,
    empty_windows: AtomicU64,
    bytes_downloaded: AtomicU64,

    // Storage statistics
    artifacts_stored: AtomicU64,
    storage_failures: AtomicU64,

    // Latency statistics (stored as microseconds)
    total_api_duration_us: AtomicU64,
    total_storage_duration_us: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMetricsSnapshot {
    pub api_calls: u64,
    pub api_failures: u64,
    pub retries: u64,
    pub splits: u64,
    pub depth_limit_hits: u64,

    pub payloads: u64,
    pub empty_windows: u64,
    pub bytes_downloaded: u64,

    pub artifacts_stored: u64,
    pub storage_failures: u64,

    pub total_api_duration_us: u64,
    pub total_storage_duration_us: u64,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call to the log API
    ///
    /// # Arguments
    /// * `success` - Whether the call produced a usable answer (payload,
    ///   empty window or split signal)
    /// * `duration` - Wall time of the call including the log download
    pub fn record_api_call(&self, success: bool, duration: Duration) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.api_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_api_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_depth_limit(&self) {
        self.depth_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payload(&self, bytes: u64) {
        self.payloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_empty_window(&self) {
        self.empty_windows.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a storage attempt
    pub fn record_storage(&self, success: bool, duration: Duration) {
        if success {
            self.artifacts_stored.fetch_add(1, Ordering::Relaxed);
        } else {
            self.storage_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_storage_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            api_failures: self.api_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            splits: self.splits.load(Ordering::Relaxed),
            depth_limit_hits: self.depth_limit_hits.load(Ordering::Relaxed),
            payloads: self.payloads.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            artifacts_stored: self.artifacts_stored.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            total_api_duration_us: self.total_api_duration_us.load(Ordering::Relaxed),
            total_storage_duration_us: self.total_storage_duration_us.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.api_calls.store(0, Ordering::Relaxed);
        self.api_failures.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.splits.store(0, Ordering::Relaxed);
        self.depth_limit_hits.store(0, Ordering::Relaxed);
        self.payloads.store(0, Ordering::Relaxed);
        self.empty_windows.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.artifacts_stored.store(0, Ordering::Relaxed);
        self.storage_failures.store(0, Ordering::Relaxed);
        self.total_api_duration_us.store(0, Ordering::Relaxed);
        self.total_storage_duration_us.store(0, Ordering::Relaxed);
    }
}

impl FetchMetricsSnapshot {
    /// Average log API call duration in milliseconds
    pub fn avg_api_duration_ms(&self) -> f64 {
        if self.api_calls == 0 {
            0.0
        } else {
            (self.total_api_duration_us as f64 / self.api_calls as f64) / 1000.0
        }
    }

    /// Log API failure rate as a percentage (0.0 to 100.0)
    pub fn api_failure_rate(&self) -> f64 {
        if self.api_calls == 0 {
            0.0
        } else {
            (self.api_failures as f64 / self.api_calls as f64) * 100.0
        }
    }
}
