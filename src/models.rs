//! Core data models for the Amplify log archiver

use crate::error::{ArchiveError, Result};
use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed time window `[start, end]` at one-second resolution
///
/// Adjacent windows are separated by exactly one second, so the window
/// ending at `23:59:59` is followed by the one starting at `00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// First second covered (inclusive)
    pub start: DateTime<Utc>,
    /// Last second covered (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new TimeRange
    ///
    /// Sub-second components are truncated.
    ///
    /// # Returns
    /// * `Ok(TimeRange)` if the range is valid
    /// * `Err(ArchiveError)` if start > end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let start = start.trunc_subsecs(0);
        let end = end.trunc_subsecs(0);
        if start > end {
            return Err(ArchiveError::InvalidRange(format!(
                "start ({}) must be <= end ({})",
                start, end
            )));
        }
        Ok(TimeRange { start, end })
    }

    /// Length of the window, measured from `start` to `end`
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Number of whole seconds covered, counting both ends
    pub fn covered_seconds(&self) -> i64 {
        self.duration().num_seconds() + 1
    }

    /// Check whether a timestamp falls inside this window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Bisect at the temporal midpoint
    ///
    /// Returns `[start, mid]` and `[mid + 1s, end]`, or `None` when the
    /// window covers a single second and cannot be divided.
    pub fn split(&self) -> Option<(TimeRange, TimeRange)> {
        let span = self.duration().num_seconds();
        if span < 1 {
            return None;
        }

        let mid = self.start + Duration::seconds(span / 2);
        let first = TimeRange {
            start: self.start,
            end: mid,
        };
        let second = TimeRange {
            start: mid + Duration::seconds(1),
            end: self.end,
        };
        Some((first, second))
    }

    /// Start timestamp in the format the log API expects
    pub fn api_start(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// End timestamp in the format the log API expects
    pub fn api_end(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.api_start(), self.api_end())
    }
}

/// Classification of a fetch attempt or of a finished leaf range
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Log data was retrieved
    Success(Bytes),
    /// The window holds no log entries
    Empty,
    /// The log API asked for a smaller window
    NeedsSplit,
    /// A retryable failure occurred
    TransientFailure(ArchiveError),
    /// Retries or split depth were exhausted, or the error is permanent
    TerminalFailure(String),
}

impl FetchOutcome {
    /// Whether the range was covered, with or without log entries
    pub fn is_covered(&self) -> bool {
        matches!(self, FetchOutcome::Success(_) | FetchOutcome::Empty)
    }
}

/// Final outcome for one range on which the fetcher stopped splitting
#[derive(Debug, Clone)]
pub struct LeafResult {
    pub range: TimeRange,
    pub outcome: FetchOutcome,
    /// Split depth at which the range was resolved
    pub depth: u32,
}

/// Everything the fetcher produced for one candidate chunk
#[derive(Debug, Clone)]
pub struct ChunkFetch {
    /// The candidate chunk as generated
    pub chunk: TimeRange,
    /// Leaf ranges in chronological order
    pub leaves: Vec<LeafResult>,
}

impl ChunkFetch {
    /// A chunk succeeds when at least one leaf was covered
    pub fn succeeded(&self) -> bool {
        self.leaves.iter().any(|leaf| leaf.outcome.is_covered())
    }

    /// A chunk is empty when every leaf came back without log entries
    pub fn all_empty(&self) -> bool {
        !self.leaves.is_empty()
            && self
                .leaves
                .iter()
                .all(|leaf| matches!(leaf.outcome, FetchOutcome::Empty))
    }

    /// Leaf ranges that ended in a terminal failure
    pub fn failed_ranges(&self) -> Vec<TimeRange> {
        self.leaves
            .iter()
            .filter(|leaf| matches!(leaf.outcome, FetchOutcome::TerminalFailure(_)))
            .map(|leaf| leaf.range)
            .collect()
    }

    /// Number of leaves carrying a payload
    pub fn payload_count(&self) -> usize {
        self.leaves
            .iter()
            .filter(|leaf| matches!(leaf.outcome, FetchOutcome::Success(_)))
            .count()
    }
}

/// Reference to a persisted log artifact (storage key or path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome classification recorded for a leaf range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafStatus {
    Success,
    Empty,
    Failed,
}

/// Per-leaf record accumulated by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub range: TimeRange,
    pub status: LeafStatus,
    /// Payload size in bytes (0 for empty and failed leaves)
    #[serde(default)]
    pub bytes: u64,
    /// Where the payload was stored, if persisting succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    /// Why persisting failed, for leaves fetched but not stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
    /// Why fetching failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ChunkResult {
    /// Whether the payload was fetched but could not be stored
    pub fn fetched_not_stored(&self) -> bool {
        self.status == LeafStatus::Success && self.artifact.is_none()
    }
}
