//! Range Generator
//!
//! Splits a requested calendar interval into fixed-size candidate chunks

use crate::error::{ArchiveError, Result};
use crate::models::TimeRange;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

const SECONDS_PER_DAY: i64 = 86_400;

/// Generator for the initial work list of time chunks
#[derive(Debug, Clone, Copy)]
pub struct RangeGenerator {
    /// Length of each chunk in days
    chunk_days: u32,
}

impl RangeGenerator {
    /// Longest accepted chunk (ten years)
    pub const MAX_CHUNK_DAYS: u32 = 3650;

    /// Create a new RangeGenerator
    ///
    /// # Arguments
    /// * `chunk_days` - Length of each chunk in days, between 1 and
    ///   [`RangeGenerator::MAX_CHUNK_DAYS`]
    pub fn new(chunk_days: u32) -> Result<Self> {
        if chunk_days == 0 {
            return Err(ArchiveError::ConfigError(
                "chunk_days must be greater than 0".to_string(),
            ));
        }
        if chunk_days > Self::MAX_CHUNK_DAYS {
            return Err(ArchiveError::ConfigError(format!(
                "chunk_days must be at most {}, got {}",
                Self::MAX_CHUNK_DAYS,
                chunk_days
            )));
        }
        Ok(RangeGenerator { chunk_days })
    }

    pub fn chunk_days(&self) -> u32 {
        self.chunk_days
    }

    /// Calculate chunks covering whole calendar days
    ///
    /// # Arguments
    /// * `start` - First day, taken from 00:00:00 UTC
    /// * `end` - Last day, taken up to 23:59:59 UTC
    ///
    /// # Behavior
    /// - Each chunk (except possibly the last) spans exactly `chunk_days` days
    /// - The last chunk is truncated to end at the overall end
    /// - Each chunk starts one second after the previous one ends
    /// - `start > end` yields an empty list
    pub fn generate(&self, start: NaiveDate, end: NaiveDate) -> Vec<TimeRange> {
        if start > end {
            debug!("Start date {} is after end date {}, no chunks", start, end);
            return Vec::new();
        }

        let overall = TimeRange {
            start: start_of_day(start),
            end: end_of_day(end),
        };
        self.generate_span(overall)
    }

    /// Calculate chunks covering an arbitrary timestamp window
    pub fn generate_span(&self, overall: TimeRange) -> Vec<TimeRange> {
        let chunk_len = Duration::seconds(i64::from(self.chunk_days) * SECONDS_PER_DAY);
        let mut chunks = Vec::new();
        let mut current = overall.start;

        while current <= overall.end {
            // Near the end of the representable calendar the chunk is clamped
            let chunk_end = current
                .checked_add_signed(chunk_len - Duration::seconds(1))
                .map_or(overall.end, |end| end.min(overall.end));
            chunks.push(TimeRange {
                start: current,
                end: chunk_end,
            });
            match chunk_end.checked_add_signed(Duration::seconds(1)) {
                Some(next) => current = next,
                None => break,
            }
        }

        debug!(
            "Calculated {} chunks for {} (chunk_days={})",
            chunks.len(),
            overall,
            self.chunk_days
        );

        chunks
    }
}

impl Default for RangeGenerator {
    fn default() -> Self {
        RangeGenerator { chunk_days: 14 }
    }
}

/// First second of a calendar day in UTC
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last second of a calendar day in UTC
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + Duration::seconds(SECONDS_PER_DAY - 1)
}

/// Calendar window covering the last `retention_days` days up to `today`
///
/// Returns `(today - retention_days, today)`, starting no earlier than
/// the first representable date.
pub fn retention_window(today: NaiveDate, retention_days: u32) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}
