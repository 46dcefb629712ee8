//! Run report written at the end of every archiver run

use crate::error::{ArchiveError, Result};
use crate::metrics::FetchMetricsSnapshot;
use crate::models::{ArtifactRef, TimeRange};
use crate::orchestrator::RunStatistics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Counts summed over every application in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub applications: usize,
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub empty_chunks: usize,
    pub failed_chunks: usize,
    pub upload_failures: usize,
    pub failed_ranges: usize,
    pub bytes_fetched: u64,
}

impl RunTotals {
    fn from_runs(runs: &[RunStatistics]) -> Self {
        runs.iter().fold(
            RunTotals {
                applications: runs.len(),
                ..Default::default()
            },
            |mut totals, run| {
                totals.total_chunks += run.total_chunks;
                totals.successful_chunks += run.successful_chunks;
                totals.empty_chunks += run.empty_chunks;
                totals.failed_chunks += run.failed_chunks;
                totals.upload_failures += run.upload_failures;
                totals.failed_ranges += run.failed_ranges.len();
                totals.bytes_fetched += run.bytes_fetched();
                totals
            },
        )
    }
}

/// Machine readable summary of a run
///
/// `files_produced` tells downstream cataloguing whether anything new was
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub chunk_days: u32,
    pub applications: Vec<RunStatistics>,
    pub totals: RunTotals,
    pub artifacts: Vec<ArtifactRef>,
    pub files_produced: bool,
    pub metrics: FetchMetricsSnapshot,
}

impl RunReport {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        chunk_days: u32,
        applications: Vec<RunStatistics>,
        metrics: FetchMetricsSnapshot,
    ) -> Self {
        let totals = RunTotals::from_runs(&applications);
        let artifacts: Vec<ArtifactRef> = applications
            .iter()
            .flat_map(|run| run.artifacts().cloned())
            .collect();

        RunReport {
            generated_at: Utc::now(),
            start_date,
            end_date,
            chunk_days,
            applications,
            totals,
            files_produced: !artifacts.is_empty(),
            artifacts,
            metrics,
        }
    }

    /// Every failed leaf range, tagged with its application
    pub fn failed_ranges(&self) -> impl Iterator<Item = (&str, &TimeRange)> {
        self.applications.iter().flat_map(|run| {
            run.failed_ranges
                .iter()
                .map(move |range| (run.app_name.as_str(), range))
        })
    }

    /// Write the report as pretty-printed JSON
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path).map_err(|e| {
            ArchiveError::Io(format!("Failed to create report {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;

        info!("Run report written to {}", path.display());
        Ok(())
    }

    /// Human readable summary, one line per entry
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Archived {} to {} in {}-day chunks",
                self.start_date, self.end_date, self.chunk_days
            ),
        ];

        for run in &self.applications {
            lines.push(format!(
                "  {}: {}/{} chunks successful ({} empty), {} failed, {} upload failures, {} files",
                run.app_name,
                run.successful_chunks,
                run.total_chunks,
                run.empty_chunks,
                run.failed_chunks,
                run.upload_failures,
                run.artifacts().count()
            ));
        }

        lines.push(format!(
            "Total: {} chunks, {} successful, {} failed, {} bytes, {} files stored",
            self.totals.total_chunks,
            self.totals.successful_chunks,
            self.totals.failed_chunks,
            self.totals.bytes_fetched,
            self.artifacts.len()
        ));

        if self.totals.failed_ranges > 0 {
            lines.push("Failed ranges:".to_string());
            for (app, range) in self.failed_ranges() {
                lines.push(format!("  {}: {}", app, range));
            }
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FetchMetrics;
    use crate::models::{ChunkResult, LeafStatus};
    use chrono::TimeZone;

    fn range(day: u32) -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, day, 23, 59, 59).unwrap(),
        )
        .unwrap()
    }

    fn run_with_artifact() -> RunStatistics {
        let mut run = RunStatistics::new("booking_example_com");
        run.total_chunks = 2;
        run.successful_chunks = 1;
        run.failed_chunks = 1;
        run.failed_ranges.push(range(2));
        run.results.push(ChunkResult {
            range: range(1),
            status: LeafStatus::Success,
            bytes: 42,
            artifact: Some(ArtifactRef("logs/log_20240101_235959".to_string())),
            upload_error: None,
            failure: None,
        });
        run
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_report_totals() {
        let mut empty = RunStatistics::new("shop_example_com");
        empty.total_chunks = 1;
        empty.successful_chunks = 1;
        empty.empty_chunks = 1;

        let report = RunReport::new(
            date(1),
            date(2),
            1,
            vec![run_with_artifact(), empty],
            FetchMetrics::new().snapshot(),
        );

        assert_eq!(report.totals.applications, 2);
        assert_eq!(report.totals.total_chunks, 3);
        assert_eq!(report.totals.successful_chunks, 2);
        assert_eq!(report.totals.empty_chunks, 1);
        assert_eq!(report.totals.failed_ranges, 1);
        assert_eq!(report.totals.bytes_fetched, 42);
        assert_eq!(report.artifacts.len(), 1);
        assert!(report.files_produced);
    }

    #[test]
    fn test_report_without_artifacts() {
        let report = RunReport::new(
            date(1),
            date(1),
            14,
            vec![RunStatistics::new("booking_example_com")],
            FetchMetrics::new().snapshot(),
        );
        assert!(!report.files_produced);
        assert!(report.artifacts.is_empty());
    }

    #[test]
    fn test_summary_lists_failed_ranges() {
        let report = RunReport::new(
            date(1),
            date(2),
            1,
            vec![run_with_artifact()],
            FetchMetrics::new().snapshot(),
        );
        let summary = report.summary_lines().join("\n");

        assert!(summary.contains("Failed ranges:"));
        assert!(summary.contains("booking_example_com: 2024-01-02T00:00:00Z - 2024-01-02T23:59:59Z"));
    }

    #[test]
    fn test_write_to() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("run.json");
        let report = RunReport::new(
            date(1),
            date(2),
            1,
            vec![run_with_artifact()],
            FetchMetrics::new().snapshot(),
        );

        report.write_to(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["files_produced"], true);
        assert_eq!(json["applications"][0]["app_name"], "booking_example_com");
        assert_eq!(json["artifacts"][0], "logs/log_20240101_235959");
        assert_eq!(json["metrics"]["api_calls"], 0);
    }
}
