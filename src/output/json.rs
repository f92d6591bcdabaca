//! JSON output formatter for machine processing
//!
//! Status reports are printed as an array of records; update batches as an
//! object carrying the run date, duration and tool version.

use crate::domain::{StatusReport, UpdateResult, UpdateSummary};
use crate::output::OutputFormatter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON representation of an update batch
#[derive(Serialize)]
struct JsonUpdateReport<'a> {
    /// When the batch started
    date: DateTime<Utc>,
    /// Duration in seconds
    duration: f64,
    /// Version of this tool
    version: &'static str,
    /// Per-recipe counts
    summary: JsonUpdateCounts,
    /// Per-recipe results
    results: &'a [UpdateResult],
}

#[derive(Serialize)]
struct JsonUpdateCounts {
    done: usize,
    failed: usize,
    skipped: usize,
}

fn write_json<T: Serialize + ?Sized>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

impl OutputFormatter for JsonFormatter {
    fn format_status(&self, report: &StatusReport, writer: &mut dyn Write) -> std::io::Result<()> {
        write_json(&report.records, writer)
    }

    fn format_update(
        &self,
        summary: &UpdateSummary,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let output = JsonUpdateReport {
            date: summary.started_at,
            duration: summary.duration.as_secs_f64(),
            version: env!("CARGO_PKG_VERSION"),
            summary: JsonUpdateCounts {
                done: summary.done_count(),
                failed: summary.failed_count(),
                skipped: summary.skipped_count(),
            },
            results: &summary.results,
        };
        write_json(&output, writer)
    }
}
