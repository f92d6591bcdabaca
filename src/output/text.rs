//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Status table with colored gap classification
//! - Per-recipe update results with the lines that moved
//! - Summary lines for both commands

use crate::domain::{Gap, StatusRecord, StatusReport, UpdateOutcome, UpdateResult, UpdateSummary};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

const HEADERS: [&str; 5] = ["RECIPE", "LINE", "CURRENT", "LATEST", "STATUS"];
const MISSING: &str = "-";

/// Text formatter for human-readable output
pub struct TextFormatter {
    /// Verbosity level
    verbosity: Verbosity,
    /// Whether to use colors
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    /// Cells of one table row, in column order
    fn status_cells(record: &StatusRecord) -> [String; 5] {
        [
            record.recipe.to_string(),
            record
                .line
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            record
                .current
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            record
                .latest
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            record.status.to_string(),
        ]
    }

    fn paint_status(&self, gap: Gap, padded: &str) -> String {
        if !self.color {
            return padded.to_string();
        }
        match gap {
            Gap::UpToDate => padded.green().to_string(),
            Gap::Behind => padded.yellow().to_string(),
            Gap::Unknown => padded.red().to_string(),
        }
    }

    fn format_table(&self, records: &[StatusRecord], writer: &mut dyn Write) -> std::io::Result<()> {
        let rows: Vec<[String; 5]> = records.iter().map(Self::status_cells).collect();
        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header: Vec<String> = HEADERS
            .iter()
            .zip(widths.iter())
            .map(|(h, w)| format!("{:w$}", h, w = *w))
            .collect();
        let header = header.join("  ");
        if self.color {
            writeln!(writer, "{}", header.trim_end().bold())?;
        } else {
            writeln!(writer, "{}", header.trim_end())?;
        }

        for (record, row) in records.iter().zip(rows.iter()) {
            let mut cells: Vec<String> = row[..4]
                .iter()
                .zip(widths.iter())
                .map(|(cell, w)| format!("{:w$}", cell, w = *w))
                .collect();
            cells.push(self.paint_status(record.status, &row[4]));
            let mut line = cells.join("  ");

            let show_detail = record.status == Gap::Unknown || self.verbosity == Verbosity::Verbose;
            if let Some(detail) = record.detail.as_deref().filter(|_| show_detail) {
                let detail = format!("({})", detail);
                if self.color {
                    line = format!("{}  {}", line, detail.dimmed());
                } else {
                    line = format!("{}  {}", line, detail);
                }
            }
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }

    fn format_result(&self, result: &UpdateResult, writer: &mut dyn Write) -> std::io::Result<()> {
        match &result.outcome {
            UpdateOutcome::Done { branch, pushed } => {
                let push = if *pushed { "pushed" } else { "local" };
                if self.color {
                    writeln!(
                        writer,
                        "  {} {} {} ({})",
                        "✓".green(),
                        result.recipe.as_str().bold(),
                        branch.cyan(),
                        push.dimmed()
                    )?;
                } else {
                    writeln!(writer, "  + {} {} ({})", result.recipe, branch, push)?;
                }
            }
            UpdateOutcome::Failed { state, kind } => {
                let detail = result.detail.as_deref().unwrap_or_default();
                if self.color {
                    writeln!(
                        writer,
                        "  {} {} {} while {}: {}",
                        "✗".red(),
                        result.recipe.as_str().bold(),
                        kind.to_string().red(),
                        state,
                        detail
                    )?;
                } else {
                    writeln!(
                        writer,
                        "  x {} {} while {}: {}",
                        result.recipe, kind, state, detail
                    )?;
                }
            }
            UpdateOutcome::Skipped { reason } => {
                if self.verbosity != Verbosity::Verbose {
                    return Ok(());
                }
                if self.color {
                    writeln!(
                        writer,
                        "  {} {}",
                        result.recipe.as_str().dimmed(),
                        format!("({})", reason).dimmed()
                    )?;
                } else {
                    writeln!(writer, "  - {} ({})", result.recipe, reason)?;
                }
                return Ok(());
            }
        }

        for update in &result.updates {
            if self.color {
                writeln!(writer, "      {}", update.to_string().dimmed())?;
            } else {
                writeln!(writer, "      {}", update)?;
            }
        }
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format_status(&self, report: &StatusReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet && !report.records.is_empty() {
            self.format_table(&report.records, writer)?;
            writeln!(writer)?;
        }

        let summary = &report.summary;
        let mut line = if self.color {
            format!(
                "{} lines: {} behind, {} up-to-date, {} unknown",
                summary.total(),
                summary.behind.to_string().yellow(),
                summary.up_to_date.to_string().green(),
                summary.unknown.to_string().red()
            )
        } else {
            format!(
                "{} lines: {} behind, {} up-to-date, {} unknown",
                summary.total(),
                summary.behind,
                summary.up_to_date,
                summary.unknown
            )
        };
        if summary.interrupted > 0 {
            line.push_str(&format!(", {} recipes not checked (interrupted)", summary.interrupted));
        }
        if summary.deprecated > 0 {
            line.push_str(&format!(", {} deprecated recipes skipped", summary.deprecated));
        }
        writeln!(writer, "{}", line)
    }

    fn format_update(
        &self,
        summary: &UpdateSummary,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if self.verbosity != Verbosity::Quiet {
            for result in &summary.results {
                self.format_result(result, writer)?;
            }
            if !summary.results.is_empty() {
                writeln!(writer)?;
            }
        }

        let seconds = summary.duration.as_secs_f64();
        if self.color {
            writeln!(writer, "{}:", "Summary".bold())?;
            writeln!(
                writer,
                "  {} updated, {} failed, {} skipped in {:.1}s",
                summary.done_count().to_string().green(),
                summary.failed_count().to_string().red(),
                summary.skipped_count().to_string().dimmed(),
                seconds
            )
        } else {
            writeln!(writer, "Summary:")?;
            writeln!(
                writer,
                "  {} updated, {} failed, {} skipped in {:.1}s",
                summary.done_count(),
                summary.failed_count(),
                summary.skipped_count(),
                seconds
            )
        }
    }
}
