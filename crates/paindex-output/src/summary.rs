//! Index run summary.
//!
//! Condenses an [`IndexRun`] into the handful of numbers worth printing:
//! period, base and final level, total return, deletion activity, divisor
//! drift and the latest sector table.

use crate::export::{ExportError, ExportFormat, Exporter};
use chrono::NaiveDate;
use paindex_engine::{IndexRun, SectorWeight};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-segment line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Segment label.
    pub name: String,
    /// First date with a level, if any.
    pub start: Option<NaiveDate>,
    /// Last date with a level, if any.
    pub end: Option<NaiveDate>,
    /// Anchor level.
    pub base_value: f64,
    /// Closing level (the base value for an empty segment).
    pub final_value: f64,
    /// Number of constituents in the reference.
    pub constituents: usize,
    /// Number of dates.
    pub trading_days: usize,
}

/// Summary of a full index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,
    /// First published date.
    pub period_start: Option<NaiveDate>,
    /// Last published date.
    pub period_end: Option<NaiveDate>,
    /// Base level of the first segment.
    pub base_value: f64,
    /// Last published level.
    pub final_value: f64,
    /// Published dates across all segments.
    pub trading_days: usize,
    /// Booked deletion adjustments.
    pub deletion_events: usize,
    /// Cells filled with a carried-forward cap.
    pub imputed_cells: usize,
    /// Smallest divisor seen in any segment.
    pub divisor_min: Option<f64>,
    /// Largest divisor seen in any segment.
    pub divisor_max: Option<f64>,
    /// Segment breakdown.
    pub segments: Vec<SegmentSummary>,
    /// Date of the sector table.
    pub sector_date: Option<NaiveDate>,
    /// Latest sector weights, largest first.
    pub sector_weights: Vec<SectorWeight>,
}

impl IndexSummary {
    /// Return from base to final level, as a fraction.
    pub fn total_return(&self) -> f64 {
        self.final_value / self.base_value - 1.0
    }

    /// Render as a fixed-width text table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nIndex Summary: {}\n", self.name));
        output.push_str(&format!("Period: {}\n", self.period_label()));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str("\nLevels:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!("  Base Value:               {:.4}\n", self.base_value));
        output.push_str(&format!("  Final Value:              {:.4}\n", self.final_value));
        output.push_str(&format!(
            "  Total Return:             {:.2}%\n",
            self.total_return() * 100.0
        ));
        output.push_str(&format!("  Trading Days:             {}\n", self.trading_days));
        output.push_str(&format!("  Deletion Events:          {}\n", self.deletion_events));
        output.push_str(&format!("  Imputed Cells:            {}\n", self.imputed_cells));
        if let (Some(lo), Some(hi)) = (self.divisor_min, self.divisor_max) {
            output.push_str(&format!("  Divisor Range:            {lo:.6} .. {hi:.6}\n"));
        }

        if !self.segments.is_empty() {
            output.push_str("\nSegments:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<12} {:>12} {:>12} {:>8} {:>14} {:>14}\n",
                "Segment", "Start", "End", "Days", "Base", "Final"
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for seg in &self.segments {
                output.push_str(&format!(
                    "{:<12} {:>12} {:>12} {:>8} {:>14.4} {:>14.4}\n",
                    seg.name,
                    date_or_dash(seg.start),
                    date_or_dash(seg.end),
                    seg.trading_days,
                    seg.base_value,
                    seg.final_value
                ));
            }
        }

        if !self.sector_weights.is_empty() {
            output.push_str(&format!(
                "\nSector Weights ({}):\n",
                date_or_dash(self.sector_date)
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!("{:<40} {:>14}\n", "Sector", "Market Weight"));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for w in &self.sector_weights {
                output.push_str(&format!("{:<40} {:>13.2}%\n", w.sector, w.weight_pct));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Index Summary: {}\n\n", self.name));
        output.push_str(&format!("**Period:** {}\n\n", self.period_label()));

        output.push_str("## Levels\n\n");
        output.push_str(&format!("- **Base Value:** {:.4}\n", self.base_value));
        output.push_str(&format!("- **Final Value:** {:.4}\n", self.final_value));
        output.push_str(&format!(
            "- **Total Return:** {:.2}%\n",
            self.total_return() * 100.0
        ));
        output.push_str(&format!("- **Trading Days:** {}\n", self.trading_days));
        output.push_str(&format!(
            "- **Deletion Events:** {}\n",
            self.deletion_events
        ));
        output.push_str(&format!("- **Imputed Cells:** {}\n", self.imputed_cells));
        if let (Some(lo), Some(hi)) = (self.divisor_min, self.divisor_max) {
            output.push_str(&format!("- **Divisor Range:** {lo:.6} .. {hi:.6}\n"));
        }
        output.push('\n');

        if !self.segments.is_empty() {
            output.push_str("## Segments\n\n");
            output.push_str("| Segment | Start | End | Days | Base | Final |\n");
            output.push_str("|---------|-------|-----|-----:|-----:|------:|\n");
            for seg in &self.segments {
                output.push_str(&format!(
                    "| {} | {} | {} | {} | {:.4} | {:.4} |\n",
                    seg.name,
                    date_or_dash(seg.start),
                    date_or_dash(seg.end),
                    seg.trading_days,
                    seg.base_value,
                    seg.final_value
                ));
            }
            output.push('\n');
        }

        if !self.sector_weights.is_empty() {
            output.push_str(&format!(
                "## Sector Weights ({})\n\n",
                date_or_dash(self.sector_date)
            ));
            output.push_str("| Sector | Market Weight |\n");
            output.push_str("|--------|--------------:|\n");
            for w in &self.sector_weights {
                output.push_str(&format!("| {} | {:.2}% |\n", w.sector, w.weight_pct));
            }
        }

        output
    }

    fn period_label(&self) -> String {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "no data".to_string(),
        }
    }
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

impl fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Summary: {} ({})", self.name, self.period_label())?;
        writeln!(
            f,
            "  Level: {:.4} -> {:.4} ({:+.2}%)",
            self.base_value,
            self.final_value,
            self.total_return() * 100.0
        )?;
        writeln!(
            f,
            "  Deletions: {}, Imputed cells: {}",
            self.deletion_events, self.imputed_cells
        )?;
        if let Some(top) = self.sector_weights.first() {
            writeln!(f, "  Top sector: {} ({:.2}%)", top.sector, top.weight_pct)?;
        }
        Ok(())
    }
}

impl Exporter for IndexSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => Err(ExportError::InvalidFormat(
                "summary is only available as JSON".to_string(),
            )),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Build a summary from a finished run.
pub fn generate_index_summary(name: &str, run: &IndexRun) -> IndexSummary {
    let series = run.series();

    let segments: Vec<SegmentSummary> = run
        .segments()
        .iter()
        .map(|s| SegmentSummary {
            name: s.name.clone(),
            start: s.series.first().map(|r| r.date),
            end: s.series.last().map(|r| r.date),
            base_value: s.base_value,
            final_value: s.series.final_value().unwrap_or(s.base_value),
            constituents: s.constituents.len(),
            trading_days: s.series.len(),
        })
        .collect();

    let divisor_ranges: Vec<(f64, f64)> = run
        .segments()
        .iter()
        .filter_map(|s| s.series.divisor_range())
        .collect();
    let divisor_min = divisor_ranges.iter().map(|r| r.0).reduce(f64::min);
    let divisor_max = divisor_ranges.iter().map(|r| r.1).reduce(f64::max);

    IndexSummary {
        name: name.to_string(),
        period_start: series.first().map(|r| r.date),
        period_end: series.last().map(|r| r.date),
        base_value: run.base_value(),
        final_value: run.final_value(),
        trading_days: series.len(),
        deletion_events: run.deletion_count(),
        imputed_cells: run.imputed_count(),
        divisor_min,
        divisor_max,
        segments,
        sector_date: run.sector_weights().date(),
        sector_weights: run.sector_weights().weights().to_vec(),
    }
}
