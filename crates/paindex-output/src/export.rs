//! Export of index results.
//!
//! CSV and JSON writers for the index series (`Date, Index Value`), the
//! extended audit trail, sector weights (`Sector, Market Weight`) and the
//! deletion-adjusted market-cap matrix.

use chrono::NaiveDate;
use paindex_engine::{DeletionAdjustedMatrix, IndexRow, IndexSeries, SectorWeightTable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "prettyjson" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Published index level for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexValueRecord {
    /// Trading date.
    #[serde(rename = "Date")]
    pub date: NaiveDate,

    /// Index level.
    #[serde(rename = "Index Value")]
    pub index_value: f64,
}

/// Full divisor state for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexAuditRecord {
    /// Trading date.
    #[serde(rename = "Date")]
    pub date: NaiveDate,

    /// Sum of constituent market caps.
    #[serde(rename = "Total Market Cap")]
    pub total_market_cap: f64,

    /// Previous total less deletions.
    #[serde(rename = "Adjusted Market Cap")]
    pub adjusted_market_cap: f64,

    /// Chained divisor.
    #[serde(rename = "Divisor")]
    pub divisor: f64,

    /// Level before rebasing.
    #[serde(rename = "Gross Index Level")]
    pub gross_index_level: f64,

    /// Published level.
    #[serde(rename = "Index Value")]
    pub index_value: f64,
}

impl From<&IndexRow> for IndexValueRecord {
    fn from(row: &IndexRow) -> Self {
        Self {
            date: row.date,
            index_value: row.index_value,
        }
    }
}

impl From<&IndexRow> for IndexAuditRecord {
    fn from(row: &IndexRow) -> Self {
        Self {
            date: row.date,
            total_market_cap: row.total_market_cap,
            adjusted_market_cap: row.adjusted_market_cap,
            divisor: row.divisor,
            gross_index_level: row.gross_index_level,
            index_value: row.index_value,
        }
    }
}

/// One row of the sector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWeightRecord {
    /// Sector label.
    #[serde(rename = "Sector")]
    pub sector: String,

    /// Share of total market cap, in percent.
    #[serde(rename = "Market Weight")]
    pub market_weight: f64,
}

/// Extended export of an index series with divisor columns.
#[derive(Debug, Clone, Copy)]
pub struct IndexAudit<'a>(pub &'a IndexSeries);

fn serialize_rows<T: Serialize>(records: &[T], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            for record in records {
                wtr.serialize(record)?;
            }
            csv_into_string(wtr)
        }
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn csv_into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

impl Exporter for IndexSeries {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let records: Vec<IndexValueRecord> = self.iter().map(IndexValueRecord::from).collect();
        serialize_rows(&records, format)
    }
}

impl Exporter for IndexAudit<'_> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let records: Vec<IndexAuditRecord> = self.0.iter().map(IndexAuditRecord::from).collect();
        serialize_rows(&records, format)
    }
}

impl Exporter for SectorWeightTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let records: Vec<SectorWeightRecord> = self
            .iter()
            .map(|w| SectorWeightRecord {
                sector: w.sector.clone(),
                market_weight: w.weight_pct,
            })
            .collect();
        serialize_rows(&records, format)
    }
}

/// JSON shape of one matrix row.
#[derive(Debug, Serialize)]
struct MatrixRowJson<'a> {
    date: NaiveDate,
    market_caps: Vec<(&'a str, Option<f64>)>,
    deleted_stock_adjustment: f64,
    close_mkt_cap: f64,
}

impl Exporter for DeletionAdjustedMatrix {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let matrix = self.matrix();
        let values = matrix.values();
        let deleted = self.deleted_stock_adjustment();
        let close = self.close_mkt_cap();

        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["date".to_string()];
                header.extend(matrix.tickers().iter().cloned());
                header.push("deleted_stock_adjustment".to_string());
                header.push("close_mkt_cap".to_string());
                wtr.write_record(&header)?;

                for (i, date) in matrix.dates().iter().enumerate() {
                    let mut record = vec![date.to_string()];
                    record.extend(values.row(i).iter().map(|v| {
                        if v.is_nan() {
                            String::new()
                        } else {
                            v.to_string()
                        }
                    }));
                    record.push(deleted[i].to_string());
                    record.push(close[i].to_string());
                    wtr.write_record(&record)?;
                }
                csv_into_string(wtr)
            }
            ExportFormat::Json | ExportFormat::PrettyJson => {
                let rows: Vec<MatrixRowJson<'_>> = matrix
                    .dates()
                    .iter()
                    .enumerate()
                    .map(|(i, &date)| MatrixRowJson {
                        date,
                        market_caps: matrix
                            .tickers()
                            .iter()
                            .zip(values.row(i).iter())
                            .map(|(t, &v)| (t.as_str(), (!v.is_nan()).then_some(v)))
                            .collect(),
                        deleted_stock_adjustment: deleted[i],
                        close_mkt_cap: close[i],
                    })
                    .collect();
                if format == ExportFormat::Json {
                    Ok(serde_json::to_string(&rows)?)
                } else {
                    Ok(serde_json::to_string_pretty(&rows)?)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paindex_engine::{
        ConstituentRecord, ConstituentSet, IndexRow, MarketCapMatrix, impute_deletions,
        sector_weights,
    };
    use rstest::rstest;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn series() -> IndexSeries {
        IndexSeries::from_rows(vec![
            IndexRow {
                date: d(1),
                total_market_cap: 250.0,
                adjusted_market_cap: 250.0,
                divisor: 1.0,
                gross_index_level: 250.0,
                index_value: 100.0,
            },
            IndexRow {
                date: d(2),
                total_market_cap: 275.0,
                adjusted_market_cap: 250.0,
                divisor: 1.0,
                gross_index_level: 275.0,
                index_value: 110.0,
            },
        ])
    }

    fn adjusted() -> DeletionAdjustedMatrix {
        let matrix = MarketCapMatrix::new(
            vec![d(1), d(2)],
            vec!["A".into(), "B".into()],
            ndarray::Array2::from_shape_vec((2, 2), vec![50.0, 200.0, f64::NAN, 200.0]).unwrap(),
        )
        .unwrap();
        impute_deletions(&matrix)
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            "xlsx".parse::<ExportFormat>(),
            Err(ExportError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_index_series_csv() {
        let csv = series().export_to_string(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Index Value"));
        assert_eq!(lines.next(), Some("2024-07-01,100.0"));
        assert_eq!(lines.next(), Some("2024-07-02,110.0"));
    }

    #[test]
    fn test_index_series_json() {
        let json = series().export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"Date\":\"2024-07-01\""));
        assert!(json.contains("\"Index Value\":110.0"));
    }

    #[test]
    fn test_audit_csv_header() {
        let series = series();
        let csv = IndexAudit(&series)
            .export_to_string(ExportFormat::Csv)
            .unwrap();
        assert!(csv.starts_with(
            "Date,Total Market Cap,Adjusted Market Cap,Divisor,Gross Index Level,Index Value"
        ));
    }

    #[test]
    fn test_sector_weights_csv() {
        let constituents = ConstituentSet::from_records(vec![
            ConstituentRecord::new("A", 1.0, Some("Tech")),
            ConstituentRecord::new("B", 1.0, Some("Health")),
        ]);
        let table = sector_weights(adjusted().matrix(), &constituents);

        let csv = table.export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Sector,Market Weight");
        assert_eq!(lines[1], "Health,80.0");
        assert_eq!(lines[2], "Tech,20.0");
    }

    #[test]
    fn test_matrix_csv() {
        let csv = adjusted().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,A,B,deleted_stock_adjustment,close_mkt_cap");
        assert_eq!(lines[1], "2024-07-01,50,200,0,250");
        // A is carried forward on the final date.
        assert_eq!(lines[2], "2024-07-02,50,200,0,250");
    }

    #[test]
    fn test_matrix_json_nulls() {
        let matrix = MarketCapMatrix::new(
            vec![d(1), d(2), d(3)],
            vec!["A".into()],
            ndarray::Array2::from_shape_vec((3, 1), vec![f64::NAN, f64::NAN, 5.0]).unwrap(),
        )
        .unwrap();
        let json = impute_deletions(&matrix)
            .export_to_string(ExportFormat::Json)
            .unwrap();
        assert!(json.contains("[\"A\",null]"));
    }

    #[test]
    fn test_export_to_file() {
        let path = std::env::temp_dir().join(format!(
            "paindex_index_{}.{}",
            std::process::id(),
            ExportFormat::Csv.extension()
        ));
        series().export_to_file(&path, ExportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Date,Index Value"));
        std::fs::remove_file(path).ok();
    }
}
