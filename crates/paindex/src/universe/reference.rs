//! Constituent reference files.
//!
//! A reference is a CSV with one row per candidate constituent. Column names
//! vary between vendors, so they are configured per segment. An optional
//! `top_n` keeps only the largest rows by a rank column (typically market
//! cap) before tickers are normalized and deduplicated.

use paindex_engine::{ConstituentRecord, ConstituentSet};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while reading a reference file.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// File could not be opened.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A configured column is absent.
    #[error("Reference {origin} has no column '{column}'")]
    MissingColumn {
        /// File or stream name
        origin: String,
        /// Configured column name
        column: String,
    },
}

fn default_ticker_column() -> String {
    "Ticker".to_string()
}

fn default_float_column() -> String {
    "Equity Float".to_string()
}

fn default_sector_column() -> Option<String> {
    Some("GICS Sector".to_string())
}

/// Column names in a reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceColumns {
    /// Ticker column.
    #[serde(default = "default_ticker_column", rename = "ticker_column")]
    pub ticker: String,
    /// Float (or total) shares column.
    #[serde(default = "default_float_column", rename = "float_column")]
    pub float: String,
    /// Sector column. An empty name, or a column the file lacks, leaves
    /// sectors unknown.
    #[serde(default = "default_sector_column", rename = "sector_column")]
    pub sector: Option<String>,
    /// Column ranked by `top_n`.
    #[serde(default, rename = "rank_column")]
    pub rank: Option<String>,
}

impl Default for ReferenceColumns {
    fn default() -> Self {
        Self {
            ticker: default_ticker_column(),
            float: default_float_column(),
            sector: default_sector_column(),
            rank: None,
        }
    }
}

/// Where to find a reference and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    /// CSV file.
    pub path: PathBuf,
    /// Column names.
    #[serde(flatten)]
    pub columns: ReferenceColumns,
    /// Keep only the N largest rows by the rank column.
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl ReferenceSpec {
    /// Reference at `path` with default columns.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            columns: ReferenceColumns::default(),
            top_n: None,
        }
    }

    /// Load the constituent set.
    pub fn load(&self) -> Result<ConstituentSet, ReferenceError> {
        load_reference(&self.path, &self.columns, self.top_n)
    }
}

#[derive(Debug)]
struct RawRow {
    ticker: String,
    float: Option<f64>,
    sector: Option<String>,
    rank: f64,
}

fn parse_number(field: &str) -> Option<f64> {
    let cleaned: String = field.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load a reference file.
pub fn load_reference(
    path: &Path,
    columns: &ReferenceColumns,
    top_n: Option<usize>,
) -> Result<ConstituentSet, ReferenceError> {
    let file = std::fs::File::open(path)?;
    read_reference(file, &path.display().to_string(), columns, top_n)
}

/// Read a reference from any reader.
///
/// Rows whose float is not a non-negative number are dropped with a warning.
/// With `top_n` set, rows are ranked descending by the rank column (rows
/// without a numeric rank rank last) and the first `top_n` are kept.
pub fn read_reference<R: Read>(
    reader: R,
    origin: &str,
    columns: &ReferenceColumns,
    top_n: Option<usize>,
) -> Result<ConstituentSet, ReferenceError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReferenceError::MissingColumn {
                origin: origin.to_string(),
                column: name.to_string(),
            })
    };

    let ticker_idx = find(&columns.ticker)?;
    let float_idx = find(&columns.float)?;
    let sector_idx = columns
        .sector
        .as_deref()
        .filter(|name| !name.is_empty())
        .and_then(|name| {
            let idx = headers.iter().position(|h| h == name);
            if idx.is_none() {
                warn!(origin, column = name, "reference has no sector column, sectors unknown");
            }
            idx
        });
    let rank_idx = match (&columns.rank, top_n) {
        (Some(rank), _) => Some(find(rank)?),
        (None, Some(_)) => Some(float_idx),
        (None, None) => None,
    };

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        rows.push(RawRow {
            ticker: field(ticker_idx).to_string(),
            float: parse_number(field(float_idx)),
            sector: sector_idx.map(|i| field(i).to_string()),
            rank: rank_idx
                .and_then(|i| parse_number(field(i)))
                .unwrap_or(f64::NEG_INFINITY),
        });
    }
    let total = rows.len();

    if let Some(n) = top_n {
        rows.sort_by(|a, b| b.rank.total_cmp(&a.rank));
        rows.truncate(n);
    }

    let records = rows.into_iter().filter_map(|row| match row.float {
        Some(float) if float >= 0.0 => Some(ConstituentRecord::new(
            &row.ticker,
            float,
            row.sector.as_deref(),
        )),
        _ => {
            warn!(origin, ticker = %row.ticker, "dropping reference row without a usable float");
            None
        }
    });
    let set = ConstituentSet::from_records(records);

    debug!(origin, rows = total, constituents = set.len(), "loaded constituent reference");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "\
Ticker,Equity Float,GICS Sector,Market Cap
AAPL UW Equity,15000000000,Information Technology,3000
MSFT UW Equity,7400000000,Information Technology,3100
XOM UN Equity,\"4,000,000,000\",Energy,450
BAD UN Equity,n/a,Energy,10
JNJ UN Equity,2400000000,Health Care,380
";

    #[test]
    fn test_reads_all_rows() {
        let set =
            read_reference(REFERENCE.as_bytes(), "inline", &ReferenceColumns::default(), None)
                .unwrap();
        assert_eq!(set.tickers(), vec!["AAPL", "MSFT", "XOM", "JNJ"]);
        assert_eq!(set.float_shares("XOM"), Some(4.0e9));
        assert_eq!(set.sector("JNJ"), Some("Health Care"));
    }

    #[test]
    fn test_top_n_by_rank() {
        let columns = ReferenceColumns {
            rank: Some("Market Cap".to_string()),
            ..ReferenceColumns::default()
        };
        let set = read_reference(REFERENCE.as_bytes(), "inline", &columns, Some(3)).unwrap();
        assert_eq!(set.tickers(), vec!["MSFT", "AAPL", "XOM"]);
    }

    #[test]
    fn test_top_n_without_rank_uses_float() {
        let set = read_reference(
            REFERENCE.as_bytes(),
            "inline",
            &ReferenceColumns::default(),
            Some(1),
        )
        .unwrap();
        assert_eq!(set.tickers(), vec!["AAPL"]);
    }

    #[test]
    fn test_missing_column() {
        let columns = ReferenceColumns {
            float: "Shares Out".to_string(),
            ..ReferenceColumns::default()
        };
        let result = read_reference(REFERENCE.as_bytes(), "inline", &columns, None);
        assert!(matches!(
            result,
            Err(ReferenceError::MissingColumn { ref column, .. }) if column == "Shares Out"
        ));
    }

    #[test]
    fn test_missing_sector_column_is_not_fatal() {
        let data = "Ticker,Equity Float,Market Cap\nAAPL UW Equity,15000000000,3000\n";
        let set =
            read_reference(data.as_bytes(), "inline", &ReferenceColumns::default(), None).unwrap();
        assert_eq!(set.tickers(), vec!["AAPL"]);
        assert_eq!(set.sector("AAPL"), None);
    }

    #[test]
    fn test_no_sector_column() {
        let data = "Ticker,Equity Float\nAAPL,1\n";
        let columns = ReferenceColumns {
            sector: None,
            ..ReferenceColumns::default()
        };
        let set = read_reference(data.as_bytes(), "inline", &columns, None).unwrap();
        assert_eq!(set.sector("AAPL"), None);
    }
}
