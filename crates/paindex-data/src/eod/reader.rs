//! Parsing of a single daily EOD table.

use crate::error::{DataError, Result};
use crate::observation::PriceObservation;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Date column of the daily feed.
pub const DATE_COLUMN: &str = "quote_date";

/// Symbol column of the daily feed.
pub const SYMBOL_COLUMN: &str = "underlying_symbol";

/// Recognized close-price columns, in order of preference.
pub const CLOSE_COLUMNS: &[&str] = &["close", "Close", "close_price", "last"];

/// Read one daily EOD file.
pub fn read_eod_csv(path: &Path) -> Result<Vec<PriceObservation>> {
    let file = std::fs::File::open(path)?;
    read_eod_reader(file, &path.display().to_string())
}

/// Read a daily EOD table from any reader.
///
/// `origin` names the table in errors and warnings. Rows with an unparsable
/// date, a blank symbol or a non-numeric close are skipped with a warning;
/// a table without a recognized close column is rejected outright.
pub fn read_eod_reader<R: Read>(reader: R, origin: &str) -> Result<Vec<PriceObservation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let date_idx = position(DATE_COLUMN).ok_or_else(|| DataError::MissingColumn {
        origin: origin.to_string(),
        column: DATE_COLUMN.to_string(),
    })?;
    let symbol_idx = position(SYMBOL_COLUMN).ok_or_else(|| DataError::MissingColumn {
        origin: origin.to_string(),
        column: SYMBOL_COLUMN.to_string(),
    })?;
    let close_idx = CLOSE_COLUMNS
        .iter()
        .find_map(|name| position(name))
        .ok_or_else(|| DataError::AmbiguousPriceColumn {
            origin: origin.to_string(),
            columns: headers.clone(),
        })?;

    let mut observations = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        match PriceObservation::from_raw(field(date_idx), field(symbol_idx), field(close_idx)) {
            Some(obs) => observations.push(obs),
            None => {
                skipped += 1;
                warn!(
                    origin,
                    line = line + 2,
                    quote_date = field(date_idx),
                    symbol = field(symbol_idx),
                    "skipping unusable EOD row"
                );
            }
        }
    }

    if skipped > 0 {
        warn!(origin, skipped, kept = observations.len(), "EOD table had skipped rows");
    }

    Ok(observations)
}
