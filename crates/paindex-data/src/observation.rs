//! Daily close observations and the helpers every feed shares.

use crate::error::{DataError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Date formats accepted for `quote_date` tokens, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Datetime formats accepted for `quote_date` tokens carrying a time part.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Normalize a ticker: trim, keep the first whitespace-delimited token, uppercase.
///
/// Bloomberg-style identifiers such as `"msft us equity"` reduce to `"MSFT"`.
/// Returns an empty string when the input holds no token.
pub fn normalize_ticker(raw: &str) -> String {
    raw.split_whitespace()
        .next()
        .map(str::to_uppercase)
        .unwrap_or_default()
}

/// Parse a quote date token.
///
/// Returns `None` for anything that matches none of the accepted formats;
/// callers skip such rows with a warning.
pub fn parse_quote_date(token: &str) -> Option<NaiveDate> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(token, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// One end-of-day close for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Trading date.
    pub date: NaiveDate,
    /// Normalized ticker.
    pub ticker: String,
    /// Closing price.
    pub close: f64,
}

impl PriceObservation {
    /// Create an observation, normalizing the ticker.
    pub fn new(date: NaiveDate, ticker: &str, close: f64) -> Self {
        Self {
            date,
            ticker: normalize_ticker(ticker),
            close,
        }
    }

    /// Build an observation from raw feed tokens.
    ///
    /// Returns `None` when the date does not parse, the ticker is blank or
    /// the close is not a finite number.
    pub fn from_raw(quote_date: &str, symbol: &str, close: &str) -> Option<Self> {
        let date = parse_quote_date(quote_date)?;
        let ticker = normalize_ticker(symbol);
        if ticker.is_empty() {
            return None;
        }
        let close = close.trim().parse::<f64>().ok().filter(|c| c.is_finite())?;
        Some(Self {
            date,
            ticker,
            close,
        })
    }
}

/// Collapse duplicate `(date, ticker)` pairs, keeping the last one in input order.
///
/// The surviving observations keep the position of their first occurrence.
pub fn dedup_last_wins(observations: Vec<PriceObservation>) -> Vec<PriceObservation> {
    let mut slot: HashMap<(NaiveDate, String), usize> = HashMap::new();
    let mut out: Vec<PriceObservation> = Vec::with_capacity(observations.len());

    for obs in observations {
        let key = (obs.date, obs.ticker.clone());
        match slot.get(&key) {
            Some(&idx) => out[idx] = obs,
            None => {
                slot.insert(key, out.len());
                out.push(obs);
            }
        }
    }

    out
}

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Range covering every date a price feed can plausibly carry.
    ///
    /// Bounded to four-digit years so the range survives ISO-8601 text
    /// comparison in storage and conversion to provider timestamps.
    pub fn unbounded() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(" msft us equity ", "MSFT")]
    #[case("MSFT", "MSFT")]
    #[case("brk/b UN Equity", "BRK/B")]
    #[case("aapl", "AAPL")]
    #[case("   ", "")]
    fn test_normalize_ticker(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_ticker(raw), expected);
    }

    #[rstest]
    #[case("2024-07-01", Some(d(2024, 7, 1)))]
    #[case("07/01/2024", Some(d(2024, 7, 1)))]
    #[case("2024-07-01 16:00:00", Some(d(2024, 7, 1)))]
    #[case("2024-13-01", None)]
    #[case("not a date", None)]
    #[case("", None)]
    fn test_parse_quote_date(#[case] token: &str, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_quote_date(token), expected);
    }

    #[test]
    fn test_from_raw_rejects_bad_rows() {
        assert!(PriceObservation::from_raw("2024-07-01", "AAPL", "191.5").is_some());
        assert!(PriceObservation::from_raw("bad", "AAPL", "191.5").is_none());
        assert!(PriceObservation::from_raw("2024-07-01", " ", "191.5").is_none());
        assert!(PriceObservation::from_raw("2024-07-01", "AAPL", "").is_none());
        assert!(PriceObservation::from_raw("2024-07-01", "AAPL", "NaN").is_none());
    }

    #[test]
    fn test_dedup_last_wins() {
        let obs = vec![
            PriceObservation::new(d(2024, 1, 2), "AAPL", 1.0),
            PriceObservation::new(d(2024, 1, 2), "MSFT", 2.0),
            PriceObservation::new(d(2024, 1, 2), "aapl", 3.0),
        ];

        let deduped = dedup_last_wins(obs);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].ticker, "AAPL");
        assert_eq!(deduped[0].close, 3.0);
        assert_eq!(deduped[1].ticker, "MSFT");
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(range.contains(d(2024, 1, 1)));
        assert!(range.contains(d(2024, 1, 31)));
        assert!(!range.contains(d(2024, 2, 1)));

        let result = DateRange::new(d(2024, 2, 1), d(2024, 1, 1));
        assert!(matches!(result, Err(DataError::InvalidDateRange { .. })));

        assert!(DateRange::unbounded().contains(d(1999, 12, 31)));
    }
}
