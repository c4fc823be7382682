//! Date x ticker market-capitalization matrix.

use crate::constituents::ConstituentSet;
use crate::error::{EngineError, Result};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array2, ArrayView1, Axis};
use paindex_data::{PriceObservation, dedup_last_wins};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Dense market-cap matrix: rows are dates (ascending, unique), columns are
/// tickers (unique). Absent cells hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCapMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl MarketCapMatrix {
    /// Assemble a matrix from labels and values.
    pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let expected = (dates.len(), tickers.len());
        if values.dim() != expected {
            return Err(EngineError::ShapeMismatch {
                expected,
                actual: values.dim(),
            });
        }
        Ok(Self {
            dates,
            tickers,
            values,
        })
    }

    /// Matrix with no dates and no tickers.
    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            tickers: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column labels.
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Raw cell values.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of dates.
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Number of tickers.
    pub fn n_tickers(&self) -> usize {
        self.tickers.len()
    }

    /// Whether the matrix has no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column position of a ticker.
    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// One ticker's series.
    pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
        self.ticker_index(ticker).map(|j| self.values.column(j))
    }

    /// Cell value by date and ticker.
    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let i = self.dates.binary_search(&date).ok()?;
        let j = self.ticker_index(ticker)?;
        Some(self.values[[i, j]])
    }

    /// Last date with its row.
    pub fn latest_row(&self) -> Option<(NaiveDate, ArrayView1<'_, f64>)> {
        let last = self.dates.len().checked_sub(1)?;
        Some((self.dates[last], self.values.row(last)))
    }

    /// Per-date sum of cells, treating `NaN` as zero.
    pub fn row_sums(&self) -> Vec<f64> {
        self.values
            .axis_iter(Axis(0))
            .map(|row| row.iter().filter(|v| !v.is_nan()).sum())
            .collect()
    }

    /// Same labels, new cells of identical shape.
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), self.values.dim());
        Self {
            dates: self.dates.clone(),
            tickers: self.tickers.clone(),
            values,
        }
    }

    /// Drop columns that hold no finite value at all.
    fn drop_empty_columns(self) -> Self {
        let keep: Vec<usize> = (0..self.tickers.len())
            .filter(|&j| self.values.column(j).iter().any(|v| !v.is_nan()))
            .collect();
        if keep.len() == self.tickers.len() {
            return self;
        }

        let tickers = keep.iter().map(|&j| self.tickers[j].clone()).collect();
        let values = self.values.select(Axis(1), &keep);
        Self {
            dates: self.dates,
            tickers,
            values,
        }
    }
}

/// Build the market-cap matrix for one window.
///
/// Observations are deduplicated (last wins per date and ticker), inner
/// joined to the constituents on ticker, valued at `close x float_shares`
/// and pivoted with sum aggregation. Observations for tickers outside the
/// constituent set are dropped. No matches yields an empty matrix.
pub fn build_market_cap_matrix(
    observations: &[PriceObservation],
    constituents: &ConstituentSet,
) -> Result<MarketCapMatrix> {
    let observations = dedup_last_wins(observations.to_vec());
    if observations.is_empty() || constituents.is_empty() {
        return Ok(MarketCapMatrix::empty());
    }

    let days: Vec<i32> = observations
        .iter()
        .map(|o| o.date.num_days_from_ce())
        .collect();
    let tickers: Vec<&str> = observations.iter().map(|o| o.ticker.as_str()).collect();
    let closes: Vec<f64> = observations.iter().map(|o| o.close).collect();

    let prices = DataFrame::new(vec![
        Series::new("day".into(), days).into(),
        Series::new("ticker".into(), tickers).into(),
        Series::new("close".into(), closes).into(),
    ])?;

    let caps = prices
        .lazy()
        .join(
            constituents.to_frame()?.lazy(),
            [col("ticker")],
            [col("ticker")],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column((col("close") * col("float_shares")).alias("market_cap"))
        .group_by([col("day"), col("ticker")])
        .agg([col("market_cap").sum()])
        .sort(["day", "ticker"], SortMultipleOptions::default())
        .collect()?;

    let unmatched = observations.len().saturating_sub(caps.height());
    if unmatched > 0 {
        debug!(unmatched, "observations without a constituent were dropped");
    }
    if caps.height() == 0 {
        return Ok(MarketCapMatrix::empty());
    }

    let day_col = caps.column("day")?.i32()?;
    let ticker_col = caps.column("ticker")?.str()?;
    let cap_col = caps.column("market_cap")?.f64()?;

    let mut cells: Vec<(NaiveDate, &str, f64)> = Vec::with_capacity(caps.height());
    for ((day, ticker), cap) in day_col
        .into_iter()
        .zip(ticker_col.into_iter())
        .zip(cap_col.into_iter())
    {
        let (Some(day), Some(ticker)) = (day, ticker) else {
            continue;
        };
        let Some(date) = NaiveDate::from_num_days_from_ce_opt(day) else {
            warn!(day, "skipping row with unrepresentable date");
            continue;
        };
        cells.push((date, ticker, cap.unwrap_or(f64::NAN)));
    }

    let dates: Vec<NaiveDate> = cells
        .iter()
        .map(|c| c.0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let tickers: Vec<String> = cells
        .iter()
        .map(|c| c.1)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut values = Array2::from_elem((dates.len(), tickers.len()), f64::NAN);
    for (date, ticker, cap) in cells {
        if let (Ok(i), Ok(j)) = (
            dates.binary_search(&date),
            tickers.binary_search_by(|t| t.as_str().cmp(ticker)),
        ) {
            values[[i, j]] = cap;
        }
    }

    let matrix = MarketCapMatrix::new(dates, tickers, values)?.drop_empty_columns();
    debug!(
        dates = matrix.n_dates(),
        tickers = matrix.n_tickers(),
        "built market cap matrix"
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constituents::ConstituentRecord;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn constituents() -> ConstituentSet {
        ConstituentSet::from_records(vec![
            ConstituentRecord::new("A", 10.0, Some("Tech")),
            ConstituentRecord::new("B", 20.0, Some("Health")),
        ])
    }

    #[test]
    fn test_pivot_values_and_missing_cells() {
        let obs = vec![
            PriceObservation::new(d(2), "B", 11.0),
            PriceObservation::new(d(1), "A", 5.0),
            PriceObservation::new(d(1), "B", 10.0),
            PriceObservation::new(d(2), "ZZZ", 99.0),
        ];

        let matrix = build_market_cap_matrix(&obs, &constituents()).unwrap();
        assert_eq!(matrix.dates(), &[d(1), d(2)]);
        assert_eq!(matrix.tickers(), &["A".to_string(), "B".to_string()]);
        assert_relative_eq!(matrix.get(d(1), "A").unwrap(), 50.0);
        assert_relative_eq!(matrix.get(d(2), "B").unwrap(), 220.0);
        assert!(matrix.get(d(2), "A").unwrap().is_nan());
        assert_eq!(matrix.row_sums(), vec![250.0, 220.0]);
    }

    #[test]
    fn test_duplicates_resolve_last_wins() {
        let obs = vec![
            PriceObservation::new(d(1), "A", 5.0),
            PriceObservation::new(d(1), "a", 6.0),
        ];
        let matrix = build_market_cap_matrix(&obs, &constituents()).unwrap();
        assert_relative_eq!(matrix.get(d(1), "A").unwrap(), 60.0);
    }

    #[test]
    fn test_no_matches_is_empty() {
        let obs = vec![PriceObservation::new(d(1), "QQQ", 5.0)];
        let matrix = build_market_cap_matrix(&obs, &constituents()).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.n_tickers(), 0);
    }

    #[test]
    fn test_all_nan_columns_dropped() {
        let obs = vec![
            PriceObservation::new(d(1), "A", 5.0),
            PriceObservation::new(d(1), "B", f64::NAN),
        ];
        let matrix = build_market_cap_matrix(&obs, &constituents()).unwrap();
        assert_eq!(matrix.tickers(), &["A".to_string()]);
    }

    #[test]
    fn test_shape_mismatch() {
        let result = MarketCapMatrix::new(vec![d(1)], vec!["A".into()], Array2::zeros((2, 1)));
        assert!(matches!(result, Err(EngineError::ShapeMismatch { .. })));
    }
}
