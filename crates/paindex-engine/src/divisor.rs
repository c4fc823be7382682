//! Chained-divisor index level recursion.

use crate::error::{EngineError, Result};
use crate::imputation::DeletionAdjustedMatrix;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Index state for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    /// Trading date.
    pub date: NaiveDate,
    /// Sum of constituent market caps.
    pub total_market_cap: f64,
    /// Previous total less today's deleted-stock adjustment.
    pub adjusted_market_cap: f64,
    /// Chained divisor.
    pub divisor: f64,
    /// Market cap over divisor, before rebasing.
    pub gross_index_level: f64,
    /// Published level.
    pub index_value: f64,
}

/// Ordered index rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    rows: Vec<IndexRow>,
}

impl IndexSeries {
    /// Wrap rows that are already in date order.
    pub const fn from_rows(rows: Vec<IndexRow>) -> Self {
        Self { rows }
    }

    /// Rows in date order.
    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    /// Consume into rows.
    pub fn into_rows(self) -> Vec<IndexRow> {
        self.rows
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row.
    pub fn first(&self) -> Option<&IndexRow> {
        self.rows.first()
    }

    /// Last row.
    pub fn last(&self) -> Option<&IndexRow> {
        self.rows.last()
    }

    /// Level on the last date.
    pub fn final_value(&self) -> Option<f64> {
        self.last().map(|r| r.index_value)
    }

    /// `(date, index_value)` pairs.
    pub fn index_values(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|r| (r.date, r.index_value)).collect()
    }

    /// Smallest and largest divisor.
    pub fn divisor_range(&self) -> Option<(f64, f64)> {
        let first = self.rows.first()?.divisor;
        Some(self.rows.iter().fold((first, first), |(lo, hi), r| {
            (lo.min(r.divisor), hi.max(r.divisor))
        }))
    }

    /// Iterate over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexRow> {
        self.rows.iter()
    }

    /// Append `other`, dropping its first row when it repeats our last date.
    pub fn chain(&mut self, other: Self) {
        let seam = self.last().map(|r| r.date);
        let mut rows = other.rows.into_iter().peekable();
        if let (Some(seam), Some(first)) = (seam, rows.peek()) {
            if first.date == seam {
                rows.next();
            }
        }
        self.rows.extend(rows);
    }
}

impl<'a> IntoIterator for &'a IndexSeries {
    type Item = &'a IndexRow;
    type IntoIter = std::slice::Iter<'a, IndexRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Validate a base index value.
pub fn check_base_value(base_value: f64) -> Result<f64> {
    if base_value.is_finite() && base_value > 0.0 {
        Ok(base_value)
    } else {
        Err(EngineError::InvalidBaseValue(base_value))
    }
}

/// Run the divisor recursion over raw per-date inputs.
///
/// `close_mkt_cap` and `deleted` must be aligned with `dates`. Empty input
/// gives an empty series. A zero previous market cap, a zero base level or
/// any non-finite intermediate aborts with
/// [`EngineError::DegenerateSegment`].
pub fn compute_levels(
    segment: &str,
    dates: &[NaiveDate],
    close_mkt_cap: &[f64],
    deleted: &[f64],
    base_value: f64,
) -> Result<IndexSeries> {
    let base_value = check_base_value(base_value)?;
    let n = dates.len();
    if close_mkt_cap.len() != n || deleted.len() != n {
        return Err(EngineError::ShapeMismatch {
            expected: (n, 2),
            actual: (close_mkt_cap.len(), deleted.len()),
        });
    }
    if n == 0 {
        return Ok(IndexSeries::default());
    }

    let degenerate = |date: NaiveDate, reason: String| EngineError::DegenerateSegment {
        segment: segment.to_string(),
        date,
        reason,
    };

    let gross0 = close_mkt_cap[0];
    if gross0 == 0.0 || !gross0.is_finite() {
        return Err(degenerate(
            dates[0],
            format!("base gross index level is {gross0}"),
        ));
    }
    let rebase = gross0 / base_value;

    let mut rows = Vec::with_capacity(n);
    rows.push(IndexRow {
        date: dates[0],
        total_market_cap: gross0,
        adjusted_market_cap: gross0 + deleted[0],
        divisor: 1.0,
        gross_index_level: gross0,
        index_value: gross0 / rebase,
    });

    for i in 1..n {
        let prev_close = close_mkt_cap[i - 1];
        if prev_close == 0.0 {
            return Err(degenerate(
                dates[i],
                "previous close market cap is zero".to_string(),
            ));
        }

        let adjusted = prev_close - deleted[i];
        let divisor = adjusted / prev_close * rows[i - 1].divisor;
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(degenerate(
                dates[i],
                format!("divisor became {divisor} (adjusted market cap {adjusted})"),
            ));
        }

        let gross = close_mkt_cap[i] / divisor;
        let index_value = gross / rebase;
        if !gross.is_finite() || !index_value.is_finite() {
            return Err(degenerate(dates[i], "non-finite index level".to_string()));
        }

        rows.push(IndexRow {
            date: dates[i],
            total_market_cap: close_mkt_cap[i],
            adjusted_market_cap: adjusted,
            divisor,
            gross_index_level: gross,
            index_value,
        });
    }

    debug!(
        segment,
        rows = rows.len(),
        base_value,
        final_value = rows.last().map(|r| r.index_value),
        "computed index levels"
    );

    Ok(IndexSeries::from_rows(rows))
}

/// Compute the index series for an imputed matrix.
pub fn compute_index_series(
    segment: &str,
    adjusted: &DeletionAdjustedMatrix,
    base_value: f64,
) -> Result<IndexSeries> {
    let close: Vec<f64> = adjusted.close_mkt_cap().to_vec();
    let deleted: Vec<f64> = adjusted.deleted_stock_adjustment().to_vec();
    compute_levels(segment, adjusted.dates(), &close, &deleted, base_value)
}
