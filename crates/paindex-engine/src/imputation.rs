//! Deletion imputation.
//!
//! Each ticker column is folded date by date carrying
//! `(last_valid, adjustment_applied)`. A cell is *empty* when it is `NaN`
//! or exactly zero.
//!
//! - empty followed by empty: the ticker looks deleted. The last valid cap
//!   is booked once into `deleted_stock_adjustment` on the first date of the
//!   run; the ticker's own cell is left alone.
//! - empty followed by a value: a one-day gap. The last valid cap is carried
//!   into the cell.
//! - a value resets the state.
//!
//! On the final date there is no next cell, so a trailing empty cell is
//! always imputed, never booked as a deletion.

use crate::matrix::MarketCapMatrix;
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One booked deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionEvent {
    /// Ticker that dropped out.
    pub ticker: String,
    /// First date of the empty run.
    pub date: NaiveDate,
    /// Last valid market cap before the run.
    pub market_cap: f64,
}

/// One cell filled with a carried-forward value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedCell {
    /// Ticker of the filled cell.
    pub ticker: String,
    /// Date of the filled cell.
    pub date: NaiveDate,
    /// Value written.
    pub market_cap: f64,
}

/// Market-cap matrix after imputation plus its helper columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionAdjustedMatrix {
    matrix: MarketCapMatrix,
    deleted_stock_adjustment: Array1<f64>,
    close_mkt_cap: Array1<f64>,
    deletions: Vec<DeletionEvent>,
    imputed: Vec<ImputedCell>,
}

impl DeletionAdjustedMatrix {
    /// Imputed ticker cells.
    pub const fn matrix(&self) -> &MarketCapMatrix {
        &self.matrix
    }

    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        self.matrix.dates()
    }

    /// Per-date deleted-stock adjustment (zero when nothing was deleted).
    pub const fn deleted_stock_adjustment(&self) -> &Array1<f64> {
        &self.deleted_stock_adjustment
    }

    /// Per-date sum of ticker cells, `NaN` counted as zero.
    pub const fn close_mkt_cap(&self) -> &Array1<f64> {
        &self.close_mkt_cap
    }

    /// Booked deletions, ordered by ticker then date.
    pub fn deletions(&self) -> &[DeletionEvent] {
        &self.deletions
    }

    /// Filled cells, ordered by ticker then date.
    pub fn imputed(&self) -> &[ImputedCell] {
        &self.imputed
    }

    /// Whether there are no dates.
    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.matrix.n_dates()
    }
}

/// Output of folding a single column.
#[derive(Debug, Default, PartialEq)]
struct ColumnFold {
    /// `(row, value)` cells to overwrite.
    imputed: Vec<(usize, f64)>,
    /// `(row, value)` adjustments to book.
    adjustments: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FoldState {
    last_valid: Option<f64>,
    adjustment_applied: bool,
}

fn is_empty_cell(value: f64) -> bool {
    value.is_nan() || value == 0.0
}

fn fold_column(column: &[f64]) -> ColumnFold {
    let n = column.len();
    let (_, fold) = column.iter().enumerate().fold(
        (FoldState::default(), ColumnFold::default()),
        |(state, mut out), (i, &cur)| {
            if !is_empty_cell(cur) {
                let state = FoldState {
                    last_valid: Some(cur),
                    adjustment_applied: false,
                };
                return (state, out);
            }

            let Some(last_valid) = state.last_valid.filter(|_| !state.adjustment_applied) else {
                return (state, out);
            };

            let next_empty = (i + 1 < n).then(|| is_empty_cell(column[i + 1]));
            match next_empty {
                Some(true) => out.adjustments.push((i, last_valid)),
                Some(false) | None => out.imputed.push((i, last_valid)),
            }

            let state = FoldState {
                last_valid: state.last_valid,
                adjustment_applied: true,
            };
            (state, out)
        },
    );
    fold
}

/// Run deletion imputation over every ticker column.
///
/// The input is not modified. Applying this to a matrix with no empty cells
/// returns the same cells with a zero adjustment column.
pub fn impute_deletions(matrix: &MarketCapMatrix) -> DeletionAdjustedMatrix {
    let (n_dates, n_tickers) = matrix.values().dim();
    let mut values: Array2<f64> = matrix.values().clone();
    let mut deleted = Array1::<f64>::zeros(n_dates);
    let mut deletions = Vec::new();
    let mut imputed = Vec::new();

    for (j, ticker) in matrix.tickers().iter().enumerate() {
        let column: Vec<f64> = matrix.values().column(j).to_vec();
        let fold = fold_column(&column);

        for (i, value) in fold.imputed {
            values[[i, j]] = value;
            imputed.push(ImputedCell {
                ticker: ticker.clone(),
                date: matrix.dates()[i],
                market_cap: value,
            });
        }
        for (i, value) in fold.adjustments {
            deleted[i] += value;
            deletions.push(DeletionEvent {
                ticker: ticker.clone(),
                date: matrix.dates()[i],
                market_cap: value,
            });
        }
    }

    let close_mkt_cap: Array1<f64> = values
        .rows()
        .into_iter()
        .map(|row| row.iter().filter(|v| !v.is_nan()).sum::<f64>())
        .collect();

    debug!(
        dates = n_dates,
        tickers = n_tickers,
        deletions = deletions.len(),
        imputed = imputed.len(),
        "deletion imputation complete"
    );

    DeletionAdjustedMatrix {
        matrix: matrix.with_values(values),
        deleted_stock_adjustment: deleted,
        close_mkt_cap,
        deletions,
        imputed,
    }
}
