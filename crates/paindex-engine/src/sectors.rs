//! Point-in-time sector weights.

use crate::constituents::ConstituentSet;
use crate::matrix::MarketCapMatrix;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One sector's share of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorWeight {
    /// Sector label.
    pub sector: String,
    /// Share of total market cap, in percent.
    pub weight_pct: f64,
}

/// Sector weights on one date, sorted descending by weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorWeightTable {
    date: Option<NaiveDate>,
    weights: Vec<SectorWeight>,
}

impl SectorWeightTable {
    /// Date the weights refer to.
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Weights, largest first.
    pub fn weights(&self) -> &[SectorWeight] {
        &self.weights
    }

    /// Weight of one sector.
    pub fn get(&self, sector: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.sector == sector)
            .map(|w| w.weight_pct)
    }

    /// Sum of all weights (100 for a non-empty table).
    pub fn total(&self) -> f64 {
        self.weights.iter().map(|w| w.weight_pct).sum()
    }

    /// Number of sectors.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether no sector is present.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate over weights.
    pub fn iter(&self) -> std::slice::Iter<'_, SectorWeight> {
        self.weights.iter()
    }
}

/// Sector weights of the latest row of `matrix`.
///
/// Pass the post-imputation matrix. Tickers with no value on the latest date
/// or without a known sector are left out, and weights are taken against the
/// retained total. Sectors are ordered by weight descending; equal weights
/// keep the order in which the sector was first met across the columns.
pub fn sector_weights(matrix: &MarketCapMatrix, constituents: &ConstituentSet) -> SectorWeightTable {
    let Some((date, row)) = matrix.latest_row() else {
        return SectorWeightTable::default();
    };

    let mut totals: Vec<(String, f64)> = Vec::new();
    for (ticker, &cap) in matrix.tickers().iter().zip(row.iter()) {
        if cap.is_nan() {
            continue;
        }
        let Some(sector) = constituents.sector(ticker) else {
            continue;
        };
        match totals.iter_mut().find(|(s, _)| s == sector) {
            Some((_, total)) => *total += cap,
            None => totals.push((sector.to_string(), cap)),
        }
    }

    let grand_total: f64 = totals.iter().map(|(_, cap)| cap).sum();
    if grand_total == 0.0 || !grand_total.is_finite() {
        if !totals.is_empty() {
            warn!(%date, grand_total, "sector market caps do not sum to a usable total");
        }
        return SectorWeightTable {
            date: Some(date),
            weights: Vec::new(),
        };
    }

    let mut weights: Vec<SectorWeight> = totals
        .into_iter()
        .map(|(sector, cap)| SectorWeight {
            sector,
            weight_pct: cap / grand_total * 100.0,
        })
        .collect();
    weights.sort_by(|a, b| b.weight_pct.total_cmp(&a.weight_pct));

    SectorWeightTable {
        date: Some(date),
        weights,
    }
}
