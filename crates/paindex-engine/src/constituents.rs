//! Constituent reference: ticker to float shares and sector.

use paindex_data::normalize_ticker;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One index constituent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentRecord {
    /// Normalized ticker.
    pub ticker: String,
    /// Shares available for index weighting.
    pub float_shares: f64,
    /// Sector label, if known.
    pub sector: Option<String>,
}

impl ConstituentRecord {
    /// Create a record, normalizing the ticker and trimming the sector.
    ///
    /// A blank sector is treated as unknown.
    pub fn new(ticker: &str, float_shares: f64, sector: Option<&str>) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            float_shares,
            sector: sector
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Immutable set of constituents keyed by normalized ticker.
#[derive(Debug, Clone, Default)]
pub struct ConstituentSet {
    records: Vec<ConstituentRecord>,
    positions: HashMap<String, usize>,
}

impl ConstituentSet {
    /// Build a set from records.
    ///
    /// Records with a blank ticker or a negative/non-finite float are dropped
    /// with a warning. Duplicate tickers collapse to the first occurrence.
    pub fn from_records(records: impl IntoIterator<Item = ConstituentRecord>) -> Self {
        let mut set = Self::default();

        for mut record in records {
            record.ticker = normalize_ticker(&record.ticker);
            if record.ticker.is_empty() {
                warn!("dropping constituent with blank ticker");
                continue;
            }
            if !record.float_shares.is_finite() || record.float_shares < 0.0 {
                warn!(
                    ticker = %record.ticker,
                    float_shares = record.float_shares,
                    "dropping constituent with invalid float"
                );
                continue;
            }
            if set.positions.contains_key(&record.ticker) {
                debug!(ticker = %record.ticker, "ignoring duplicate constituent");
                continue;
            }
            set.positions.insert(record.ticker.clone(), set.records.len());
            set.records.push(record);
        }

        set
    }

    /// Look up a constituent by (raw or normalized) ticker.
    pub fn get(&self, ticker: &str) -> Option<&ConstituentRecord> {
        self.positions
            .get(&normalize_ticker(ticker))
            .map(|&i| &self.records[i])
    }

    /// Float shares for a ticker.
    pub fn float_shares(&self, ticker: &str) -> Option<f64> {
        self.get(ticker).map(|r| r.float_shares)
    }

    /// Sector for a ticker.
    pub fn sector(&self, ticker: &str) -> Option<&str> {
        self.get(ticker).and_then(|r| r.sector.as_deref())
    }

    /// Tickers in load order.
    pub fn tickers(&self) -> Vec<String> {
        self.records.iter().map(|r| r.ticker.clone()).collect()
    }

    /// Records in load order.
    pub fn records(&self) -> &[ConstituentRecord] {
        &self.records
    }

    /// Number of constituents.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `[ticker, float_shares]` frame used for the price join.
    pub(crate) fn to_frame(&self) -> PolarsResult<DataFrame> {
        let tickers: Vec<&str> = self.records.iter().map(|r| r.ticker.as_str()).collect();
        let floats: Vec<f64> = self.records.iter().map(|r| r.float_shares).collect();

        DataFrame::new(vec![
            Series::new("ticker".into(), tickers).into(),
            Series::new("float_shares".into(), floats).into(),
        ])
    }
}

impl FromIterator<ConstituentRecord> for ConstituentSet {
    fn from_iter<I: IntoIterator<Item = ConstituentRecord>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
