//! Daily close fetching from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::observation::{DateRange, PriceObservation, normalize_ticker};
use crate::source::PriceSource;
use chrono::{DateTime, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

/// Default number of concurrent ticker requests.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Which quote field is treated as the close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Raw close.
    #[default]
    Close,
    /// Split/dividend adjusted close.
    AdjustedClose,
}

impl PriceField {
    /// Parse a provider field name.
    ///
    /// Anything other than the two recognized names is rejected, since no
    /// substitute field is safe to use.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "close" => Ok(Self::Close),
            "adjclose" | "adj_close" | "adjusted_close" => Ok(Self::AdjustedClose),
            _ => Err(DataError::AmbiguousPriceColumn {
                origin: "yahoo".to_string(),
                columns: vec![name.to_string()],
            }),
        }
    }
}

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
    concurrency: usize,
    field: PriceField,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("concurrency", &self.concurrency)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with default rate limiting (1 req/sec per worker).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a provider with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
            concurrency: DEFAULT_CONCURRENCY,
            field: PriceField::default(),
        })
    }

    /// Use `field` as the close price.
    pub const fn with_field(mut self, field: PriceField) -> Self {
        self.field = field;
        self
    }

    /// Limit the number of in-flight ticker requests.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch daily closes for a single symbol.
    ///
    /// # Arguments
    /// * `symbol` - The ticker symbol (e.g., "AAPL")
    /// * `range` - Inclusive date window
    pub async fn fetch_closes(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<PriceObservation>> {
        let symbol = normalize_ticker(symbol);
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset(range.start)?;
        // Yahoo treats the end bound as exclusive.
        let end_time = to_offset(range.end.succ_opt().unwrap_or(range.end))?;

        let response = self
            .provider
            .get_quote_history(&symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol,
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let observations = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                let close = match self.field {
                    PriceField::Close => q.close,
                    PriceField::AdjustedClose => q.adjclose,
                };
                (range.contains(date) && close.is_finite()).then(|| PriceObservation {
                    date,
                    ticker: symbol.clone(),
                    close,
                })
            })
            .collect();

        sleep(self.rate_limit_delay).await;

        Ok(observations)
    }

    /// Fetch daily closes for many symbols with bounded concurrency.
    ///
    /// Failures for individual symbols are logged and skipped; an error is
    /// returned only when nothing could be fetched at all.
    pub async fn fetch_batch(
        &self,
        symbols: &[String],
        range: DateRange,
    ) -> Result<Vec<PriceObservation>> {
        let results: Vec<(String, Result<Vec<PriceObservation>>)> = stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                let result = self.fetch_closes(&symbol, range).await;
                (symbol, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut observations = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(obs) => {
                    debug!(symbol, rows = obs.len(), "fetched closes");
                    observations.extend(obs);
                }
                Err(e) => warn!(symbol, error = %e, "failed to fetch closes"),
            }
        }

        if observations.is_empty() && !symbols.is_empty() {
            return Err(DataError::MissingData {
                symbol: "batch".to_string(),
                reason: "No data fetched for any symbol".to_string(),
            });
        }

        observations.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        Ok(observations)
    }
}

impl PriceSource for YahooQuoteProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PriceObservation>>> + Send {
        self.fetch_batch(tickers, range)
    }
}

fn to_offset(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DataError::TimeConversion(format!("invalid midnight for {date}")))?
        .and_utc()
        .timestamp();
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}
