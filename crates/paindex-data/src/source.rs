//! The single price-source capability the index pipeline depends on.

use crate::error::Result;
use crate::observation::{DateRange, PriceObservation};
use std::future::Future;

/// Anything that can supply daily closes for a set of tickers over a window.
///
/// Implemented by the end-of-day file feed, the market-data provider and the
/// in-memory [`PriceHistory`](crate::PriceHistory). The index engine only ever
/// sees the returned observations, never the concrete source.
pub trait PriceSource {
    /// Short label used in log lines.
    fn name(&self) -> &str;

    /// Fetch closes for `tickers` within `range`.
    ///
    /// An empty `tickers` slice means "every ticker the source knows about".
    /// Tickers are compared after normalization. Returned observations may
    /// contain duplicate `(date, ticker)` pairs; callers resolve them with
    /// [`dedup_last_wins`](crate::dedup_last_wins).
    fn fetch(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PriceObservation>>> + Send;
}
