//! Yahoo Finance market-data provider.

pub mod quotes;

pub use quotes::{DEFAULT_CONCURRENCY, PriceField, YahooQuoteProvider};
