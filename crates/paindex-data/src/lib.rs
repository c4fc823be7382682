#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/paindex/paindex/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod eod;
pub mod error;
pub mod history;
pub mod observation;
pub mod source;
pub mod yahoo;

pub use error::{DataError, Result};
pub use history::PriceHistory;
pub use observation::{
    DateRange, PriceObservation, dedup_last_wins, normalize_ticker, parse_quote_date,
};
pub use source::PriceSource;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
