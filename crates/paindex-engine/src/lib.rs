#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/paindex/paindex/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod constituents;
pub mod divisor;
pub mod engine;
pub mod error;
pub mod imputation;
pub mod matrix;
pub mod sectors;

pub use constituents::{ConstituentRecord, ConstituentSet};
pub use divisor::{IndexRow, IndexSeries, check_base_value, compute_index_series, compute_levels};
pub use engine::{IndexEngine, IndexRun, Segment, SegmentResult, run_segment};
pub use error::{EngineError, Result};
pub use imputation::{DeletionAdjustedMatrix, DeletionEvent, ImputedCell, impute_deletions};
pub use matrix::{MarketCapMatrix, build_market_cap_matrix};
pub use sectors::{SectorWeight, SectorWeightTable, sector_weights};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
