#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/paindex/paindex/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod universe;

// Re-export main types from sub-crates
pub use paindex_data as data;
pub use paindex_engine as engine;
pub use paindex_output as output;

pub use config::{CacheConfig, ConfigError, EodConfig, IndexConfig, OutputConfig, SegmentConfig};
pub use pipeline::{
    PipelineError, build_engine, load_history, load_segments, reference_tickers, run_index,
    write_outputs,
};
pub use universe::{ReferenceColumns, ReferenceError, ReferenceSpec};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
