#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/paindex/paindex/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod summary;

pub use export::{
    ExportError, ExportFormat, Exporter, IndexAudit, IndexAuditRecord, IndexValueRecord,
    SectorWeightRecord,
};
pub use summary::{IndexSummary, SegmentSummary, generate_index_summary};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
