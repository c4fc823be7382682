//! Glue between the CLI and the library crates.
//!
//! This module locates the snapshot store and runs the long-running
//! ingest and fetch loops with progress reporting.

pub(crate) mod cache_manager;
pub(crate) mod data_pipeline;
