//! Persistent storage for daily price snapshots.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};
