//! Snapshot store location.
//!
//! The store path comes from the config's `[cache]` section, falling back to
//! a platform-specific default.

use paindex::IndexConfig;
use paindex::pipeline::default_cache_path;
use paindex_data::cache::SqliteCache;
use paindex_data::error::DataError;
use std::path::PathBuf;

/// Get the default cache database path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/paindex/`
/// - macOS: `~/Library/Caches/paindex/`
/// - Windows: `%LOCALAPPDATA%\paindex\`
fn default_path() -> PathBuf {
    default_cache_path(&dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// Get the configured cache path.
pub(crate) fn get_cache_path(config: &IndexConfig) -> PathBuf {
    config.cache.path.clone().unwrap_or_else(default_path)
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache(config: &IndexConfig) -> Result<SqliteCache, DataError> {
    let cache_path = get_cache_path(config);

    // Ensure parent directory exists
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    SqliteCache::new(&cache_path)
}
