//! Daily file naming and directory listing.

use crate::error::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A daily EOD file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EodFile {
    /// Trading date encoded in the file name.
    pub date: NaiveDate,
    /// Full path to the file.
    pub path: PathBuf,
}

/// Extract the trading date from a daily file name.
///
/// Accepts `<prefix><YYYY-MM-DD>.csv`. Summary files (any name containing
/// `Summaries`) and names with an unparsable date token yield `None`.
pub fn parse_file_date(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    if file_name.contains("Summaries") {
        return None;
    }
    let token = file_name.strip_prefix(prefix)?.strip_suffix(".csv")?;
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

/// List the daily files in `dir`, sorted by date ascending.
///
/// Files that carry the prefix but whose date does not parse are skipped
/// with a warning. When two files map to the same date the later name in
/// lexical order wins.
pub fn list_eod_files(dir: &Path, prefix: &str) -> Result<Vec<EodFile>> {
    let mut files: Vec<EodFile> = Vec::new();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".csv") {
            continue;
        }
        match parse_file_date(name, prefix) {
            Some(date) => {
                files.retain(|f| f.date != date);
                files.push(EodFile { date, path });
            }
            None if name.contains("Summaries") => {}
            None => warn!(file = name, "skipping EOD file with unparsable date"),
        }
    }

    files.sort_by_key(|f| f.date);
    Ok(files)
}
