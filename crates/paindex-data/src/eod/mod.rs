//! End-of-day file feed.
//!
//! The feed delivers one CSV per trading day named `<prefix><YYYY-MM-DD>.csv`
//! (by default `UnderlyingEOD_2024-07-01.csv`) with at least the columns
//! `quote_date`, `underlying_symbol` and a close field. Remote retrieval and
//! archive extraction happen outside this crate; this module starts from a
//! directory of extracted files.

pub mod file;
pub mod reader;

pub use file::{EodFile, list_eod_files, parse_file_date};
pub use reader::{CLOSE_COLUMNS, read_eod_csv, read_eod_reader};

use crate::error::Result;
use crate::history::PriceHistory;
use crate::observation::{DateRange, PriceObservation, normalize_ticker};
use crate::source::PriceSource;
use std::collections::HashSet;
use std::future::{Future, ready};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default file-name prefix of the daily feed.
pub const DEFAULT_PREFIX: &str = "UnderlyingEOD_";

/// Price source backed by a directory of daily EOD files.
#[derive(Debug, Clone)]
pub struct EodDirectorySource {
    dir: PathBuf,
    prefix: String,
}

impl EodDirectorySource {
    /// Create a source over `dir` with the default file prefix.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_prefix(dir, DEFAULT_PREFIX)
    }

    /// Create a source over `dir` with a custom file prefix.
    pub fn with_prefix(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files in the directory whose date falls inside `range`, oldest first.
    pub fn files(&self, range: DateRange) -> Result<Vec<EodFile>> {
        Ok(list_eod_files(&self.dir, &self.prefix)?
            .into_iter()
            .filter(|f| range.contains(f.date))
            .collect())
    }

    /// Load every file in `range` into a [`PriceHistory`], one table per file.
    ///
    /// A file whose close column cannot be identified aborts the load, since
    /// no substitute field is safe to use.
    pub fn load_history(&self, range: DateRange) -> Result<PriceHistory> {
        let mut history = PriceHistory::new();
        for file in self.files(range)? {
            let observations = read_eod_csv(&file.path)?;
            debug!(
                file = %file.path.display(),
                rows = observations.len(),
                "loaded EOD file"
            );
            history.insert_day(file.date, observations);
        }
        Ok(history)
    }

    fn load(&self, tickers: &[String], range: DateRange) -> Result<Vec<PriceObservation>> {
        let wanted: HashSet<String> = tickers.iter().map(|t| normalize_ticker(t)).collect();
        let mut out = Vec::new();

        for file in self.files(range)? {
            let observations = read_eod_csv(&file.path)?;
            let before = out.len();
            out.extend(observations.into_iter().filter(|obs| {
                range.contains(obs.date) && (wanted.is_empty() || wanted.contains(&obs.ticker))
            }));
            if out.len() == before {
                warn!(file = %file.path.display(), "EOD file had no matching rows");
            }
        }

        Ok(out)
    }
}

impl PriceSource for EodDirectorySource {
    fn name(&self) -> &str {
        "eod-files"
    }

    fn fetch(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PriceObservation>>> + Send {
        ready(self.load(tickers, range))
    }
}
