//! Loading price snapshots into the store.
//!
//! Two feeds fill the SQLite store: the daily EOD files on disk and any
//! [`PriceSource`], in practice the Yahoo Finance quote provider. The index
//! computation is left to the library.

use indicatif::ProgressBar;
use paindex::PipelineError;
use paindex_data::cache::SqliteCache;
use paindex_data::eod::{EodDirectorySource, read_eod_csv};
use paindex_data::{DateRange, PriceHistory, PriceSource};
use std::collections::BTreeSet;
use tracing::debug;

/// Counts from one ingest or fetch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct IngestReport {
    /// Days or symbols written to the store.
    pub loaded: usize,
    /// Days already present and left untouched.
    pub skipped: usize,
    /// Symbols that failed to fetch.
    pub failed: usize,
    /// Snapshot rows written.
    pub rows: usize,
}

/// Copy daily EOD files in `range` into the store.
///
/// Days already stored are skipped unless `force` is set, so repeated runs
/// only read new files. A re-ingested day replaces the stored table for that
/// date.
pub(crate) fn ingest_eod_files(
    source: &EodDirectorySource,
    cache: &SqliteCache,
    range: DateRange,
    force: bool,
    progress: Option<&ProgressBar>,
) -> Result<IngestReport, PipelineError> {
    let files = source.files(range)?;
    if let Some(pb) = progress {
        pb.set_length(files.len() as u64);
        pb.set_message(format!("Reading {} files...", files.len()));
    }

    let mut report = IngestReport::default();
    for file in files {
        if !force && cache.has_date(file.date)? {
            report.skipped += 1;
        } else {
            let observations = read_eod_csv(&file.path)?;
            let mut day = PriceHistory::new();
            day.insert_day(file.date, observations);
            report.rows += cache.put_history(&day)?;
            report.loaded += 1;
            debug!(date = %file.date, "ingested EOD file");
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(report)
}

/// Fetch closes for `symbols` from any [`PriceSource`] and store them.
///
/// Concurrency and per-symbol failure handling belong to the source; a
/// symbol that comes back without rows is counted as failed.
pub(crate) async fn fetch_into_cache<S: PriceSource>(
    source: &S,
    cache: &SqliteCache,
    symbols: &[String],
    range: DateRange,
) -> Result<IngestReport, PipelineError> {
    let observations = source.fetch(symbols, range).await?;
    let fetched: BTreeSet<&str> = observations.iter().map(|o| o.ticker.as_str()).collect();
    let rows = cache.put_observations(&observations)?;
    debug!(source = source.name(), symbols = fetched.len(), rows, "stored fetched closes");

    Ok(IngestReport {
        loaded: fetched.len(),
        skipped: 0,
        failed: symbols.len().saturating_sub(fetched.len()),
        rows,
    })
}
