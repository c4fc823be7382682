//! End-to-end run: configuration in, exported files out.
//!
//! The binary drives these steps; they are kept here so that a run can be
//! reproduced from a config file without the CLI.

use crate::config::{ConfigError, IndexConfig};
use crate::universe::ReferenceError;
use paindex_data::cache::SqliteCache;
use paindex_data::eod::EodDirectorySource;
use paindex_data::{DataError, PriceHistory};
use paindex_engine::{EngineError, IndexEngine, IndexRun, Segment};
use paindex_output::{ExportError, ExportFormat, Exporter, IndexAudit, generate_index_summary};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A segment's reference could not be loaded.
    #[error("Segment '{segment}': {error}")]
    Reference {
        /// Segment name
        segment: String,
        /// Underlying error
        error: ReferenceError,
    },

    /// Price data could not be loaded or stored.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Index construction failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Output could not be written.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Output directory could not be created.
    #[error("IO error at {path}: {error}")]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        error: std::io::Error,
    },
}

/// Result type for pipeline steps.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Load every segment's constituent reference.
pub fn load_segments(config: &IndexConfig) -> Result<Vec<Segment>> {
    config
        .segments
        .iter()
        .map(|seg| -> Result<Segment> {
            let constituents = seg.reference.load().map_err(|error| PipelineError::Reference {
                segment: seg.name.clone(),
                error,
            })?;
            debug!(
                segment = %seg.name,
                constituents = constituents.len(),
                "loaded segment reference"
            );
            Ok(Segment::new(&seg.name, seg.range()?, constituents))
        })
        .collect()
}

/// Build the engine described by `config`.
pub fn build_engine(config: &IndexConfig) -> Result<IndexEngine> {
    let mut engine = IndexEngine::new(config.base_index_value)?;
    for segment in load_segments(config)? {
        engine.add_segment(segment)?;
    }
    Ok(engine)
}

/// Union of all reference tickers, sorted.
pub fn reference_tickers(config: &IndexConfig) -> Result<Vec<String>> {
    let tickers: BTreeSet<String> = load_segments(config)?
        .into_iter()
        .flat_map(|s| s.constituents.tickers())
        .collect();
    Ok(tickers.into_iter().collect())
}

/// Assemble the price history for the configured window.
///
/// Stored snapshots come first; days present in the EOD directory replace
/// the stored table for the same date. With a store, the EOD days read here
/// are written back so later runs see them even after the files are gone.
pub fn load_history(config: &IndexConfig, cache: Option<&SqliteCache>) -> Result<PriceHistory> {
    let range = config.full_range()?;

    let mut history = match cache {
        Some(cache) => cache.history(range)?,
        None => PriceHistory::new(),
    };
    let cached_days = history.len();

    if let Some(eod) = &config.eod {
        let source = EodDirectorySource::with_prefix(&eod.dir, &eod.file_prefix);
        let eod_days = source.load_history(range)?;
        if let Some(cache) = cache {
            let rows = cache.put_history(&eod_days)?;
            debug!(days = eod_days.len(), rows, "persisted EOD days to the store");
        }
        history.merge(eod_days);
    }

    info!(
        cached_days,
        total_days = history.len(),
        observations = history.observation_count(),
        "assembled price history"
    );
    if history.is_empty() {
        warn!(start = %range.start, end = %range.end, "no price data in the configured window");
    }

    Ok(history)
}

/// Build the engine and run it over `history`.
pub fn run_index(config: &IndexConfig, history: &PriceHistory) -> Result<IndexRun> {
    let engine = build_engine(config)?;
    let run = engine.run(history)?;
    info!(
        name = %config.name,
        days = run.series().len(),
        final_value = run.final_value(),
        "index run complete"
    );
    Ok(run)
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Write the run's outputs into the configured directory.
///
/// Always writes the index series, sector weights and a JSON summary. With
/// `include_audit`, also writes the divisor audit and every segment's
/// deletion-adjusted market-cap matrix. Returns the written paths.
pub fn write_outputs(config: &IndexConfig, run: &IndexRun) -> Result<Vec<PathBuf>> {
    let output = &config.output;
    std::fs::create_dir_all(&output.dir).map_err(|error| PipelineError::Io {
        path: output.dir.clone(),
        error,
    })?;

    let format = output.format;
    let path_for = |stem: &str| output.dir.join(format!("{stem}.{}", format.extension()));
    let mut written = Vec::new();

    let mut write = |target: PathBuf, item: &dyn Exporter, format: ExportFormat| -> Result<()> {
        item.export_to_file(&target, format)?;
        debug!(path = %target.display(), "wrote output");
        written.push(target);
        Ok(())
    };

    write(path_for("index"), run.series(), format)?;
    write(path_for("sector_weights"), run.sector_weights(), format)?;

    if output.include_audit {
        write(path_for("index_audit"), &IndexAudit(run.series()), format)?;
        for segment in run.segments() {
            let stem = format!("market_caps_{}", file_stem(&segment.name));
            write(path_for(&stem), &segment.adjusted, format)?;
        }
    }

    let summary = generate_index_summary(&config.name, run);
    write(
        output.dir.join("summary.json"),
        &summary,
        ExportFormat::PrettyJson,
    )?;

    info!(dir = %output.dir.display(), files = written.len(), "outputs written");
    Ok(written)
}

/// Default location of the snapshot store when none is configured.
pub fn default_cache_path(cache_root: &Path) -> PathBuf {
    cache_root.join("paindex").join("paindex.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024", "2024")]
    #[case("h2 2024", "h2_2024")]
    #[case("ray/top-100", "ray_top-100")]
    fn test_file_stem(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(file_stem(name), expected);
    }

    #[test]
    fn test_default_cache_path() {
        let path = default_cache_path(Path::new("/tmp/cache"));
        assert_eq!(path, PathBuf::from("/tmp/cache/paindex/paindex.db"));
    }
}
