//! PA Index CLI binary.
//!
//! Provides the command-line interface for building the PA Index and
//! maintaining its price snapshot store.

mod integration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager;
use integration::data_pipeline::{fetch_into_cache, ingest_eod_files};
use paindex::{IndexConfig, PipelineError, load_history, reference_tickers, run_index, write_outputs};
use paindex_data::eod::EodDirectorySource;
use paindex_data::yahoo::{DEFAULT_CONCURRENCY, PriceField, YahooQuoteProvider};
use paindex_data::{DateRange, PriceHistory};
use paindex_output::generate_index_summary;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paindex")]
#[command(about = "PA Index: float-adjusted, cap-weighted equity index", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and write outputs
    ///
    /// EOD days read during the run are also saved to the snapshot store
    /// unless --no-cache is given.
    Run {
        /// Index configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Ignore the snapshot store and read only the EOD directory
        #[arg(long)]
        no_cache: bool,

        /// Override the output format (csv, json, pretty-json)
        #[arg(long)]
        format: Option<String>,
    },

    /// Load daily EOD files into the snapshot store
    Ingest {
        /// Index configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// First file date (defaults to the first segment start)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last file date (defaults to the last segment end)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Re-read days that are already stored
        #[arg(long)]
        force: bool,
    },

    /// Print the latest sector weights
    Sectors {
        /// Index configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Ignore the snapshot store and read only the EOD directory
        #[arg(long)]
        no_cache: bool,
    },

    /// Show snapshot store location and statistics
    Cache {
        /// Index configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Delete snapshots dated before this day
        #[arg(long)]
        prune_before: Option<NaiveDate>,
    },

    /// Fetch closes for the reference tickers from Yahoo Finance
    Fetch {
        /// Index configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// First date
        #[arg(long)]
        from: NaiveDate,

        /// Last date
        #[arg(long)]
        to: NaiveDate,

        /// Quote field used as the close (close, adjclose)
        #[arg(long, default_value = "close")]
        field: String,

        /// Concurrent ticker requests
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            no_cache,
            format,
        } => {
            build_index(&config, no_cache, format.as_deref())?;
        }
        Commands::Ingest {
            config,
            from,
            to,
            force,
        } => {
            ingest(&config, from, to, force)?;
        }
        Commands::Sectors { config, no_cache } => {
            show_sectors(&config, no_cache)?;
        }
        Commands::Cache {
            config,
            prune_before,
        } => {
            show_cache(&config, prune_before)?;
        }
        Commands::Fetch {
            config,
            from,
            to,
            field,
            concurrency,
        } => {
            fetch(&config, from, to, &field, concurrency).await?;
        }
    }

    Ok(())
}

fn progress_bar() -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_header(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

/// Price history from the store (unless disabled) and the EOD directory.
fn history_for(config: &IndexConfig, no_cache: bool) -> Result<PriceHistory, PipelineError> {
    if no_cache {
        return load_history(config, None);
    }
    match cache_manager::open_cache(config) {
        Ok(cache) => load_history(config, Some(&cache)),
        Err(e) => {
            warn!(error = %e, "snapshot store unavailable, reading EOD files only");
            load_history(config, None)
        }
    }
}

fn build_index(
    config_path: &Path,
    no_cache: bool,
    format: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = IndexConfig::from_file(config_path)?;
    if let Some(format) = format {
        config.output.format = format.parse()?;
    }

    print_header(&config.name.to_uppercase());

    let history = history_for(&config, no_cache)?;
    let run = run_index(&config, &history)?;
    let written = write_outputs(&config, &run)?;

    println!("{}", generate_index_summary(&config.name, &run));
    println!("Outputs:");
    for path in written {
        println!("  {}", path.display());
    }

    Ok(())
}

fn ingest(
    config_path: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_file(config_path)?;
    let eod = config
        .eod
        .as_ref()
        .ok_or("configuration has no [eod] section")?;

    let window = config.full_range()?;
    let range = DateRange::new(from.unwrap_or(window.start), to.unwrap_or(window.end))?;

    let source = EodDirectorySource::with_prefix(&eod.dir, &eod.file_prefix);
    let cache = cache_manager::open_cache(&config)?;

    println!("Source: {}", source.dir().display());
    println!("Store:  {}", cache_manager::get_cache_path(&config).display());

    let pb = progress_bar()?;
    let report = match ingest_eod_files(&source, &cache, range, force, Some(&pb)) {
        Ok(report) => report,
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };
    pb.finish_with_message(format!(
        "Loaded {} days ({} rows), skipped {} already stored",
        report.loaded, report.rows, report.skipped
    ));

    Ok(())
}

fn show_sectors(config_path: &Path, no_cache: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_file(config_path)?;
    let history = history_for(&config, no_cache)?;
    let run = run_index(&config, &history)?;
    let table = run.sector_weights();

    print_header("SECTOR WEIGHTS");
    match table.date() {
        Some(date) => println!("As of {}\n", date),
        None => {
            println!("No sector weights: no priced constituents in any segment.");
            return Ok(());
        }
    }

    println!("{:<32} {:>12}", "Sector", "Weight");
    println!("{}", "─".repeat(45));
    for weight in table.iter() {
        println!("{:<32} {:>11.2}%", weight.sector, weight.weight_pct);
    }
    println!("{}", "─".repeat(45));
    println!("{:<32} {:>11.2}%", "Total", table.total());

    Ok(())
}

fn show_cache(
    config_path: &Path,
    prune_before: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_file(config_path)?;
    let cache = cache_manager::open_cache(&config)?;

    if let Some(before) = prune_before {
        let removed = cache.prune_before(before)?;
        println!("Pruned {} snapshots before {}", removed, before);
    }

    let stats = cache.get_stats()?;
    println!("Snapshot store: {}", cache_manager::get_cache_path(&config).display());
    println!("  Snapshots: {}", stats.total_snapshots);
    println!("  Symbols:   {}", stats.unique_symbols);
    println!("  Dates:     {}", stats.unique_dates);
    if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
        println!("  Range:     {} to {}", earliest, latest);
    }

    Ok(())
}

async fn fetch(
    config_path: &Path,
    from: NaiveDate,
    to: NaiveDate,
    field: &str,
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_file(config_path)?;
    let range = DateRange::new(from, to)?;
    let symbols = reference_tickers(&config)?;

    let provider = YahooQuoteProvider::new()?
        .with_field(PriceField::parse(field)?)
        .with_concurrency(concurrency);
    let cache = cache_manager::open_cache(&config)?;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!(
        "Fetching {} symbols ({} concurrent)...",
        symbols.len(),
        concurrency
    ));

    let report = match fetch_into_cache(&provider, &cache, &symbols, range).await {
        Ok(report) => report,
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };
    pb.finish_with_message(format!(
        "Stored {} rows for {} symbols ({} failed)",
        report.rows, report.loaded, report.failed
    ));

    Ok(())
}
