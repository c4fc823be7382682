//! Config file to written outputs, through the snapshot store and EOD files.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use paindex::data::PriceObservation;
use paindex::data::cache::SqliteCache;
use paindex::{IndexConfig, load_history, reference_tickers, run_index, write_outputs};
use std::path::PathBuf;

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
}

const CONFIG: &str = r#"
name = "PA Index Test"
base_index_value = 100.0

[eod]
dir = "eod"

[output]
dir = "out"
format = "csv"

[[segments]]
name = "july 2024"
start = "2024-07-01"
end = "2024-07-05"
[segments.reference]
path = "reference.csv"
"#;

const REFERENCE: &str = "\
Ticker,Equity Float,GICS Sector
AAPL UW Equity,10,Information Technology
XOM UN Equity,5,Energy
";

fn eod_file(rows: &[(&str, f64)], date: &str) -> String {
    let mut out = String::from("quote_date,underlying_symbol,close\n");
    for (symbol, close) in rows {
        out.push_str(&format!("{date},{symbol},{close}\n"));
    }
    out
}

fn workspace() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("paindex_pipeline_{}", std::process::id()));
    let eod = dir.join("eod");
    std::fs::create_dir_all(&eod).unwrap();

    std::fs::write(dir.join("index.toml"), CONFIG).unwrap();
    std::fs::write(dir.join("reference.csv"), REFERENCE).unwrap();
    for (date, rows) in [
        ("2024-07-01", [("AAPL", 100.0), ("XOM", 100.0)]),
        ("2024-07-02", [("AAPL", 110.0), ("XOM", 100.0)]),
        ("2024-07-03", [("AAPL", 110.0), ("XOM", 110.0)]),
    ] {
        std::fs::write(
            eod.join(format!("UnderlyingEOD_{date}.csv")),
            eod_file(&rows, date),
        )
        .unwrap();
    }
    std::fs::write(eod.join("UnderlyingEOD_Summaries_2024-07-03.csv"), "junk").unwrap();
    dir
}

#[test]
fn test_config_to_outputs() {
    let dir = workspace();
    let config = IndexConfig::from_file(&dir.join("index.toml")).unwrap();
    assert_eq!(reference_tickers(&config).unwrap(), vec!["AAPL", "XOM"]);

    // A stale 07-01 snapshot is superseded by the EOD file; 07-05 only
    // exists in the store.
    let cache = SqliteCache::in_memory().unwrap();
    cache
        .put_observations(&[
            PriceObservation::new(d(1), "AAPL", 90.0),
            PriceObservation::new(d(5), "AAPL", 120.0),
            PriceObservation::new(d(5), "XOM", 110.0),
        ])
        .unwrap();

    let history = load_history(&config, Some(&cache)).unwrap();
    assert_eq!(history.len(), 4);

    // EOD-only days are now in the store, and the stale 07-01 close is gone.
    let stored = cache.history(config.full_range().unwrap()).unwrap();
    assert_eq!(stored.len(), 4);
    let aapl_first = stored
        .day(d(1))
        .unwrap()
        .iter()
        .find(|o| o.ticker == "AAPL")
        .unwrap()
        .close;
    assert_relative_eq!(aapl_first, 100.0);

    let run = run_index(&config, &history).unwrap();
    let values: Vec<f64> = run.series().index_values().into_iter().map(|(_, v)| v).collect();
    assert_eq!(values.len(), 4);
    assert_relative_eq!(values[0], 100.0, epsilon = 1e-9);
    assert_relative_eq!(values[1], 1600.0 / 1500.0 * 100.0, epsilon = 1e-9);
    assert_relative_eq!(values[2], 110.0, epsilon = 1e-9);
    assert_relative_eq!(values[3], 1750.0 / 1500.0 * 100.0, epsilon = 1e-9);

    let weights = run.sector_weights();
    assert_eq!(weights.date(), Some(d(5)));
    assert_relative_eq!(
        weights.get("Information Technology").unwrap(),
        1200.0 / 1750.0 * 100.0,
        epsilon = 1e-9
    );

    let written = write_outputs(&config, &run).unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "index.csv",
            "sector_weights.csv",
            "index_audit.csv",
            "market_caps_july_2024.csv",
            "summary.json",
        ]
    );

    let index_csv = std::fs::read_to_string(dir.join("out").join("index.csv")).unwrap();
    assert!(index_csv.starts_with("Date,Index Value\n2024-07-01,100"));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_reference_names_segment() {
    let dir = std::env::temp_dir().join(format!("paindex_missing_ref_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.toml"), CONFIG).unwrap();

    let config = IndexConfig::from_file(&dir.join("index.toml")).unwrap();
    let err = paindex::build_engine(&config).unwrap_err();
    assert!(err.to_string().contains("july 2024"));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_reference_without_sector_column() {
    let dir = std::env::temp_dir().join(format!("paindex_no_sector_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("ref.csv"),
        "Ticker,Equity Float,Market Cap\nAAPL UW Equity,10,3000\nXOM UN Equity,5,450\nJNJ UN Equity,2,380\n",
    )
    .unwrap();

    for sector_line in ["", "sector_column = \"\"\n"] {
        let text = format!(
            "[[segments]]\nname = \"2023\"\nstart = \"2023-11-10\"\nend = \"2024-07-01\"\n\
             [segments.reference]\npath = \"ref.csv\"\n{sector_line}\
             rank_column = \"Market Cap\"\ntop_n = 2\n"
        );
        std::fs::write(dir.join("index.toml"), text).unwrap();

        let config = IndexConfig::from_file(&dir.join("index.toml")).unwrap();
        let segments = paindex::load_segments(&config).unwrap();
        assert_eq!(segments[0].constituents.tickers(), vec!["AAPL", "XOM"]);
        assert_eq!(segments[0].constituents.sector("AAPL"), None);
    }

    std::fs::remove_dir_all(dir).ok();
}
