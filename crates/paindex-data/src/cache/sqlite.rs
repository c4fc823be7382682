//! SQLite store for daily price snapshots.

use crate::error::{DataError, Result};
use crate::history::PriceHistory;
use crate::observation::{DateRange, PriceObservation, normalize_ticker};
use crate::source::PriceSource;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::{Future, ready};
use std::path::Path;
use tracing::debug;

/// SQLite cache of `(date, symbol) -> close` snapshots.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) a cache file.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS price_snapshots (
                date TEXT NOT NULL,
                symbol TEXT NOT NULL,
                close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (date, symbol)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_snapshots_symbol ON price_snapshots(symbol)",
            [],
        )?;

        Ok(())
    }

    /// Store observations, replacing any existing `(date, symbol)` rows.
    pub fn put_observations(&self, observations: &[PriceObservation]) -> Result<usize> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        let mut written = 0;
        for obs in observations {
            written += tx.execute(
                "INSERT OR REPLACE INTO price_snapshots (date, symbol, close, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![obs.date.to_string(), obs.ticker, obs.close, cached_at],
            )?;
        }

        tx.commit()?;
        debug!(rows = written, "stored price snapshots");
        Ok(written)
    }

    /// Store every day of a history.
    ///
    /// Each stored date is cleared first so a re-ingested day fully replaces
    /// the old snapshot rather than merging with it.
    pub fn put_history(&self, history: &PriceHistory) -> Result<usize> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        let mut written = 0;
        for (date, observations) in history.iter() {
            tx.execute(
                "DELETE FROM price_snapshots WHERE date = ?1",
                params![date.to_string()],
            )?;
            for obs in observations {
                written += tx.execute(
                    "INSERT OR REPLACE INTO price_snapshots (date, symbol, close, cached_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![obs.date.to_string(), obs.ticker, obs.close, cached_at],
                )?;
            }
        }

        tx.commit()?;
        debug!(days = history.len(), rows = written, "stored price history");
        Ok(written)
    }

    /// Load every snapshot within `range`.
    pub fn history(&self, range: DateRange) -> Result<PriceHistory> {
        let mut stmt = self.conn.prepare(
            "SELECT date, symbol, close FROM price_snapshots
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC, symbol ASC",
        )?;

        let rows = stmt.query_map(
            params![range.start.to_string(), range.end.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            },
        )?;

        let mut observations = Vec::new();
        for row in rows {
            let (date, symbol, close) = row?;
            observations.push(PriceObservation {
                date: parse_stored_date(&date)?,
                ticker: symbol,
                close,
            });
        }

        Ok(PriceHistory::from_observations(observations))
    }

    /// Distinct stored dates, ascending.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT date FROM price_snapshots ORDER BY date ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(parse_stored_date(&row?)?);
        }
        Ok(dates)
    }

    /// Most recent stored date.
    pub fn latest_date(&self) -> Result<Option<NaiveDate>> {
        let latest: Option<String> =
            self.conn
                .query_row("SELECT MAX(date) FROM price_snapshots", [], |row| {
                    row.get(0)
                })?;
        latest.as_deref().map(parse_stored_date).transpose()
    }

    /// Whether any snapshot exists for `date`.
    pub fn has_date(&self, date: NaiveDate) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM price_snapshots WHERE date = ?1",
            params![date.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove snapshots older than `before`. Returns the number of rows removed.
    pub fn prune_before(&self, before: NaiveDate) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM price_snapshots WHERE date < ?1",
            params![before.to_string()],
        )?;
        Ok(removed)
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let total: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM price_snapshots", [], |row| row.get(0))?;

        let symbols: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT symbol) FROM price_snapshots",
            [],
            |row| row.get(0),
        )?;

        let (dates, earliest, latest): (i64, Option<String>, Option<String>) =
            self.conn.query_row(
                "SELECT COUNT(DISTINCT date), MIN(date), MAX(date) FROM price_snapshots",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(CacheStats {
            total_snapshots: total as usize,
            unique_symbols: symbols as usize,
            unique_dates: dates as usize,
            earliest: earliest.as_deref().map(parse_stored_date).transpose()?,
            latest: latest.as_deref().map(parse_stored_date).transpose()?,
        })
    }

    fn load(&self, tickers: &[String], range: DateRange) -> Result<Vec<PriceObservation>> {
        let wanted: HashSet<String> = tickers.iter().map(|t| normalize_ticker(t)).collect();
        Ok(self
            .history(range)?
            .observations(&[], range)
            .into_iter()
            .filter(|obs| wanted.is_empty() || wanted.contains(&obs.ticker))
            .collect())
    }
}

impl PriceSource for SqliteCache {
    fn name(&self) -> &str {
        "sqlite-cache"
    }

    fn fetch(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PriceObservation>>> + Send {
        ready(self.load(tickers, range))
    }
}

fn parse_stored_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DataError::UnparsableDate(value.to_string()))
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of snapshot rows
    pub total_snapshots: usize,
    /// Number of unique symbols
    pub unique_symbols: usize,
    /// Number of unique dates
    pub unique_dates: usize,
    /// First stored date
    pub earliest: Option<NaiveDate>,
    /// Last stored date
    pub latest: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
        let stats = cache.unwrap().get_stats().unwrap();
        assert_eq!(stats.total_snapshots, 0);
        assert_eq!(stats.latest, None);
    }

    #[test]
    fn test_put_and_load() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_observations(&[
                PriceObservation::new(d(1), "AAPL", 100.0),
                PriceObservation::new(d(1), "MSFT", 200.0),
                PriceObservation::new(d(2), "AAPL", 101.0),
            ])
            .unwrap();

        let history = cache.history(DateRange::unbounded()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.observation_count(), 3);

        assert_eq!(cache.dates().unwrap(), vec![d(1), d(2)]);
        assert_eq!(cache.latest_date().unwrap(), Some(d(2)));
        assert!(cache.has_date(d(1)).unwrap());
        assert!(!cache.has_date(d(3)).unwrap());
    }

    #[test]
    fn test_upsert_replaces_close() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_observations(&[PriceObservation::new(d(1), "AAPL", 100.0)])
            .unwrap();
        cache
            .put_observations(&[PriceObservation::new(d(1), "AAPL", 105.0)])
            .unwrap();

        let history = cache.history(DateRange::unbounded()).unwrap();
        let day = history.day(d(1)).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].close, 105.0);
    }

    #[test]
    fn test_put_history_replaces_whole_day() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_observations(&[
                PriceObservation::new(d(1), "AAPL", 100.0),
                PriceObservation::new(d(1), "MSFT", 200.0),
            ])
            .unwrap();

        let fresh =
            PriceHistory::from_observations(vec![PriceObservation::new(d(1), "AAPL", 110.0)]);
        cache.put_history(&fresh).unwrap();

        let history = cache.history(DateRange::unbounded()).unwrap();
        assert_eq!(history.day(d(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_stats_and_prune() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_observations(&[
                PriceObservation::new(d(1), "AAPL", 100.0),
                PriceObservation::new(d(2), "MSFT", 200.0),
                PriceObservation::new(d(3), "MSFT", 201.0),
            ])
            .unwrap();

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_snapshots, 3);
        assert_eq!(stats.unique_symbols, 2);
        assert_eq!(stats.unique_dates, 3);
        assert_eq!(stats.earliest, Some(d(1)));
        assert_eq!(stats.latest, Some(d(3)));

        assert_eq!(cache.prune_before(d(3)).unwrap(), 2);
        assert_eq!(cache.get_stats().unwrap().total_snapshots, 1);
    }

    #[tokio::test]
    async fn test_fetch_filters_tickers() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_observations(&[
                PriceObservation::new(d(1), "AAPL", 100.0),
                PriceObservation::new(d(1), "MSFT", 200.0),
            ])
            .unwrap();

        let obs = cache
            .fetch(&["aapl us equity".to_string()], DateRange::unbounded())
            .await
            .unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].ticker, "AAPL");
    }
}
