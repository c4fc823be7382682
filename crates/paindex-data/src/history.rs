//! In-memory accumulation of per-date price tables.

use crate::error::Result;
use crate::observation::{DateRange, PriceObservation, normalize_ticker};
use crate::source::PriceSource;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::future::{Future, ready};

/// Price snapshots keyed by date.
///
/// This is the mapping injected into the index pipeline. Storage backends
/// (see [`SqliteCache`](crate::cache::SqliteCache)) load into and persist from
/// it; the engine never sees the storage format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    days: BTreeMap<NaiveDate, Vec<PriceObservation>>,
}

impl PriceHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group loose observations by date, preserving input order within a date.
    pub fn from_observations(observations: impl IntoIterator<Item = PriceObservation>) -> Self {
        let mut history = Self::new();
        history.extend(observations);
        history
    }

    /// Replace the table for `date` wholesale.
    ///
    /// Observations whose own date differs from `date` are filed under their
    /// own date, matching how a daily file can carry stray rows. A stray row
    /// replaces any row already held for the same ticker on that date.
    pub fn insert_day(&mut self, date: NaiveDate, observations: Vec<PriceObservation>) {
        self.days.remove(&date);
        for obs in observations {
            let table = self.days.entry(obs.date).or_default();
            if obs.date != date {
                table.retain(|held| held.ticker != obs.ticker);
            }
            table.push(obs);
        }
    }

    /// Append observations to the tables for their dates.
    pub fn extend(&mut self, observations: impl IntoIterator<Item = PriceObservation>) {
        for obs in observations {
            self.days.entry(obs.date).or_default().push(obs);
        }
    }

    /// Fold another history into this one; its days replace ours.
    pub fn merge(&mut self, other: Self) {
        for (date, observations) in other.days {
            self.days.insert(date, observations);
        }
    }

    /// Table for one date.
    pub fn day(&self, date: NaiveDate) -> Option<&[PriceObservation]> {
        self.days.get(&date).map(Vec::as_slice)
    }

    /// Dates held, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Most recent date held.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    /// Number of dates held.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether no dates are held.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Total number of observations across all dates.
    pub fn observation_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    /// Observations within `range`, date ascending, optionally restricted to `tickers`.
    pub fn observations(&self, tickers: &[String], range: DateRange) -> Vec<PriceObservation> {
        let wanted: HashSet<String> = tickers.iter().map(|t| normalize_ticker(t)).collect();

        self.days
            .range(range.start..=range.end)
            .flat_map(|(_, obs)| obs.iter())
            .filter(|obs| wanted.is_empty() || wanted.contains(&obs.ticker))
            .cloned()
            .collect()
    }

    /// Iterate over `(date, table)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[PriceObservation])> + '_ {
        self.days.iter().map(|(d, obs)| (*d, obs.as_slice()))
    }
}

impl PriceSource for PriceHistory {
    fn name(&self) -> &str {
        "history"
    }

    fn fetch(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<PriceObservation>>> + Send {
        ready(Ok(self.observations(tickers, range)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn sample() -> PriceHistory {
        PriceHistory::from_observations(vec![
            PriceObservation::new(d(1), "AAPL", 100.0),
            PriceObservation::new(d(1), "MSFT", 200.0),
            PriceObservation::new(d(2), "AAPL", 101.0),
            PriceObservation::new(d(3), "MSFT", 202.0),
        ])
    }

    #[test]
    fn test_grouping_and_dates() {
        let history = sample();
        assert_eq!(history.len(), 3);
        assert_eq!(history.observation_count(), 4);
        assert_eq!(history.latest_date(), Some(d(3)));
        assert_eq!(history.day(d(1)).map(<[_]>::len), Some(2));
        assert_eq!(history.dates().collect::<Vec<_>>(), vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn test_insert_day_replaces() {
        let mut history = sample();
        history.insert_day(d(1), vec![PriceObservation::new(d(1), "NVDA", 50.0)]);

        let day = history.day(d(1)).unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].ticker, "NVDA");
    }

    #[test]
    fn test_insert_day_stray_row_replaces_existing_pair() {
        let mut history = sample();
        history.insert_day(
            d(3),
            vec![
                PriceObservation::new(d(3), "MSFT", 203.0),
                PriceObservation::new(d(2), "AAPL", 105.0),
            ],
        );

        let day2 = history.day(d(2)).unwrap();
        assert_eq!(day2.len(), 1);
        assert_eq!(day2[0].close, 105.0);
        assert_eq!(history.day(d(3)).unwrap()[0].close, 203.0);
        assert_eq!(history.observation_count(), 4);
    }

    #[test]
    fn test_observations_filters_range_and_tickers() {
        let history = sample();
        let range = DateRange::new(d(2), d(3)).unwrap();

        let all = history.observations(&[], range);
        assert_eq!(all.len(), 2);

        let msft = history.observations(&["msft us equity".to_string()], range);
        assert_eq!(msft.len(), 1);
        assert_eq!(msft[0].close, 202.0);
    }

    #[test]
    fn test_merge_replaces_days() {
        let mut history = sample();
        let other =
            PriceHistory::from_observations(vec![PriceObservation::new(d(3), "MSFT", 999.0)]);
        history.merge(other);

        assert_eq!(history.day(d(3)).unwrap()[0].close, 999.0);
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_as_price_source() {
        let history = sample();
        let obs = history
            .fetch(&["AAPL".to_string()], DateRange::unbounded())
            .await
            .unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(history.name(), "history");
    }
}
