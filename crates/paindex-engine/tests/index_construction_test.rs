//! End-to-end tests for index construction from raw observations.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use paindex_data::{DateRange, PriceHistory, PriceObservation};
use paindex_engine::{
    ConstituentRecord, ConstituentSet, EngineError, IndexEngine, Segment,
    build_market_cap_matrix, compute_index_series, impute_deletions, sector_weights,
};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
}

#[test]
fn test_two_ticker_scenario_with_trailing_gap() {
    let constituents = ConstituentSet::from_records(vec![
        ConstituentRecord::new("A", 10.0, Some("Tech")),
        ConstituentRecord::new("B", 20.0, Some("Health")),
    ]);
    let observations = vec![
        PriceObservation::new(d(1), "A", 5.0),
        PriceObservation::new(d(1), "B", 10.0),
        PriceObservation::new(d(2), "A", 5.0),
        PriceObservation::new(d(2), "B", 10.0),
        PriceObservation::new(d(3), "B", 10.0),
    ];

    let caps = build_market_cap_matrix(&observations, &constituents).unwrap();
    assert_relative_eq!(caps.get(d(1), "A").unwrap(), 50.0);
    assert_relative_eq!(caps.get(d(1), "B").unwrap(), 200.0);
    assert!(caps.get(d(3), "A").unwrap().is_nan());

    let adjusted = impute_deletions(&caps);
    assert_relative_eq!(adjusted.matrix().get(d(3), "A").unwrap(), 50.0);
    assert!(adjusted.deletions().is_empty());
    assert_eq!(adjusted.close_mkt_cap().to_vec(), vec![250.0, 250.0, 250.0]);

    let series = compute_index_series("e2e", &adjusted, 100.0).unwrap();
    for row in series.iter() {
        assert_relative_eq!(row.index_value, 100.0);
        assert_relative_eq!(row.divisor, 1.0);
    }

    let sectors = sector_weights(adjusted.matrix(), &constituents);
    assert_relative_eq!(sectors.get("Health").unwrap(), 80.0);
    assert_relative_eq!(sectors.get("Tech").unwrap(), 20.0);
    assert_relative_eq!(sectors.total(), 100.0, epsilon = 1e-9);
}

#[test]
fn test_deleted_constituent_does_not_move_index() {
    let constituents = ConstituentSet::from_records(vec![
        ConstituentRecord::new("X", 1.0, Some("Energy")),
        ConstituentRecord::new("Y", 1.0, Some("Energy")),
    ]);
    let observations = vec![
        PriceObservation::new(d(1), "X", 100.0),
        PriceObservation::new(d(1), "Y", 100.0),
        PriceObservation::new(d(2), "X", 0.0),
        PriceObservation::new(d(2), "Y", 100.0),
        PriceObservation::new(d(3), "X", 0.0),
        PriceObservation::new(d(3), "Y", 100.0),
    ];

    let adjusted = impute_deletions(&build_market_cap_matrix(&observations, &constituents).unwrap());
    assert_eq!(adjusted.deleted_stock_adjustment().to_vec(), vec![0.0, 100.0, 0.0]);

    let series = compute_index_series("deletion", &adjusted, 100.0).unwrap();
    let rows = series.rows();
    assert_relative_eq!(rows[1].index_value, 100.0);
    assert_relative_eq!(rows[2].index_value, rows[1].index_value * 100.0 / 100.0);
}

#[test]
fn test_unmatched_and_duplicate_rows() {
    let constituents =
        ConstituentSet::from_records(vec![ConstituentRecord::new("msft us equity", 2.0, None)]);
    let observations = vec![
        PriceObservation::new(d(1), "MSFT", 100.0),
        PriceObservation::new(d(1), "GOOG", 50.0),
        PriceObservation::new(d(1), "msft", 110.0),
    ];

    let caps = build_market_cap_matrix(&observations, &constituents).unwrap();
    assert_eq!(caps.tickers(), &["MSFT".to_string()]);
    assert_relative_eq!(caps.get(d(1), "MSFT").unwrap(), 220.0);
}

#[test]
fn test_divisor_collapse_is_fatal_for_the_run() {
    let constituents =
        ConstituentSet::from_records(vec![ConstituentRecord::new("A", 1.0, Some("Tech"))]);
    let history = PriceHistory::from_observations(vec![
        PriceObservation::new(d(1), "A", 10.0),
        PriceObservation::new(d(2), "A", 0.0),
        PriceObservation::new(d(3), "A", 0.0),
    ]);

    let engine = IndexEngine::new(100.0)
        .unwrap()
        .with_segment(Segment::new(
            "collapse",
            DateRange::new(d(1), d(3)).unwrap(),
            constituents,
        ))
        .unwrap();

    let result = engine.run(&history);
    assert!(matches!(
        result,
        Err(EngineError::DegenerateSegment { ref segment, .. }) if segment == "collapse"
    ));
}

#[test]
fn test_reentry_after_deletion_run_is_not_adjusted() {
    let constituents = ConstituentSet::from_records(vec![
        ConstituentRecord::new("X", 1.0, Some("Energy")),
        ConstituentRecord::new("Y", 1.0, Some("Energy")),
    ]);
    // X is absent on 07-02 and 07-03, then trades again on 07-04.
    let observations = vec![
        PriceObservation::new(d(1), "X", 100.0),
        PriceObservation::new(d(1), "Y", 100.0),
        PriceObservation::new(d(2), "Y", 100.0),
        PriceObservation::new(d(3), "Y", 100.0),
        PriceObservation::new(d(4), "X", 100.0),
        PriceObservation::new(d(4), "Y", 100.0),
    ];

    let caps = build_market_cap_matrix(&observations, &constituents).unwrap();
    let adjusted = impute_deletions(&caps);

    // One adjustment, booked on the first date of the run.
    assert_eq!(
        adjusted.deleted_stock_adjustment().to_vec(),
        vec![0.0, 100.0, 0.0, 0.0]
    );
    assert_eq!(adjusted.deletions().len(), 1);
    assert_eq!(adjusted.deletions()[0].date, d(2));
    assert!(adjusted.imputed().is_empty());
    assert_eq!(
        adjusted.close_mkt_cap().to_vec(),
        vec![200.0, 100.0, 100.0, 200.0]
    );

    let series = compute_index_series("reentry", &adjusted, 100.0).unwrap();
    let rows: Vec<_> = series.iter().collect();
    assert_relative_eq!(rows[1].divisor, 0.5);
    assert_relative_eq!(rows[1].index_value, 100.0);
    assert_relative_eq!(rows[2].index_value, 100.0);
    // Re-entry is not offset: the divisor stays put and the level doubles.
    assert_relative_eq!(rows[3].divisor, 0.5);
    assert_relative_eq!(rows[3].index_value, 200.0);
}
