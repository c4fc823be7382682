//! Multi-segment index runs.
//!
//! A run is a sequence of segments, each with its own date window and
//! constituent reference. The first segment starts at the configured base
//! value; every later segment starts at the final level of the one before
//! it. When two segments share a boundary date the later segment's copy of
//! that row is dropped from the combined series.

use crate::constituents::ConstituentSet;
use crate::divisor::{IndexSeries, check_base_value, compute_index_series};
use crate::error::{EngineError, Result};
use crate::imputation::{DeletionAdjustedMatrix, impute_deletions};
use crate::matrix::{MarketCapMatrix, build_market_cap_matrix};
use crate::sectors::{SectorWeightTable, sector_weights};
use paindex_data::{DateRange, PriceHistory, PriceObservation, PriceSource};
use tracing::{debug, info, warn};

/// One segment definition.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Label used in logs and errors.
    pub name: String,
    /// Inclusive window.
    pub range: DateRange,
    /// Universe for this window.
    pub constituents: ConstituentSet,
}

impl Segment {
    /// Create a segment.
    pub fn new(name: impl Into<String>, range: DateRange, constituents: ConstituentSet) -> Self {
        Self {
            name: name.into(),
            range,
            constituents,
        }
    }
}

/// Everything derived for one segment.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    /// Segment label.
    pub name: String,
    /// Level the segment was anchored to.
    pub base_value: f64,
    /// Raw market caps.
    pub market_caps: MarketCapMatrix,
    /// Market caps after deletion imputation.
    pub adjusted: DeletionAdjustedMatrix,
    /// Index rows for this segment alone.
    pub series: IndexSeries,
    /// Constituents used.
    pub constituents: ConstituentSet,
}

impl SegmentResult {
    /// Whether the window held no matched prices.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct IndexRun {
    segments: Vec<SegmentResult>,
    series: IndexSeries,
    sector_weights: SectorWeightTable,
    base_value: f64,
}

impl IndexRun {
    /// Per-segment results, in run order.
    pub fn segments(&self) -> &[SegmentResult] {
        &self.segments
    }

    /// Combined, seam-deduplicated series.
    pub const fn series(&self) -> &IndexSeries {
        &self.series
    }

    /// Sector weights of the last non-empty segment.
    pub const fn sector_weights(&self) -> &SectorWeightTable {
        &self.sector_weights
    }

    /// Base value of the first segment.
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Final level, or the base value when nothing was computed.
    pub fn final_value(&self) -> f64 {
        self.series.final_value().unwrap_or(self.base_value)
    }

    /// Last segment that produced rows.
    pub fn last_non_empty(&self) -> Option<&SegmentResult> {
        self.segments.iter().rev().find(|s| !s.is_empty())
    }

    /// Deletion events across all segments.
    pub fn deletion_count(&self) -> usize {
        self.segments.iter().map(|s| s.adjusted.deletions().len()).sum()
    }

    /// Imputed cells across all segments.
    pub fn imputed_count(&self) -> usize {
        self.segments.iter().map(|s| s.adjusted.imputed().len()).sum()
    }
}

/// Build one segment from its observations.
pub fn run_segment(
    segment: &Segment,
    observations: &[PriceObservation],
    base_value: f64,
) -> Result<SegmentResult> {
    let market_caps = build_market_cap_matrix(observations, &segment.constituents)?;
    let adjusted = impute_deletions(&market_caps);
    let series = compute_index_series(&segment.name, &adjusted, base_value)?;

    debug!(
        segment = %segment.name,
        dates = market_caps.n_dates(),
        tickers = market_caps.n_tickers(),
        deletions = adjusted.deletions().len(),
        imputed = adjusted.imputed().len(),
        "segment complete"
    );

    Ok(SegmentResult {
        name: segment.name.clone(),
        base_value,
        market_caps,
        adjusted,
        series,
        constituents: segment.constituents.clone(),
    })
}

/// Chained multi-segment index builder.
#[derive(Debug, Clone)]
pub struct IndexEngine {
    base_value: f64,
    segments: Vec<Segment>,
}

impl IndexEngine {
    /// Create an engine anchored at `base_value`.
    pub fn new(base_value: f64) -> Result<Self> {
        Ok(Self {
            base_value: check_base_value(base_value)?,
            segments: Vec::new(),
        })
    }

    /// Append a segment.
    ///
    /// Segments must be in date order; consecutive segments may share their
    /// boundary date but must not overlap further.
    pub fn add_segment(&mut self, segment: Segment) -> Result<()> {
        if let Some(prev) = self.segments.last() {
            if segment.range.start < prev.range.end {
                return Err(EngineError::InvalidSegments(format!(
                    "segment '{}' starts {} before '{}' ends {}",
                    segment.name, segment.range.start, prev.name, prev.range.end
                )));
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Builder form of [`add_segment`](Self::add_segment).
    pub fn with_segment(mut self, segment: Segment) -> Result<Self> {
        self.add_segment(segment)?;
        Ok(self)
    }

    /// Configured segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Base value of the first segment.
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Run every segment against an in-memory price history.
    pub fn run(&self, history: &PriceHistory) -> Result<IndexRun> {
        let observations: Vec<Vec<PriceObservation>> = self
            .segments
            .iter()
            .map(|s| history.observations(&s.constituents.tickers(), s.range))
            .collect();
        self.chain(observations)
    }

    /// Run every segment, fetching each window from `source`.
    pub async fn run_with_source<S: PriceSource>(&self, source: &S) -> Result<IndexRun> {
        let mut observations = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let fetched = source
                .fetch(&segment.constituents.tickers(), segment.range)
                .await?;
            debug!(
                source = source.name(),
                segment = %segment.name,
                rows = fetched.len(),
                "fetched segment prices"
            );
            observations.push(fetched);
        }
        self.chain(observations)
    }

    fn chain(&self, observations: Vec<Vec<PriceObservation>>) -> Result<IndexRun> {
        let mut base_value = self.base_value;
        let mut series = IndexSeries::default();
        let mut results = Vec::with_capacity(self.segments.len());

        for (segment, obs) in self.segments.iter().zip(observations) {
            let result = run_segment(segment, &obs, base_value)?;
            match result.series.final_value() {
                Some(final_value) => {
                    info!(
                        segment = %segment.name,
                        base_value,
                        final_value,
                        rows = result.series.len(),
                        "segment chained"
                    );
                    series.chain(result.series.clone());
                    base_value = final_value;
                }
                None => warn!(
                    segment = %segment.name,
                    base_value,
                    "segment has no prices; carrying base value forward"
                ),
            }
            results.push(result);
        }

        let sector_weights = results
            .iter()
            .rev()
            .find(|s| !s.is_empty())
            .map(|s| sector_weights(s.adjusted.matrix(), &s.constituents))
            .unwrap_or_default();

        Ok(IndexRun {
            segments: results,
            series,
            sector_weights,
            base_value: self.base_value,
        })
    }
}
