//! Statistical analysis pipeline over a temperature history.
//!
//! raw table → per-city series (sorted) → rolling stats → anomaly band →
//! yearly trend. Live readings are scored separately against the enriched
//! table via [`live::score_live_reading`].

pub mod anomaly;
pub mod comparison;
pub mod error;
pub mod live;
pub mod profile;
pub mod rolling;
pub mod season;
pub mod stats;
pub mod trend;

use chrono::{DateTime, Utc};
use std::ops::Range;
use tracing::{debug, info, instrument};

pub use error::AnalysisError;
pub use rolling::DEFAULT_WINDOW;

use crate::models::{DatasetSummary, EnrichedObservation, TemperatureHistory};
use trend::TrendTable;

/// Run rolling statistics and anomaly detection for every city.
///
/// Output rows are grouped by city in order of first appearance and sorted
/// by timestamp within a city.
pub fn enrich(
    history: &TemperatureHistory,
    window: usize,
) -> Result<Vec<EnrichedObservation>, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::InvalidWindow(window));
    }

    let mut enriched = Vec::with_capacity(history.len());
    for series in rolling::partition_by_city(history.observations()) {
        let temps: Vec<f64> = series.observations.iter().map(|o| o.temperature).collect();
        let points = rolling::rolling_window(&temps, window)?;
        debug!(city = %series.city, rows = temps.len(), "Computed rolling statistics");

        enriched.extend(
            series
                .observations
                .into_iter()
                .zip(points)
                .map(|(observation, stats)| anomaly::detect(observation, stats)),
        );
    }
    Ok(enriched)
}

/// Immutable result of analysing one uploaded history.
///
/// A snapshot is built once and shared read-only; replacing the dataset means
/// building a new snapshot.
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    history: TemperatureHistory,
    enriched: Vec<EnrichedObservation>,
    city_ranges: Vec<(String, Range<usize>)>,
    trends: TrendTable,
    window: usize,
    loaded_at: DateTime<Utc>,
}

impl AnalysisSnapshot {
    #[instrument(skip(history), fields(rows = history.len()))]
    pub fn build(history: TemperatureHistory, window: usize) -> Result<Self, AnalysisError> {
        let enriched = enrich(&history, window)?;
        let city_ranges = city_ranges(&enriched);

        let trends = trend::estimate_trends(city_ranges.iter().map(|(city, range)| {
            (
                city.as_str(),
                enriched[range.clone()]
                    .iter()
                    .map(|r| &r.observation)
                    .collect::<Vec<_>>(),
            )
        }));

        let anomalies = enriched.iter().filter(|r| r.is_anomaly).count();
        info!(
            "Analysed {} rows across {} cities: {} anomalies, {} trends, {} excluded",
            enriched.len(),
            city_ranges.len(),
            anomalies,
            trends.trends.len(),
            trends.excluded.len()
        );

        Ok(Self {
            history,
            enriched,
            city_ranges,
            trends,
            window,
            loaded_at: Utc::now(),
        })
    }

    pub fn history(&self) -> &TemperatureHistory {
        &self.history
    }

    pub fn enriched(&self) -> &[EnrichedObservation] {
        &self.enriched
    }

    pub fn trends(&self) -> &TrendTable {
        &self.trends
    }

    pub fn cities(&self) -> impl Iterator<Item = &str> {
        self.city_ranges.iter().map(|(city, _)| city.as_str())
    }

    /// Enriched rows of one city in timestamp order
    pub fn city_rows(&self, city: &str) -> Option<&[EnrichedObservation]> {
        self.city_ranges
            .iter()
            .find(|(name, _)| name == city)
            .map(|(_, range)| &self.enriched[range.clone()])
    }

    pub fn summary(&self) -> DatasetSummary {
        let timestamps = self.history.observations().iter().map(|o| o.timestamp);
        DatasetSummary {
            total_observations: self.history.len(),
            cities: self.cities().map(str::to_string).collect(),
            rolling_window: self.window,
            first_timestamp: timestamps.clone().min(),
            last_timestamp: timestamps.max(),
            loaded_at: self.loaded_at,
        }
    }
}

fn city_ranges(enriched: &[EnrichedObservation]) -> Vec<(String, Range<usize>)> {
    let mut ranges: Vec<(String, Range<usize>)> = Vec::new();
    for (index, row) in enriched.iter().enumerate() {
        match ranges.last_mut() {
            Some((city, range)) if *city == row.observation.city => range.end = index + 1,
            _ => ranges.push((row.observation.city.clone(), index..index + 1)),
        }
    }
    ranges
}
