use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::analysis::live::score_live_reading;
use crate::analysis::{AnalysisError, AnalysisSnapshot};
use crate::fetch_error::FetchError;
use crate::fetcher::WeatherReadingSource;
use crate::models::{LiveAnomalyVerdict, Season};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl MonitorError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MonitorError::Fetch(e) => e.status_code(),
            MonitorError::Analysis(_) => None,
        }
    }
}

/// How a batch issues its per-city calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Successful live check for one city.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LiveCheck {
    pub description: String,
    pub verdict: LiveAnomalyVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthenticationFailure,
    FetchFailure,
    NoHistoricalData,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CityFailure {
    pub city: String,
    pub kind: FailureKind,
    pub status_code: Option<u16>,
    pub reason: String,
}

impl CityFailure {
    /// Per-city failure for `error`. Analysis errors other than missing
    /// seasonal history are not per-city and are handed back.
    fn from_error(city: &str, error: MonitorError) -> Result<Self, AnalysisError> {
        let kind = match error {
            MonitorError::Fetch(ref e) if e.is_authentication_failure() => {
                FailureKind::AuthenticationFailure
            }
            MonitorError::Fetch(_) => FailureKind::FetchFailure,
            MonitorError::Analysis(AnalysisError::NoHistoricalData { .. }) => {
                FailureKind::NoHistoricalData
            }
            MonitorError::Analysis(other) => return Err(other),
        };
        Ok(Self {
            city: city.to_string(),
            kind,
            status_code: error.status_code(),
            reason: error.to_string(),
        })
    }
}

/// Result of a multi-city live check. Both lists follow the requested order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct BatchReport {
    pub mode: FetchMode,
    pub checks: Vec<LiveCheck>,
    pub failures: Vec<CityFailure>,
}

/// Fetches live readings and scores them against a snapshot.
pub struct MonitoringService<S> {
    source: Arc<S>,
    concurrency: usize,
}

impl<S> Clone for MonitoringService<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            concurrency: self.concurrency,
        }
    }
}

impl<S: WeatherReadingSource> MonitoringService<S> {
    pub fn new(source: S, concurrency: usize) -> Self {
        Self {
            source: Arc::new(source),
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch and score one city for the season of `month`.
    ///
    /// Nothing is retried; a failed fetch yields no verdict.
    #[instrument(skip(self, snapshot))]
    pub async fn check_city(
        &self,
        snapshot: &AnalysisSnapshot,
        city: &str,
        month: u32,
    ) -> Result<LiveCheck, MonitorError> {
        Season::from_month(month)?;
        let reading = self.source.fetch_reading(city).await?;
        debug!("Live temperature for {}: {:.1}°C", city, reading.temperature);

        let rows = snapshot.city_rows(city).unwrap_or(&[]);
        let verdict = score_live_reading(city, reading.temperature, rows, month)?;
        if verdict.is_anomaly {
            info!(
                "Anomalous reading for {}: {:.1}°C ({:+.1}°C from {} mean)",
                city, verdict.current_temperature, verdict.deviation_from_mean, verdict.season
            );
        }

        Ok(LiveCheck {
            description: reading.description,
            verdict,
        })
    }

    pub async fn check_cities(
        &self,
        snapshot: &AnalysisSnapshot,
        cities: &[String],
        month: u32,
        mode: FetchMode,
    ) -> Result<BatchReport, AnalysisError> {
        self.check_cities_with(snapshot, cities, month, mode, |_| {})
            .await
    }

    /// Check every city, isolating failures per city. `on_done` is called
    /// once per city as its check completes.
    ///
    /// An invalid month fails the whole batch before anything is fetched.
    #[instrument(skip(self, snapshot, cities, on_done), fields(city_count = cities.len()))]
    pub async fn check_cities_with<F>(
        &self,
        snapshot: &AnalysisSnapshot,
        cities: &[String],
        month: u32,
        mode: FetchMode,
        on_done: F,
    ) -> Result<BatchReport, AnalysisError>
    where
        F: Fn(&str) + Sync,
    {
        Season::from_month(month)?;
        let on_done = &on_done;
        let results: Vec<_> = match mode {
            FetchMode::Sequential => {
                let mut results = Vec::with_capacity(cities.len());
                for city in cities {
                    results.push(self.check_one(snapshot, city, month, on_done).await);
                }
                results
            }
            FetchMode::Concurrent => {
                // Futures are lazy; `buffered` polls at most `concurrency` at once
                let checks: Vec<_> = cities
                    .iter()
                    .map(|city| self.check_one(snapshot, city, month, on_done))
                    .collect();
                stream::iter(checks)
                    .buffered(self.concurrency)
                    .collect()
                    .await
            }
        };

        let mut report = BatchReport {
            mode,
            ..BatchReport::default()
        };
        for (city, result) in results {
            match result {
                Ok(check) => report.checks.push(check),
                Err(e) => {
                    warn!("Live check for {} failed: {}", city, e);
                    report.failures.push(CityFailure::from_error(city, e)?);
                }
            }
        }

        info!(
            "Live check complete: {} succeeded, {} failed",
            report.checks.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn check_one<'a, F: Fn(&str)>(
        &self,
        snapshot: &AnalysisSnapshot,
        city: &'a str,
        month: u32,
        on_done: &F,
    ) -> (&'a str, Result<LiveCheck, MonitorError>) {
        let result = self.check_city(snapshot, city, month).await;
        on_done(city);
        (city, result)
    }
}
