use serde::Serialize;
use utoipa::ToSchema;

use super::anomaly::{classify_against, SIGMA_MULTIPLIER};
use super::stats::{mean, round2, sample_std};
use super::AnalysisError;
use crate::models::{
    AnomalyType, EnrichedObservation, LiveAnomalyVerdict, NormalRange, Season, TemperatureZone,
};

/// Mean and spread of a city's historical temperatures in one season.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SeasonalBaseline {
    pub season: Season,
    pub mean: f64,
    /// Sample std; 0 when the season holds a single observation
    pub std: f64,
    pub samples: usize,
}

impl SeasonalBaseline {
    pub fn lower_bound(&self) -> f64 {
        self.mean - SIGMA_MULTIPLIER * self.std
    }

    pub fn upper_bound(&self) -> f64 {
        self.mean + SIGMA_MULTIPLIER * self.std
    }
}

impl TemperatureZone {
    /// 1σ tier, evaluated independently of the 2σ anomaly band.
    pub fn classify(reading: f64, mean: f64, std: f64) -> Self {
        if reading < mean - std {
            TemperatureZone::BelowAverage
        } else if reading > mean + std {
            TemperatureZone::AboveAverage
        } else {
            TemperatureZone::WithinNormal
        }
    }
}

/// Baseline over the rows of `city` that fall in `season`.
pub fn seasonal_baseline(
    city: &str,
    season: Season,
    history: &[EnrichedObservation],
) -> Result<SeasonalBaseline, AnalysisError> {
    let temps: Vec<f64> = history
        .iter()
        .map(|row| &row.observation)
        .filter(|o| o.city == city && o.season == season)
        .map(|o| o.temperature)
        .collect();

    let mean = mean(&temps).ok_or_else(|| AnalysisError::NoHistoricalData {
        city: city.to_string(),
        season,
    })?;

    Ok(SeasonalBaseline {
        season,
        mean,
        std: sample_std(&temps).unwrap_or(0.0),
        samples: temps.len(),
    })
}

/// Score a live reading for `city` against the baseline of the season that
/// `month` falls in.
///
/// Computation runs at full precision; numeric fields of the verdict are
/// rounded to two decimals.
pub fn score_live_reading(
    city: &str,
    reading: f64,
    history: &[EnrichedObservation],
    month: u32,
) -> Result<LiveAnomalyVerdict, AnalysisError> {
    let season = Season::from_month(month)?;
    let baseline = seasonal_baseline(city, season, history)?;
    Ok(verdict_from_baseline(city, reading, &baseline))
}

pub fn verdict_from_baseline(
    city: &str,
    reading: f64,
    baseline: &SeasonalBaseline,
) -> LiveAnomalyVerdict {
    let lower = baseline.lower_bound();
    let upper = baseline.upper_bound();

    let anomaly_type = match classify_against(reading, lower, upper) {
        AnomalyType::Normal => None,
        kind => Some(kind),
    };

    LiveAnomalyVerdict {
        city: city.to_string(),
        current_temperature: round2(reading),
        season: baseline.season,
        historical_mean: round2(baseline.mean),
        historical_std: round2(baseline.std),
        normal_range: NormalRange {
            low: round2(lower),
            high: round2(upper),
        },
        is_anomaly: anomaly_type.is_some(),
        anomaly_type,
        temperature_zone: TemperatureZone::classify(reading, baseline.mean, baseline.std),
        deviation_from_mean: round2(reading - baseline.mean),
    }
}
