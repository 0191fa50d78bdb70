use super::rolling::RollingPoint;
use crate::models::{AnomalyType, EnrichedObservation, Observation};

/// Width of the anomaly band in standard deviations.
pub const SIGMA_MULTIPLIER: f64 = 2.0;

/// Classify a temperature against a `[lower, upper]` band.
pub fn classify_against(temperature: f64, lower: f64, upper: f64) -> AnomalyType {
    if temperature > upper {
        AnomalyType::Positive
    } else if temperature < lower {
        AnomalyType::Negative
    } else {
        AnomalyType::Normal
    }
}

/// Attach rolling statistics and the anomaly band to an observation.
///
/// Rows without both a rolling mean and std carry no bounds and are normal.
pub fn detect(observation: Observation, stats: RollingPoint) -> EnrichedObservation {
    let bounds = match (stats.mean, stats.std) {
        (Some(mean), Some(std)) => Some((
            mean - SIGMA_MULTIPLIER * std,
            mean + SIGMA_MULTIPLIER * std,
        )),
        _ => None,
    };

    let anomaly_type = bounds
        .map(|(lower, upper)| classify_against(observation.temperature, lower, upper))
        .unwrap_or(AnomalyType::Normal);

    EnrichedObservation {
        observation,
        rolling_mean: stats.mean,
        rolling_std: stats.std,
        upper_bound: bounds.map(|(_, upper)| upper),
        lower_bound: bounds.map(|(lower, _)| lower),
        is_anomaly: anomaly_type != AnomalyType::Normal,
        anomaly_type,
    }
}
