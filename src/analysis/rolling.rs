use super::stats::{mean, sample_std};
use super::AnalysisError;
use crate::models::Observation;

pub const DEFAULT_WINDOW: usize = 30;

/// Rolling mean and sample standard deviation at one position.
///
/// Both are `None` where the centered window leaves the series. With a window
/// of width 1 the mean is defined but the sample std is not.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RollingPoint {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

/// All observations of one city, in timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct CitySeries {
    pub city: String,
    pub observations: Vec<Observation>,
}

/// Split a table into one owned series per city, in order of first
/// appearance, each sorted by timestamp.
///
/// The sort is stable so rows sharing a timestamp keep their input order.
pub fn partition_by_city(observations: &[Observation]) -> Vec<CitySeries> {
    let mut series: Vec<CitySeries> = Vec::new();
    for observation in observations {
        match series.iter_mut().find(|s| s.city == observation.city) {
            Some(existing) => existing.observations.push(observation.clone()),
            None => series.push(CitySeries {
                city: observation.city.clone(),
                observations: vec![observation.clone()],
            }),
        }
    }

    for city_series in &mut series {
        city_series.observations.sort_by_key(|o| o.timestamp);
    }
    series
}

/// Centered rolling statistics over row index.
///
/// For width `w`, position `i` covers rows `i - w/2 ..= i + (w-1)/2`. Rows
/// whose window would leave the series get no statistics, so a series shorter
/// than the window is all `None`.
pub fn rolling_window(values: &[f64], window: usize) -> Result<Vec<RollingPoint>, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::InvalidWindow(window));
    }

    let before = window / 2;
    let after = (window - 1) / 2;

    let points = (0..values.len())
        .map(|i| {
            if i < before || i + after >= values.len() {
                return RollingPoint::default();
            }
            let slice = &values[i - before..=i + after];
            RollingPoint {
                mean: mean(slice),
                std: sample_std(slice),
            }
        })
        .collect();

    Ok(points)
}
