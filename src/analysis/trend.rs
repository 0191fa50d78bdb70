use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::stats::{fit_line, LinearFit};
use super::AnalysisError;
use crate::models::{CityTrend, Observation, TrendClass};

const STRONG_SLOPE: f64 = 0.1;
const MODERATE_SLOPE: f64 = 0.01;

impl TrendClass {
    /// Classify a slope in °C/year.
    ///
    /// Warming checks run before cooling checks and the first match wins, so
    /// a slope of exactly 0.1 is moderate warming.
    pub fn from_slope(slope: f64) -> Self {
        if slope > STRONG_SLOPE {
            TrendClass::StrongWarming
        } else if slope > MODERATE_SLOPE {
            TrendClass::ModerateWarming
        } else if slope < -STRONG_SLOPE {
            TrendClass::StrongCooling
        } else if slope < -MODERATE_SLOPE {
            TrendClass::ModerateCooling
        } else {
            TrendClass::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct YearlyMean {
    pub year: i32,
    pub temperature: f64,
}

/// A city left out of the trend table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExcludedCity {
    pub city: String,
    pub distinct_years: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TrendTable {
    pub trends: Vec<CityTrend>,
    pub excluded: Vec<ExcludedCity>,
}

impl TrendTable {
    pub fn for_city(&self, city: &str) -> Option<&CityTrend> {
        self.trends.iter().find(|t| t.city == city)
    }
}

/// Arithmetic mean temperature per calendar year, ascending by year.
pub fn yearly_means<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Vec<YearlyMean> {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for observation in observations {
        let entry = by_year.entry(observation.year).or_insert((0.0, 0));
        entry.0 += observation.temperature;
        entry.1 += 1;
    }

    by_year
        .into_iter()
        .map(|(year, (sum, count))| YearlyMean {
            year,
            temperature: sum / count as f64,
        })
        .collect()
}

/// OLS fit of yearly mean temperature against year.
pub fn fit_yearly(city: &str, yearly: &[YearlyMean]) -> Result<LinearFit, AnalysisError> {
    let points: Vec<(f64, f64)> = yearly
        .iter()
        .map(|y| (y.year as f64, y.temperature))
        .collect();

    fit_line(&points).ok_or_else(|| AnalysisError::InsufficientHistory {
        city: city.to_string(),
        years: yearly.len(),
    })
}

/// Long-term trend for one city's observations.
pub fn estimate_city_trend<'a>(
    city: &str,
    observations: impl IntoIterator<Item = &'a Observation>,
) -> Result<CityTrend, AnalysisError> {
    let yearly = yearly_means(observations);
    let fit = fit_yearly(city, &yearly)?;

    let temps: Vec<f64> = yearly.iter().map(|y| y.temperature).collect();
    let avg_temperature = temps.iter().sum::<f64>() / temps.len() as f64;
    let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = temps.iter().copied().fold(f64::INFINITY, f64::min);

    Ok(CityTrend {
        city: city.to_string(),
        trend_slope: fit.slope,
        trend_class: TrendClass::from_slope(fit.slope),
        avg_temperature,
        temperature_range: max - min,
    })
}

/// Trend per city, in the given city order. Cities with fewer than two
/// distinct years are listed as excluded instead of failing the table.
pub fn estimate_trends<'a, I>(cities: I) -> TrendTable
where
    I: IntoIterator<Item = (&'a str, Vec<&'a Observation>)>,
{
    let mut table = TrendTable::default();
    for (city, observations) in cities {
        match estimate_city_trend(city, observations) {
            Ok(trend) => table.trends.push(trend),
            Err(AnalysisError::InsufficientHistory { city, years }) => {
                table.excluded.push(ExcludedCity {
                    reason: format!("{years} distinct year(s), at least 2 required"),
                    city,
                    distinct_years: years,
                });
            }
            Err(e) => table.excluded.push(ExcludedCity {
                city: city.to_string(),
                distinct_years: 0,
                reason: e.to_string(),
            }),
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Season;
    use chrono::NaiveDate;

    fn obs(year: i32, month: u32, temperature: f64) -> Observation {
        Observation {
            city: "X".to_string(),
            timestamp: NaiveDate::from_ymd_opt(year, month, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            temperature,
            year,
            month,
            season: Season::from_month(month).unwrap(),
        }
    }

    #[test]
    fn test_linear_yearly_series() {
        let rows = vec![obs(2000, 1, 10.0), obs(2001, 1, 11.0), obs(2002, 1, 12.0)];
        let trend = estimate_city_trend("X", &rows).unwrap();
        assert_eq!(trend.trend_slope, 1.0);
        assert_eq!(trend.trend_class, TrendClass::StrongWarming);
        assert_eq!(trend.avg_temperature, 11.0);
        assert_eq!(trend.temperature_range, 2.0);
    }

    #[test]
    fn test_constant_series_is_stable() {
        let rows = vec![obs(2000, 1, 15.0), obs(2001, 7, 15.0)];
        let trend = estimate_city_trend("X", &rows).unwrap();
        assert_eq!(trend.trend_slope, 0.0);
        assert_eq!(trend.trend_class, TrendClass::Stable);
        assert_eq!(trend.temperature_range, 0.0);
    }

    #[test]
    fn test_single_year_is_insufficient() {
        let rows = vec![obs(2000, 1, 1.0), obs(2000, 6, 20.0)];
        assert_eq!(
            estimate_city_trend("X", &rows),
            Err(AnalysisError::InsufficientHistory {
                city: "X".to_string(),
                years: 1
            })
        );
    }

    #[test]
    fn test_range_uses_yearly_means_not_daily_values() {
        let rows = vec![
            obs(2000, 1, 0.0),
            obs(2000, 7, 20.0),
            obs(2001, 1, 2.0),
            obs(2001, 7, 22.0),
        ];
        let trend = estimate_city_trend("X", &rows).unwrap();
        assert_eq!(trend.avg_temperature, 11.0);
        assert_eq!(trend.temperature_range, 2.0);
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(TrendClass::from_slope(0.2), TrendClass::StrongWarming);
        assert_eq!(TrendClass::from_slope(0.1), TrendClass::ModerateWarming);
        assert_eq!(TrendClass::from_slope(0.05), TrendClass::ModerateWarming);
        assert_eq!(TrendClass::from_slope(0.01), TrendClass::Stable);
        assert_eq!(TrendClass::from_slope(0.0), TrendClass::Stable);
        assert_eq!(TrendClass::from_slope(-0.01), TrendClass::Stable);
        assert_eq!(TrendClass::from_slope(-0.05), TrendClass::ModerateCooling);
        assert_eq!(TrendClass::from_slope(-0.1), TrendClass::ModerateCooling);
        assert_eq!(TrendClass::from_slope(-0.2), TrendClass::StrongCooling);
    }

    #[test]
    fn test_estimate_trends_excludes_short_cities() {
        let long = vec![obs(2000, 1, 10.0), obs(2001, 1, 11.0)];
        let short = vec![obs(2005, 1, 3.0)];
        let table = estimate_trends(vec![
            ("Long", long.iter().collect()),
            ("Short", short.iter().collect()),
        ]);
        assert_eq!(table.trends.len(), 1);
        assert_eq!(table.trends[0].city, "Long");
        assert_eq!(table.excluded.len(), 1);
        assert_eq!(table.excluded[0].city, "Short");
        assert_eq!(table.excluded[0].distinct_years, 1);
        assert!(table.for_city("Short").is_none());
    }
}
