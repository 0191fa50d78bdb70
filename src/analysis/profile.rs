//! Per-city descriptive summaries for the single-city view.

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::stats::{fit_line, mean, quantile_sorted, sample_std};
use super::trend::yearly_means;
use crate::models::{AnomalyType, EnrichedObservation, Season};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeasonAnomalyCount {
    pub season: Season,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CitySummary {
    pub city: String,
    pub observations: usize,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
    pub mean_temperature: f64,
    pub std_temperature: Option<f64>,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub total_anomalies: usize,
    pub positive_anomalies: usize,
    pub negative_anomalies: usize,
    /// Seasons without anomalies are omitted
    pub anomalies_by_season: Vec<SeasonAnomalyCount>,
}

/// Box-plot style distribution of one season's temperatures.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeasonProfile {
    pub season: Season,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct YearlyPoint {
    pub year: i32,
    pub mean_temperature: f64,
    /// Value of the fitted trend line, absent with fewer than two years
    pub trend_value: Option<f64>,
}

/// Summary of one city's enriched rows. `None` for an empty slice.
pub fn summarize_city(rows: &[EnrichedObservation]) -> Option<CitySummary> {
    let first = rows.first()?;
    let temps: Vec<f64> = rows.iter().map(|r| r.observation.temperature).collect();

    let count_of = |kind: AnomalyType| rows.iter().filter(|r| r.anomaly_type == kind).count();

    let anomalies_by_season = Season::ALL
        .iter()
        .map(|season| SeasonAnomalyCount {
            season: *season,
            count: rows
                .iter()
                .filter(|r| r.is_anomaly && r.observation.season == *season)
                .count(),
        })
        .filter(|c| c.count > 0)
        .collect();

    Some(CitySummary {
        city: first.observation.city.clone(),
        observations: rows.len(),
        first_timestamp: rows.iter().map(|r| r.observation.timestamp).min()?,
        last_timestamp: rows.iter().map(|r| r.observation.timestamp).max()?,
        mean_temperature: mean(&temps)?,
        std_temperature: sample_std(&temps),
        min_temperature: temps.iter().copied().fold(f64::INFINITY, f64::min),
        max_temperature: temps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        total_anomalies: rows.iter().filter(|r| r.is_anomaly).count(),
        positive_anomalies: count_of(AnomalyType::Positive),
        negative_anomalies: count_of(AnomalyType::Negative),
        anomalies_by_season,
    })
}

/// Distribution per season in winter, spring, summer, autumn order. Seasons
/// with no rows are skipped.
pub fn seasonal_profile(rows: &[EnrichedObservation]) -> Vec<SeasonProfile> {
    Season::ALL
        .iter()
        .filter_map(|season| {
            let mut temps: Vec<f64> = rows
                .iter()
                .filter(|r| r.observation.season == *season)
                .map(|r| r.observation.temperature)
                .collect();
            temps.sort_by(f64::total_cmp);

            Some(SeasonProfile {
                season: *season,
                count: temps.len(),
                mean: mean(&temps)?,
                std: sample_std(&temps),
                min: *temps.first()?,
                q1: quantile_sorted(&temps, 0.25)?,
                median: quantile_sorted(&temps, 0.5)?,
                q3: quantile_sorted(&temps, 0.75)?,
                max: *temps.last()?,
            })
        })
        .collect()
}

/// Yearly means with the fitted trend line evaluated at each year.
pub fn yearly_series(rows: &[EnrichedObservation]) -> Vec<YearlyPoint> {
    let yearly = yearly_means(rows.iter().map(|r| &r.observation));
    let points: Vec<(f64, f64)> = yearly
        .iter()
        .map(|y| (y.year as f64, y.temperature))
        .collect();
    let fit = fit_line(&points);

    yearly
        .iter()
        .map(|y| YearlyPoint {
            year: y.year,
            mean_temperature: y.temperature,
            trend_value: fit.map(|f| f.at(y.year as f64)),
        })
        .collect()
}

/// Most recent year present in the rows.
pub fn latest_year(rows: &[EnrichedObservation]) -> Option<i32> {
    rows.iter().map(|r| r.observation.year).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::anomaly::detect;
    use crate::analysis::rolling::RollingPoint;
    use crate::models::Observation;
    use chrono::NaiveDate;

    fn row(year: i32, month: u32, temperature: f64, stats: RollingPoint) -> EnrichedObservation {
        let observation = Observation {
            city: "Lima".to_string(),
            timestamp: NaiveDate::from_ymd_opt(year, month, 10)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            temperature,
            year,
            month,
            season: Season::from_month(month).unwrap(),
        };
        detect(observation, stats)
    }

    fn band(mean: f64) -> RollingPoint {
        RollingPoint {
            mean: Some(mean),
            std: Some(1.0),
        }
    }

    fn rows() -> Vec<EnrichedObservation> {
        vec![
            row(2019, 1, 10.0, RollingPoint::default()),
            row(2019, 7, 30.0, band(20.0)),
            row(2020, 1, 0.0, band(10.0)),
            row(2020, 7, 20.0, band(20.0)),
        ]
    }

    #[test]
    fn test_summarize_city() {
        let summary = summarize_city(&rows()).unwrap();
        assert_eq!(summary.city, "Lima");
        assert_eq!(summary.observations, 4);
        assert_eq!(summary.mean_temperature, 15.0);
        assert_eq!(summary.min_temperature, 0.0);
        assert_eq!(summary.max_temperature, 30.0);
        assert_eq!(summary.total_anomalies, 2);
        assert_eq!(summary.positive_anomalies, 1);
        assert_eq!(summary.negative_anomalies, 1);
        assert_eq!(
            summary.anomalies_by_season,
            vec![
                SeasonAnomalyCount { season: Season::Winter, count: 1 },
                SeasonAnomalyCount { season: Season::Summer, count: 1 },
            ]
        );
        assert!(summarize_city(&[]).is_none());
    }

    #[test]
    fn test_seasonal_profile_skips_empty_seasons() {
        let profile = seasonal_profile(&rows());
        assert_eq!(profile.len(), 2);
        assert_eq!(profile[0].season, Season::Winter);
        assert_eq!(profile[0].min, 0.0);
        assert_eq!(profile[0].median, 5.0);
        assert_eq!(profile[0].max, 10.0);
        assert_eq!(profile[1].season, Season::Summer);
        assert_eq!(profile[1].mean, 25.0);
    }

    #[test]
    fn test_yearly_series_with_trend_line() {
        let series = yearly_series(&rows());
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].year, 2019);
        assert_eq!(series[0].mean_temperature, 20.0);
        assert_eq!(series[1].mean_temperature, 10.0);
        assert_eq!(series[0].trend_value, Some(20.0));
        assert_eq!(series[1].trend_value, Some(10.0));
        assert_eq!(latest_year(&rows()), Some(2020));
    }
}
