//! Cross-city comparison of the trend table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::trend::{ExcludedCity, TrendTable};
use crate::models::CityTrend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendSortKey {
    #[default]
    Slope,
    AvgTemperature,
    TemperatureRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CityValue {
    pub city: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ComparisonStats {
    pub mean_slope: f64,
    pub strongest_warming: CityValue,
    pub strongest_cooling: CityValue,
    pub hottest_city: CityValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendComparison {
    pub sort_by: TrendSortKey,
    pub ascending: bool,
    pub trends: Vec<CityTrend>,
    /// Absent when no city has a trend
    pub stats: Option<ComparisonStats>,
    pub excluded: Vec<ExcludedCity>,
}

impl TrendSortKey {
    fn value(self, trend: &CityTrend) -> f64 {
        match self {
            TrendSortKey::Slope => trend.trend_slope,
            TrendSortKey::AvgTemperature => trend.avg_temperature,
            TrendSortKey::TemperatureRange => trend.temperature_range,
        }
    }
}

/// Sort the trend table and compute comparison statistics.
///
/// Ties keep the table's city order.
pub fn compare_trends(table: &TrendTable, sort_by: TrendSortKey, ascending: bool) -> TrendComparison {
    let mut trends = table.trends.clone();
    trends.sort_by(|a, b| {
        let ordering = sort_by.value(a).total_cmp(&sort_by.value(b));
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });

    TrendComparison {
        sort_by,
        ascending,
        stats: comparison_stats(&table.trends),
        trends,
        excluded: table.excluded.clone(),
    }
}

fn comparison_stats(trends: &[CityTrend]) -> Option<ComparisonStats> {
    let pick = |key: TrendSortKey, max: bool| {
        trends
            .iter()
            .reduce(|best, t| {
                let ordering = key.value(t).total_cmp(&key.value(best));
                let better = if max { ordering.is_gt() } else { ordering.is_lt() };
                if better {
                    t
                } else {
                    best
                }
            })
            .map(|t| CityValue {
                city: t.city.clone(),
                value: key.value(t),
            })
    };

    let mean_slope = trends.iter().map(|t| t.trend_slope).sum::<f64>() / trends.len() as f64;

    Some(ComparisonStats {
        strongest_warming: pick(TrendSortKey::Slope, true)?,
        strongest_cooling: pick(TrendSortKey::Slope, false)?,
        hottest_city: pick(TrendSortKey::AvgTemperature, true)?,
        mean_slope,
    })
}
