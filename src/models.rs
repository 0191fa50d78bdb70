use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of four fixed three-month buckets keyed by calendar month.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Positive,
    Negative,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    StrongWarming,
    ModerateWarming,
    Stable,
    ModerateCooling,
    StrongCooling,
}

/// Coarse 1σ severity tier of a live reading against its seasonal baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureZone {
    BelowAverage,
    AboveAverage,
    WithinNormal,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AnomalyType::Positive => "positive",
            AnomalyType::Negative => "negative",
            AnomalyType::Normal => "normal",
        })
    }
}

impl std::fmt::Display for TrendClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TrendClass::StrongWarming => "strong warming",
            TrendClass::ModerateWarming => "moderate warming",
            TrendClass::Stable => "stable",
            TrendClass::ModerateCooling => "moderate cooling",
            TrendClass::StrongCooling => "strong cooling",
        })
    }
}

impl std::fmt::Display for TemperatureZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TemperatureZone::BelowAverage => "below average",
            TemperatureZone::AboveAverage => "above average",
            TemperatureZone::WithinNormal => "within normal",
        })
    }
}

/// A single tagged row of the historical table.
///
/// `year`, `month` and `season` are derived from `timestamp` when the row is
/// built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Observation {
    pub city: String,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub year: i32,
    pub month: u32,
    pub season: Season,
}

/// An observation augmented with its city's centered rolling statistics and
/// the ±2σ anomaly band derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrichedObservation {
    #[serde(flatten)]
    pub observation: Observation,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub upper_bound: Option<f64>,
    pub lower_bound: Option<f64>,
    pub is_anomaly: bool,
    pub anomaly_type: AnomalyType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CityTrend {
    pub city: String,
    /// °C per year
    pub trend_slope: f64,
    pub trend_class: TrendClass,
    /// Mean of the yearly mean temperatures
    pub avg_temperature: f64,
    /// Max minus min of the yearly mean temperatures
    pub temperature_range: f64,
}

/// A current reading as returned by a weather source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LiveReading {
    pub city: String,
    pub temperature: f64,
    pub description: String,
    pub status_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalRange {
    pub low: f64,
    pub high: f64,
}

/// Verdict for a live reading against the city's historical baseline for the
/// current season. Numeric fields are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LiveAnomalyVerdict {
    pub city: String,
    pub current_temperature: f64,
    pub season: Season,
    pub historical_mean: f64,
    pub historical_std: f64,
    pub normal_range: NormalRange,
    pub is_anomaly: bool,
    /// `positive` or `negative` when anomalous, absent otherwise
    pub anomaly_type: Option<AnomalyType>,
    pub temperature_zone: TemperatureZone,
    pub deviation_from_mean: f64,
}

impl Observation {
    /// Tag a reading with the calendar fields derived from its timestamp.
    pub fn new(city: impl Into<String>, timestamp: NaiveDateTime, temperature: f64) -> Self {
        Self {
            city: city.into(),
            year: timestamp.year(),
            month: timestamp.month(),
            season: Season::of_date(&timestamp),
            timestamp,
            temperature,
        }
    }
}

/// The raw historical table as produced by an importer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureHistory {
    observations: Vec<Observation>,
}

impl TemperatureHistory {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct cities in order of first appearance
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for observation in &self.observations {
            if !cities.iter().any(|c| c == &observation.city) {
                cities.push(observation.city.clone());
            }
        }
        cities
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatasetSummary {
    pub total_observations: usize,
    pub cities: Vec<String>,
    pub rolling_window: usize,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub loaded_at: DateTime<Utc>,
}
