use crate::models::Season;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),
    #[error("Invalid rolling window: {0} (must be greater than zero)")]
    InvalidWindow(usize),
    #[error("Insufficient history for {city}: {years} distinct year(s), at least 2 required")]
    InsufficientHistory { city: String, years: usize },
    #[error("No historical data for {city} in {season}")]
    NoHistoricalData { city: String, season: Season },
}
