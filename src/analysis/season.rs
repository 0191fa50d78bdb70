use chrono::Datelike;
use std::fmt;

use super::AnalysisError;
use crate::models::Season;

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn];

    /// Map a calendar month (1-12) to its season.
    ///
    /// ```
    /// use temperature_anomaly_service::models::Season;
    ///
    /// assert_eq!(Season::from_month(1).unwrap(), Season::Winter);
    /// assert_eq!(Season::from_month(7).unwrap(), Season::Summer);
    /// assert!(Season::from_month(13).is_err());
    /// ```
    pub fn from_month(month: u32) -> Result<Self, AnalysisError> {
        match month {
            12 | 1 | 2 => Ok(Season::Winter),
            3..=5 => Ok(Season::Spring),
            6..=8 => Ok(Season::Summer),
            9..=11 => Ok(Season::Autumn),
            _ => Err(AnalysisError::InvalidMonth(month)),
        }
    }

    /// Season of a calendar date. Always defined since chrono months are 1-12.
    pub fn of_date(date: &impl Datelike) -> Self {
        Self::from_month(date.month()).unwrap_or(Season::Winter)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
