use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::models::{Observation, TemperatureHistory};

/// Malformed input: the whole load is aborted, no partial table is kept.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid timestamp at line {line}: '{value}'")]
    InvalidTimestamp { line: u64, value: String },

    #[error("Invalid temperature at line {line}: '{value}'")]
    InvalidTemperature { line: u64, value: String },

    #[error("Empty city name at line {line}")]
    EmptyCity { line: u64 },

    #[error("No observations found in input")]
    Empty,
}

const CITY_COLUMN: &str = "city";
const TIMESTAMP_COLUMN: &str = "timestamp";
const TEMPERATURE_COLUMN: &str = "temperature";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Loader for `city,timestamp,temperature` CSV files.
///
/// Columns are located by header name, so their order does not matter and
/// extra columns are ignored.
pub struct CsvImporter {
    path: PathBuf,
}

struct ColumnIndex {
    city: usize,
    timestamp: usize,
    temperature: usize,
}

impl CsvImporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn import(&self) -> Result<TemperatureHistory, ImportError> {
        info!("Importing temperature history");
        let file = File::open(&self.path)?;
        Self::parse_reader(file)
    }

    pub fn parse_str(text: &str) -> Result<TemperatureHistory, ImportError> {
        Self::parse_reader(text.as_bytes())
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<TemperatureHistory, ImportError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Self::locate_columns(rdr.headers()?)?;
        debug!(
            "Located columns city={}, timestamp={}, temperature={}",
            columns.city, columns.timestamp, columns.temperature
        );

        let mut observations = Vec::new();
        for record in rdr.records() {
            let record = record?;
            observations.push(Self::parse_record(&record, &columns)?);
        }

        let history = TemperatureHistory::new(observations);
        if history.is_empty() {
            return Err(ImportError::Empty);
        }

        info!(
            "Parsed {} observations for {} cities",
            history.len(),
            history.cities().len()
        );
        Ok(history)
    }

    fn locate_columns(headers: &StringRecord) -> Result<ColumnIndex, ImportError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
        };

        Ok(ColumnIndex {
            city: find(CITY_COLUMN)?,
            timestamp: find(TIMESTAMP_COLUMN)?,
            temperature: find(TEMPERATURE_COLUMN)?,
        })
    }

    fn parse_record(record: &StringRecord, columns: &ColumnIndex) -> Result<Observation, ImportError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |index: usize| record.get(index).unwrap_or("");

        let city = field(columns.city);
        if city.is_empty() {
            return Err(ImportError::EmptyCity { line });
        }

        let raw_timestamp = field(columns.timestamp);
        let timestamp =
            parse_timestamp(raw_timestamp).ok_or_else(|| ImportError::InvalidTimestamp {
                line,
                value: raw_timestamp.to_string(),
            })?;

        let raw_temperature = field(columns.temperature);
        let temperature = raw_temperature
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| ImportError::InvalidTemperature {
                line,
                value: raw_temperature.to_string(),
            })?;

        Ok(Observation::new(city, timestamp, temperature))
    }
}

/// Parse an ISO-8601 date or datetime. Offsets are dropped in favour of the
/// local wall-clock time they were written in.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}
