use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::fetch_error::FetchError;
use crate::models::LiveReading;

pub const DEFAULT_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can produce the current temperature for one city.
///
/// Calls are independent of each other; batch callers decide whether to issue
/// them one after another or concurrently.
pub trait WeatherReadingSource: Send + Sync {
    fn fetch_reading(
        &self,
        city: &str,
    ) -> impl Future<Output = Result<LiveReading, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    main: Option<MainBlock>,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    description: Option<String>,
}

/// Client for the OpenWeatherMap current-weather endpoint (metric units).
///
/// Clones share one connection pool.
#[derive(Clone)]
pub struct OpenWeatherFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    country_code: Option<String>,
}

impl OpenWeatherFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        country_code: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            country_code,
        })
    }

    fn location_query(&self, city: &str) -> String {
        match &self.country_code {
            Some(code) => format!("{city},{code}"),
            None => city.to_string(),
        }
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn fetch(&self, city: &str) -> Result<LiveReading, FetchError> {
        debug!("Requesting current weather");
        let query = self.location_query(city);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Weather request for {} failed: {}", city, e);
                FetchError::Request(e)
            })?;

        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        match status {
            StatusCode::OK => {
                let body = response.text().await?;
                Self::parse_body(city, &body)
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Weather API rejected the API key");
                Err(FetchError::Unauthorized)
            }
            other => {
                warn!("Weather API returned {} for {}", other, city);
                Err(FetchError::Status(other.as_u16()))
            }
        }
    }

    fn parse_body(city: &str, body: &str) -> Result<LiveReading, FetchError> {
        let parsed: CurrentWeatherResponse =
            serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let temperature = parsed
            .main
            .and_then(|m| m.temp)
            .ok_or_else(|| FetchError::Parse("missing main.temp".to_string()))?;

        let description = parsed
            .weather
            .into_iter()
            .next()
            .and_then(|w| w.description)
            .ok_or_else(|| FetchError::Parse("missing weather[0].description".to_string()))?;

        Ok(LiveReading {
            city: city.to_string(),
            temperature,
            description,
            status_code: StatusCode::OK.as_u16(),
        })
    }
}

impl WeatherReadingSource for OpenWeatherFetcher {
    async fn fetch_reading(&self, city: &str) -> Result<LiveReading, FetchError> {
        self.fetch(city).await
    }
}
