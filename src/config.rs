use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::analysis::DEFAULT_WINDOW;
use crate::fetcher::DEFAULT_ENDPOINT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub openweather_api_key: Option<String>,
    pub openweather_url: String,
    pub openweather_country_code: Option<String>,
    pub history_csv_path: Option<PathBuf>,
    pub rolling_window: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_concurrency: usize,
}

// API key stays out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field(
                "openweather_api_key",
                &self.openweather_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openweather_url", &self.openweather_url)
            .field("openweather_country_code", &self.openweather_country_code)
            .field("history_csv_path", &self.history_csv_path)
            .field("rolling_window", &self.rolling_window)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .finish()
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rolling_window = parsed("ROLLING_WINDOW", DEFAULT_WINDOW)?;
        if rolling_window == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ROLLING_WINDOW",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parsed("SERVER_PORT", 8080)?,
            openweather_api_key: optional("OPENWEATHER_API_KEY"),
            openweather_url: optional("OPENWEATHER_URL")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            openweather_country_code: optional("OPENWEATHER_COUNTRY_CODE"),
            history_csv_path: optional("HISTORY_CSV_PATH").map(PathBuf::from),
            rolling_window,
            fetch_timeout_secs: parsed("FETCH_TIMEOUT_SECS", 10)?,
            fetch_concurrency: parsed("FETCH_CONCURRENCY", 5)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
