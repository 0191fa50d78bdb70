#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Weather API rejected the API key (401)")]
    Unauthorized,
    #[error("Weather API returned status {0}")]
    Status(u16),
    #[error("Failed to parse weather response: {0}")]
    Parse(String),
}

impl FetchError {
    /// HTTP status behind the failure. `None` for network errors, timeouts
    /// and 200 bodies that carry no usable reading.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Request(e) => e.status().map(|s| s.as_u16()),
            FetchError::Unauthorized => Some(401),
            FetchError::Status(code) => Some(*code),
            FetchError::Parse(_) => None,
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }
}
