use std::time::Duration;

/// Errors from the hosting platform or the transport underneath it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API token")]
    InvalidToken,

    #[error("response from {0} had no result")]
    EmptyResult(&'static str),
}

impl ApiError {
    /// Network failures, timeouts and 5xx responses may succeed when retried.
    /// Everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Json(_) | Self::InvalidToken | Self::EmptyResult(_) => false,
        }
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }
}
