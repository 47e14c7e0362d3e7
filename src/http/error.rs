use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            HttpError::InvalidUrl {
                url,
                message: err.to_string(),
            }
        } else {
            HttpError::Transport(err.to_string())
        }
    }
}
