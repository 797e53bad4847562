use thiserror::Error;

/// Failure of either outbound fetch. Converted into `FetchState::Error` at the
/// lifecycle boundary and never surfaced to the renderer as a panic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A token that found no free spot on the canvas. Recorded in the pack result
/// and logged; the cloud simply renders without it.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("no room for {text:?} after {attempts} spiral steps")]
pub struct LayoutExhaustion {
    pub text: String,
    pub attempts: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("retry is only allowed after a failed fetch")]
    NotInError,
}
