//! Error types for the Misskey poster.

use http::StatusCode;
use thiserror::Error;

use crate::context::Cancellation;

/// Boxed error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring the poster or constructing its inputs.
#[derive(Error, Debug)]
pub enum PosterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A note that cannot be posted
    #[error("Invalid note: {0}")]
    InvalidNote(String),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors returned by a single note submission.
///
/// Every failure is surfaced to the caller as-is; nothing here is retried.
#[derive(Error, Debug)]
pub enum PostError {
    /// The caller's context was done before a token became available.
    #[error("rate limiter error: {0}")]
    RateLimited(#[source] Cancellation),

    /// The payload could not be encoded.
    #[error("failed to serialize note: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be constructed (usually a malformed host).
    #[error("failed to create HTTP request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Network failure, timeout, or cancellation while the call was in flight.
    #[error("failed to send request to Misskey API: {0}")]
    Transport(#[source] BoxError),

    /// The API answered with something other than 200 OK.
    #[error("Misskey API returned non-OK status: {status}")]
    Api { status: StatusCode },
}

impl PostError {
    /// Status code returned by the API, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PostError::Api { status } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for configuration and construction.
pub type Result<T> = std::result::Result<T, PosterError>;
