//! Error types for the Marathon API client.
//!
//! # Design
//! A single flat enum covers the three failure families: local validation
//! (`Argument`), server-reported failures (classified from the HTTP status by
//! [`classify`]) and transport failures (`Io`, `Http`). Every variant carries
//! a human-readable message, taken from the server body where one exists.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum MarathonError {
    /// Invalid local input, detected before any network call.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The server returned 400 or 422.
    #[error("client error: {0}")]
    Client(String),

    /// The server returned 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server returned 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server returned 409, usually a deployment already in progress.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The server returned 500.
    #[error("server error: {0}")]
    Server(String),

    /// Any other non-2xx status, or a 2xx body missing the expected data
    /// (`status` is `None` in that case).
    #[error(
        "unexpected response{}: {message}",
        .status.map(|s| format!(" (status {s})")).unwrap_or_default()
    )]
    UnexpectedResponse { status: Option<u16>, message: String },

    /// A deployment did not finish within the requested bound.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Reserved for credential failures the API reports apart from a 401.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// DNS, connect, reset or socket timeout while talking to the server.
    #[error("HTTP call failed: {0}")]
    Io(String),

    /// Any other transport failure, passed through unchanged.
    #[error("HTTP transport error: {0}")]
    Http(Box<ureq::Error>),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, MarathonError>;

impl MarathonError {
    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        MarathonError::UnexpectedResponse {
            status: None,
            message: message.into(),
        }
    }
}

impl From<ureq::Error> for MarathonError {
    fn from(err: ureq::Error) -> Self {
        let is_io = matches!(
            err,
            ureq::Error::Io(_)
                | ureq::Error::HostNotFound
                | ureq::Error::ConnectionFailed
                | ureq::Error::Timeout(_)
        );
        if is_io {
            MarathonError::Io(err.to_string())
        } else {
            MarathonError::Http(Box::new(err))
        }
    }
}

/// Map a non-2xx status code and its raw body to a `MarathonError`.
pub fn classify(status: u16, body: &str) -> MarathonError {
    let message = error_message(body);
    match status {
        400 | 422 => MarathonError::Client(message),
        401 => MarathonError::Unauthorized(message),
        404 => MarathonError::NotFound(message),
        409 => MarathonError::Conflict(message),
        500 => MarathonError::Server(message),
        _ => MarathonError::UnexpectedResponse {
            status: Some(status),
            message,
        },
    }
}

/// Prefer the body's `message`, then its `errors`, then the raw body.
fn error_message(body: &str) -> String {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    ["message", "errors"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.to_string())
}
