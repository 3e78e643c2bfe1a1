//! Connection configuration.
//!
//! Options are fixed when a [`Connection`](crate::Connection) is built; the
//! connection exposes no setters. Where the values come from (environment,
//! config file, flags) is up to the caller: the struct deserializes from any
//! serde source with camelCase keys and per-field defaults.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Base URL used when the caller does not supply one.
pub const DEFAULT_URL: &str = "http://localhost:8080";

/// Request timeout used when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionOptions {
    /// Basic-auth user; only sent together with `password`.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Skip TLS certificate verification (self-signed clusters).
    pub insecure: bool,
    /// Per-request timeout, given in seconds when deserialized.
    #[serde(deserialize_with = "deserialize_secs")]
    pub timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConnectionOptions {
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credentials, present only when both halves are configured.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

// Keeps the password out of logs and panic messages.
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn deserialize_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert!(!options.insecure);
        assert!(options.basic_auth().is_none());
    }

    #[test]
    fn basic_auth_needs_both_halves() {
        let options = ConnectionOptions {
            username: Some("user".to_string()),
            ..ConnectionOptions::default()
        };
        assert!(options.basic_auth().is_none());

        let options = options.with_basic_auth("user", "secret");
        assert_eq!(options.basic_auth(), Some(("user", "secret")));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let options: ConnectionOptions =
            serde_json::from_str(r#"{"username":"u","password":"p","timeout":2.5}"#).unwrap();
        assert_eq!(options.basic_auth(), Some(("u", "p")));
        assert_eq!(options.timeout, Duration::from_millis(2500));
        assert!(!options.insecure);

        let options: ConnectionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ConnectionOptions::default());
    }

    #[test]
    fn rejects_negative_timeout() {
        let result: Result<ConnectionOptions, _> = serde_json::from_str(r#"{"timeout":-1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let options = ConnectionOptions::default().with_basic_auth("user", "secret");
        let rendered = format!("{options:?}");
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("secret"));
    }
}
