//! Request building and response interpretation for the Marathon API.
//!
//! # Design
//! `Connection` holds the base URL, the immutable options and a shared
//! [`Transport`]. Each call is split the same way: [`Connection::build_request`]
//! turns method/path/query/body into an `HttpRequest`, the transport performs
//! one exchange, and [`Connection::parse_response`] turns the `HttpResponse`
//! into JSON or a classified error. Redirects are followed here, re-issuing
//! the original method and body, so every transport behaves the same.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use serde_json::Value;
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::error::{classify, MarathonError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};

/// Query parameters; entries with a `None` value are dropped when encoding.
pub type QueryParams = Vec<(&'static str, Option<String>)>;

const MAX_REDIRECTS: usize = 10;

const USER_AGENT: &str = concat!("marathon-core/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct Connection {
    base_url: String,
    options: ConnectionOptions,
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Connect through a `ureq` agent configured from `options`.
    pub fn new(base_url: &str, options: ConnectionOptions) -> Self {
        let transport = Arc::new(UreqTransport::new(&options));
        Self::with_transport(base_url, options, transport)
    }

    pub fn with_transport(base_url: &str, options: ConnectionOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            transport,
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn get(&self, path: &str, query: &[(&str, Option<String>)]) -> Result<Value> {
        self.request(HttpMethod::Get, path, query, None)
    }

    pub fn post(&self, path: &str, query: &[(&str, Option<String>)], body: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Post, path, query, body)
    }

    pub fn put(&self, path: &str, query: &[(&str, Option<String>)], body: Option<&Value>) -> Result<Value> {
        self.request(HttpMethod::Put, path, query, body)
    }

    pub fn delete(&self, path: &str, query: &[(&str, Option<String>)]) -> Result<Value> {
        self.request(HttpMethod::Delete, path, query, None)
    }

    /// Perform one API call and return the parsed JSON body.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, Option<String>)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut request = self.build_request(method, path, query, body);
        for _ in 0..=MAX_REDIRECTS {
            debug!(%method, url = %request.url, "sending request");
            let response = self.transport.execute(&request)?;
            debug!(status = response.status, "received response");
            match redirect_location(&response) {
                Some(location) => request.url = resolve_location(&request.url, location),
                None => return Self::parse_response(response),
            }
        }
        Err(MarathonError::unexpected(format!(
            "too many redirects (more than {MAX_REDIRECTS})"
        )))
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, Option<String>)],
        body: Option<&Value>,
    ) -> HttpRequest {
        let mut url = format!("{}{}", self.base_url, escape_path(path));
        let query = encode_query(query);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some((user, pass)) = self.options.basic_auth() {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            headers.push(("Authorization".to_string(), format!("Basic {token}")));
        }

        HttpRequest {
            method,
            url,
            headers,
            body: body.map(Value::to_string),
        }
    }

    /// 2xx yields the JSON body, or the raw body as a string when it is empty
    /// or not JSON. Anything else is classified into an error.
    pub fn parse_response(response: HttpResponse) -> Result<Value> {
        if !(200..300).contains(&response.status) {
            return Err(classify(response.status, &response.body));
        }
        if response.body.trim().is_empty() {
            return Ok(Value::String(response.body));
        }
        Ok(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.base_url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection {{ url: {} }}", self.base_url)
    }
}

/// Percent-escape every path segment, keeping the `/` separators.
fn escape_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_query(query: &[(&str, Option<String>)]) -> String {
    query
        .iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| format!("{}={}", urlencoding::encode(name), urlencoding::encode(v)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn redirect_location(response: &HttpResponse) -> Option<&str> {
    match response.status {
        301 | 302 | 303 | 307 | 308 => response.header("location"),
        _ => None,
    }
}

/// Resolve a `Location` header against the URL that produced it.
fn resolve_location(current: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    let origin_end = current
        .find("://")
        .and_then(|scheme_end| current[scheme_end + 3..].find('/').map(|i| scheme_end + 3 + i))
        .unwrap_or(current.len());
    let origin = &current[..origin_end];
    if location.starts_with('/') {
        format!("{origin}{location}")
    } else {
        format!("{origin}/{location}")
    }
}

/// Build a resource path from a prefix and an id that may itself start with
/// `/` (app and group ids are absolute paths).
pub(crate) fn resource_path(prefix: &str, id: &str) -> String {
    format!("{prefix}/{}", id.trim_start_matches('/'))
}

/// Encode a boolean flag the way the API expects: present as `true`, or
/// absent.
pub(crate) fn flag(value: bool) -> Option<String> {
    value.then(|| "true".to_string())
}
