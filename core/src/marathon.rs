//! Entry handle bundling one connection.
//!
//! Every accessor and every entity it returns holds a clone of the
//! `Marathon` that created it. Building a new `Marathon` with another URL or
//! other credentials leaves existing accessors on the old connection.

use std::sync::Arc;

use serde_json::Value;

use crate::app::Apps;
use crate::config::{ConnectionOptions, DEFAULT_URL};
use crate::connection::Connection;
use crate::deployment::Deployments;
use crate::error::{MarathonError, Result};
use crate::event_subscriptions::EventSubscriptions;
use crate::group::Groups;
use crate::http::Transport;
use crate::leader::Leader;
use crate::queue::Queues;
use crate::task::Tasks;

#[derive(Debug, Clone)]
pub struct Marathon {
    connection: Connection,
}

impl Marathon {
    pub fn new(url: &str) -> Self {
        Self::with_options(url, ConnectionOptions::default())
    }

    pub fn with_options(url: &str, options: ConnectionOptions) -> Self {
        Self::from_connection(Connection::new(url, options))
    }

    pub fn with_transport(url: &str, options: ConnectionOptions, transport: Arc<dyn Transport>) -> Self {
        Self::from_connection(Connection::with_transport(url, options, transport))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn apps(&self) -> Apps {
        Apps::new(self.clone())
    }

    pub fn tasks(&self) -> Tasks {
        Tasks::new(self.clone())
    }

    pub fn deployments(&self) -> Deployments {
        Deployments::new(self.clone())
    }

    pub fn groups(&self) -> Groups {
        Groups::new(self.clone())
    }

    pub fn queues(&self) -> Queues {
        Queues::new(self.clone())
    }

    pub fn event_subscriptions(&self) -> EventSubscriptions {
        EventSubscriptions::new(self.clone())
    }

    pub fn leader(&self) -> Leader {
        Leader::new(self.clone())
    }

    /// Server information from `/v2/info`.
    pub fn info(&self) -> Result<Value> {
        self.connection.get("/v2/info", &[])
    }

    /// Plain-text liveness check against `/ping`.
    pub fn ping(&self) -> Result<String> {
        match self.connection.get("/ping", &[])? {
            Value::String(s) => Ok(s),
            other => Err(MarathonError::unexpected(format!("ping returned {other}"))),
        }
    }
}

impl Default for Marathon {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{marathon, FakeTransport};
    use serde_json::json;

    #[test]
    fn default_points_at_localhost() {
        assert_eq!(Marathon::default().connection().url(), "http://localhost:8080");
    }

    #[test]
    fn ping_returns_raw_body() {
        let transport = FakeTransport::new();
        transport.push_raw(200, "pong\n");
        assert_eq!(marathon(&transport).ping().unwrap(), "pong\n");
        assert_eq!(transport.last_request().url, "http://localhost:8080/ping");
    }

    #[test]
    fn info_returns_json() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"name": "marathon", "version": "1.4.0"}));
        let info = marathon(&transport).info().unwrap();
        assert_eq!(info["name"], "marathon");
        assert_eq!(transport.last_request().url, "http://localhost:8080/v2/info");
    }

    #[test]
    fn accessors_keep_the_connection_they_were_built_with() {
        let old = Marathon::with_transport("http://old:8080", ConnectionOptions::default(), FakeTransport::new());
        let apps = old.apps();
        let _new = Marathon::with_transport("http://new:8080", ConnectionOptions::default(), FakeTransport::new());
        assert_eq!(apps.marathon().connection().url(), "http://old:8080");
    }
}
