//! HTTP callback registrations for the Marathon event bus.

use serde_json::Value;

use crate::entity;
use crate::error::Result;
use crate::marathon::Marathon;

/// Event subscription operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct EventSubscriptions {
    marathon: Marathon,
}

impl EventSubscriptions {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    /// Registered callback URLs.
    pub fn list(&self) -> Result<Vec<String>> {
        let json = self.marathon.connection().get("/v2/eventSubscriptions", &[])?;
        Ok(entity::list(&json, "callbackUrls")?
            .iter()
            .filter_map(|u| u.as_str().map(str::to_string))
            .collect())
    }

    /// Register `callback_url`; returns the server's acknowledgement.
    pub fn register(&self, callback_url: &str) -> Result<Value> {
        self.marathon
            .connection()
            .post("/v2/eventSubscriptions", &[("callbackUrl", Some(callback_url.to_string()))], None)
    }

    pub fn unregister(&self, callback_url: &str) -> Result<Value> {
        self.marathon
            .connection()
            .delete("/v2/eventSubscriptions", &[("callbackUrl", Some(callback_url.to_string()))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::testing::{marathon, FakeTransport};
    use serde_json::json;

    #[test]
    fn list_reads_callback_urls() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"callbackUrls": ["http://localhost/events/foo"]}));
        let urls = marathon(&transport).event_subscriptions().list().unwrap();
        assert_eq!(urls, vec!["http://localhost/events/foo".to_string()]);
    }

    #[test]
    fn register_and_unregister_pass_callback_url() {
        let transport = FakeTransport::new();
        let ack = json!({"callbackUrl": "http://localhost/events/foo", "eventType": "subscribe_event"});
        transport.push_json(200, ack.clone());
        transport.push_json(200, json!({"callbackUrl": "http://localhost/events/foo", "eventType": "unsubscribe_event"}));
        let subs = marathon(&transport).event_subscriptions();

        assert_eq!(subs.register("http://localhost/events/foo").unwrap(), ack);
        let json = subs.unregister("http://localhost/events/foo").unwrap();
        assert_eq!(json["eventType"], "unsubscribe_event");

        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(
            requests[0].url,
            "http://localhost:8080/v2/eventSubscriptions?callbackUrl=http%3A%2F%2Flocalhost%2Fevents%2Ffoo"
        );
        assert!(requests[0].body.is_none());
        assert_eq!(requests[1].method, HttpMethod::Delete);
    }
}
