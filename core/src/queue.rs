//! The launch queue: apps waiting for task placement.

use std::fmt;

use serde_json::{json, Value};

use crate::app::App;
use crate::entity;
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;
use crate::util::{self, display_value, OPAQUE_KEYS};

/// A read-only app snapshot paired with its backoff state. The `delay` map
/// is kept exactly as the server sent it.
#[derive(Debug, Clone)]
pub struct QueueElement {
    app: App,
    delay: Option<Value>,
}

impl QueueElement {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        let ignore: Vec<&str> = OPAQUE_KEYS.iter().copied().chain(["delay"]).collect();
        let info = match util::normalize_with(value, &ignore) {
            Value::Object(map) => map,
            _ => return Err(MarathonError::Argument("queue element must be a JSON object".to_string())),
        };
        let app = info
            .get("app")
            .filter(|a| a.is_object())
            .ok_or_else(|| MarathonError::Argument("queue element must have an app".to_string()))?;
        Ok(Self {
            app: App::new_read_only(app, marathon)?,
            delay: info.get("delay").cloned(),
        })
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn delay(&self) -> Option<&Value> {
        self.delay.as_ref()
    }

    /// `{"app": ..., "delay": ...}` as a JSON string.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    fn to_value(&self) -> Value {
        json!({"app": self.app.info(), "delay": self.delay})
    }
}

impl serde::Serialize for QueueElement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl fmt::Display for QueueElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueElement {{ appId: {} delay: {} }}",
            self.app.id(),
            display_value(self.delay.as_ref())
        )
    }
}

/// Queue operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct Queues {
    marathon: Marathon,
}

impl Queues {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    pub fn list(&self) -> Result<Vec<QueueElement>> {
        let json = self.marathon.connection().get("/v2/queue", &[])?;
        entity::list(&json, "queue")?
            .iter()
            .map(|q| QueueElement::new(q, Some(self.marathon.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{marathon, FakeTransport};

    fn example() -> Value {
        json!({
            "app": {"id": "/app/foo", "instances": 1, "env": {"MY_VAR": "x"}},
            "delay": {"overdue": false, "time_left_seconds": 3}
        })
    }

    #[test]
    fn wraps_read_only_app_and_raw_delay() {
        let element = QueueElement::new(&example(), None).unwrap();
        assert!(element.app().read_only());
        assert_eq!(element.app().instances(), Some(1));
        assert_eq!(element.delay(), Some(&json!({"overdue": false, "time_left_seconds": 3})));
        assert_eq!(
            element.to_string(),
            r#"QueueElement { appId: /app/foo delay: {"overdue":false,"time_left_seconds":3} }"#
        );
    }

    #[test]
    fn serializes_app_and_delay() {
        let element = QueueElement::new(&example(), None).unwrap();
        let value: Value = serde_json::from_str(&element.to_json()).unwrap();
        assert_eq!(value["app"]["env"], json!({"MY_VAR": "x"}));
        assert_eq!(value["app"]["labels"], json!({}));
        assert_eq!(value["delay"]["time_left_seconds"], 3);
    }

    #[test]
    fn app_is_required() {
        assert!(matches!(
            QueueElement::new(&json!({"delay": {}}), None),
            Err(MarathonError::Argument(_))
        ));
    }

    #[test]
    fn list_reads_queue_envelope() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"queue": [example()]}));
        let mut queue = marathon(&transport).queues().list().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(transport.last_request().url, "http://localhost:8080/v2/queue");
        assert!(matches!(queue[0].app.tasks(), Err(MarathonError::Argument(_))));
    }
}
