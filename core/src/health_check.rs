//! Health check definitions attached to apps.

use std::fmt;

use serde_json::{json, Value};

use crate::entity::serialize_info;
use crate::error::Result;
use crate::util::{self, display_value, get_str, get_u64, Attributes, Pretty};

pub const PROTOCOLS: &[&str] = &["HTTP", "TCP", "COMMAND"];

fn defaults() -> Value {
    json!({
        "gracePeriodSeconds": 300,
        "intervalSeconds": 60,
        "maxConsecutiveFailures": 3,
        "path": "/",
        "portIndex": 0,
        "protocol": "HTTP",
        "timeoutSeconds": 20
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    info: Attributes,
}

serialize_info!(HealthCheck);

impl HealthCheck {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::merge_with_defaults(&defaults(), value)?;
        util::validate_field_choice(&info, "protocol", PROTOCOLS, false)?;
        Ok(Self { info })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn protocol(&self) -> &str {
        get_str(&self.info, "protocol").unwrap_or_default()
    }

    /// The command to run for `COMMAND` checks, usually `{"value": "..."}`.
    pub fn command(&self) -> Option<&Value> {
        self.info.get("command").filter(|v| !v.is_null())
    }

    pub fn path(&self) -> Option<&str> {
        get_str(&self.info, "path")
    }

    pub fn port_index(&self) -> Option<u64> {
        get_u64(&self.info, "portIndex")
    }

    pub fn grace_period_seconds(&self) -> Option<u64> {
        get_u64(&self.info, "gracePeriodSeconds")
    }

    pub fn interval_seconds(&self) -> Option<u64> {
        get_u64(&self.info, "intervalSeconds")
    }

    pub fn max_consecutive_failures(&self) -> Option<u64> {
        get_u64(&self.info, "maxConsecutiveFailures")
    }

    pub fn timeout_seconds(&self) -> Option<u64> {
        get_u64(&self.info, "timeoutSeconds")
    }

    fn command_text(&self) -> String {
        match self.command() {
            Some(Value::Object(map)) => display_value(map.get("value")),
            other => display_value(other),
        }
    }

    fn port_text(&self) -> String {
        display_value(self.info.get("portIndex"))
    }
}

impl Pretty for HealthCheck {
    fn to_pretty_string(&self) -> String {
        match self.protocol() {
            "COMMAND" => format!("COMMAND:{}", self.command_text()),
            "HTTP" => format!("HTTP:{}:{}", self.port_text(), self.path().unwrap_or_default()),
            other => format!("{other}:{}", self.port_text()),
        }
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol() {
            "COMMAND" => write!(f, "HealthCheck {{ protocol: COMMAND command: {} }}", self.command_text()),
            "HTTP" => write!(
                f,
                "HealthCheck {{ protocol: HTTP portIndex: {} path: {} }}",
                self.port_text(),
                self.path().unwrap_or_default()
            ),
            other => write!(f, "HealthCheck {{ protocol: {other} portIndex: {} }}", self.port_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarathonError;

    #[test]
    fn fills_in_defaults() {
        let hc = HealthCheck::new(&json!({"protocol": "TCP"})).unwrap();
        assert_eq!(hc.protocol(), "TCP");
        assert_eq!(hc.port_index(), Some(0));
        assert_eq!(hc.timeout_seconds(), Some(20));
        assert_eq!(hc.grace_period_seconds(), Some(300));
        assert_eq!(hc.interval_seconds(), Some(60));
        assert_eq!(hc.max_consecutive_failures(), Some(3));
    }

    #[test]
    fn accepts_snake_case_input() {
        let hc = HealthCheck::new(&json!({"path": "/ping", "timeout_seconds": 5})).unwrap();
        assert_eq!(hc.timeout_seconds(), Some(5));
        assert_eq!(hc.path(), Some("/ping"));
    }

    #[test]
    fn rejects_unknown_or_null_protocol() {
        assert!(matches!(
            HealthCheck::new(&json!({"protocol": "UDP"})),
            Err(MarathonError::Argument(_))
        ));
        assert!(matches!(
            HealthCheck::new(&json!({"protocol": null})),
            Err(MarathonError::Argument(_))
        ));
    }

    #[test]
    fn renders_per_protocol() {
        let http = HealthCheck::new(&json!({"path": "/ping"})).unwrap();
        assert_eq!(http.to_string(), "HealthCheck { protocol: HTTP portIndex: 0 path: /ping }");
        assert_eq!(http.to_pretty_string(), "HTTP:0:/ping");

        let tcp = HealthCheck::new(&json!({"protocol": "TCP"})).unwrap();
        assert_eq!(tcp.to_string(), "HealthCheck { protocol: TCP portIndex: 0 }");

        let cmd = HealthCheck::new(&json!({"protocol": "COMMAND", "command": {"value": "true"}})).unwrap();
        assert_eq!(cmd.to_string(), "HealthCheck { protocol: COMMAND command: true }");
        assert_eq!(cmd.to_pretty_string(), "COMMAND:true");
    }

    #[test]
    fn serializes_merged_attributes() {
        let hc = HealthCheck::new(&json!({"path": "/ping"})).unwrap();
        assert_eq!(
            hc.to_json(),
            r#"{"gracePeriodSeconds":300,"intervalSeconds":60,"maxConsecutiveFailures":3,"path":"/ping","portIndex":0,"protocol":"HTTP","timeoutSeconds":20}"#
        );
    }
}
