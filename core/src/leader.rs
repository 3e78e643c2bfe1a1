//! The currently elected Marathon leader.

use serde_json::Value;

use crate::entity;
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;

#[derive(Debug, Clone)]
pub struct Leader {
    marathon: Marathon,
}

impl Leader {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    /// `host:port` of the current leader.
    pub fn get(&self) -> Result<String> {
        let json = self.marathon.connection().get("/v2/leader", &[])?;
        string_field(&json, "leader")
    }

    /// Ask the leader to step down; returns the server's message.
    pub fn abdicate(&self) -> Result<String> {
        let json = self.marathon.connection().delete("/v2/leader", &[])?;
        string_field(&json, "message")
    }
}

fn string_field(json: &Value, key: &str) -> Result<String> {
    entity::field(json, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MarathonError::unexpected(format!("expected '{key}' to be a string")))
}
