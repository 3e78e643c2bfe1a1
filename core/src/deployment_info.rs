//! The handle returned by every mutation that starts a deployment.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::entity::{bound, serialize_info};
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;
use crate::util::{self, get_str, Attributes};

/// Pause between two polls of the deployment list.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `{deploymentId, version}` as returned by app and group mutations.
/// Older API versions omit `deploymentId`.
#[derive(Debug, Clone)]
pub struct DeploymentInfo {
    info: Attributes,
    marathon: Option<Marathon>,
}

serialize_info!(DeploymentInfo);

impl DeploymentInfo {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        let info = util::to_attributes(value, "deployment info")?;
        if get_str(&info, "version").is_none() {
            return Err(MarathonError::Argument("missing key in hash: version".to_string()));
        }
        Ok(Self { info, marathon })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn deployment_id(&self) -> Option<&str> {
        get_str(&self.info, "deploymentId")
    }

    pub fn version(&self) -> &str {
        get_str(&self.info, "version").unwrap_or_default()
    }

    /// Block until no running deployment carries this id.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        self.wait_with_interval(timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`wait`](Self::wait) with an explicit poll interval. Returns
    /// without polling when there is no deployment id, and without sleeping
    /// when the first poll no longer lists it. Giving up does not cancel the
    /// deployment.
    pub fn wait_with_interval(&self, timeout: Duration, interval: Duration) -> Result<()> {
        let Some(id) = self.deployment_id() else {
            return Ok(());
        };
        let deployments = bound(&self.marathon, "deployment info")?.deployments();
        let started = Instant::now();
        loop {
            let running = deployments.list()?.iter().any(|d| d.id() == Some(id));
            debug!(deployment_id = id, running, "polled deployments");
            if !running {
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(MarathonError::Timeout(format!(
                    "deployment {id} still running after {timeout:?}"
                )));
            }
            thread::sleep(interval.min(timeout - elapsed));
        }
    }
}

impl fmt::Display for DeploymentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeploymentInfo {{ version: {}", self.version())?;
        if let Some(id) = self.deployment_id() {
            write!(f, " deploymentId: {id}")?;
        }
        f.write_str(" }")
    }
}
