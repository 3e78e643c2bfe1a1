//! Running deployments and the `/v2/deployments` accessor.
//!
//! A deployment is running while it appears in the deployment list. It ends
//! by completing, by a forced cancel (no rollback), or by a plain cancel,
//! which starts a compensating rollback deployment of its own.

use std::fmt;

use serde_json::Value;

use crate::connection::{flag, resource_path};
use crate::deployment_info::DeploymentInfo;
use crate::entity::{self, bound, serialize_info};
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;
use crate::util::{self, display_value, get_str, get_u64, items_to_pretty, Attributes, Pretty};

/// One action of a deployment step: an app and what happens to it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentAction {
    info: Attributes,
}

serialize_info!(DeploymentAction);

impl DeploymentAction {
    pub fn new(value: &Value) -> Result<Self> {
        Ok(Self {
            info: util::to_attributes(value, "deployment action")?,
        })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn app(&self) -> Option<&str> {
        get_str(&self.info, "app")
    }

    /// Action type, e.g. `ScaleApplication`. Older servers call it `type`.
    pub fn action(&self) -> Option<&str> {
        get_str(&self.info, "action").or_else(|| get_str(&self.info, "type"))
    }
}

impl Pretty for DeploymentAction {
    fn to_pretty_string(&self) -> String {
        format!(
            "{}/{}",
            self.app().unwrap_or_default(),
            self.action().unwrap_or_default()
        )
    }
}

impl fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeploymentAction {{ app: {} action: {} }}",
            self.app().unwrap_or_default(),
            self.action().unwrap_or_default()
        )
    }
}

/// An ordered list of actions. Accepts both the bare-array form and
/// `{"actions": [...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentStep {
    info: Value,
    actions: Vec<DeploymentAction>,
}

serialize_info!(DeploymentStep);

impl DeploymentStep {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::normalize(value);
        let raw_actions = match &info {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => util::get_array(map, "actions"),
            _ => {
                return Err(MarathonError::Argument(
                    "deployment step must be an array or an object".to_string(),
                ))
            }
        };
        let actions = raw_actions
            .iter()
            .map(DeploymentAction::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { info, actions })
    }

    pub fn info(&self) -> &Value {
        &self.info
    }

    pub fn actions(&self) -> &[DeploymentAction] {
        &self.actions
    }
}

impl Pretty for DeploymentStep {
    fn to_pretty_string(&self) -> String {
        items_to_pretty(&self.actions)
    }
}

impl fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeploymentStep {{ actions: {} }}", items_to_pretty(&self.actions))
    }
}

/// A multi-step rollout currently in flight.
#[derive(Debug, Clone)]
pub struct Deployment {
    info: Attributes,
    marathon: Option<Marathon>,
    steps: Vec<DeploymentStep>,
    current_actions: Vec<DeploymentAction>,
}

serialize_info!(Deployment);

impl Deployment {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        let info = util::to_attributes(value, "deployment")?;
        let steps = util::get_array(&info, "steps")
            .iter()
            .map(DeploymentStep::new)
            .collect::<Result<Vec<_>>>()?;
        let current_actions = util::get_array(&info, "currentActions")
            .iter()
            .map(DeploymentAction::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            info,
            marathon,
            steps,
            current_actions,
        })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn id(&self) -> Option<&str> {
        get_str(&self.info, "id")
    }

    pub fn affected_apps(&self) -> Vec<String> {
        util::get_strings(&self.info, "affectedApps")
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn current_actions(&self) -> &[DeploymentAction] {
        &self.current_actions
    }

    pub fn version(&self) -> Option<&str> {
        get_str(&self.info, "version")
    }

    pub fn current_step(&self) -> Option<u64> {
        get_u64(&self.info, "currentStep")
    }

    pub fn total_steps(&self) -> Option<u64> {
        get_u64(&self.info, "totalSteps")
    }

    /// Cancel this deployment. See [`Deployments::delete`].
    pub fn delete(&self, force: bool) -> Result<Option<DeploymentInfo>> {
        let id = self
            .id()
            .ok_or_else(|| MarathonError::Argument("deployment must have an id".to_string()))?;
        bound(&self.marathon, "deployment")?.deployments().delete(id, force)
    }

    pub fn cancel(&self, force: bool) -> Result<Option<DeploymentInfo>> {
        self.delete(force)
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deployment {{ id: {} affectedApps: {} currentStep: {} totalSteps: {} }}",
            self.id().unwrap_or_default(),
            display_value(self.info.get("affectedApps")),
            display_value(self.info.get("currentStep")),
            display_value(self.info.get("totalSteps"))
        )
    }
}

/// Deployment operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct Deployments {
    marathon: Marathon,
}

impl Deployments {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    /// Deployments currently running.
    pub fn list(&self) -> Result<Vec<Deployment>> {
        let json = self.marathon.connection().get("/v2/deployments", &[])?;
        entity::as_list(&json, "deployments")?
            .iter()
            .map(|d| Deployment::new(d, Some(self.marathon.clone())))
            .collect()
    }

    /// Cancel a deployment. Without `force` the server rolls back by
    /// starting a new deployment, returned here; with `force` nothing is
    /// rolled back and `None` is returned.
    pub fn delete(&self, id: &str, force: bool) -> Result<Option<DeploymentInfo>> {
        let path = resource_path("/v2/deployments", id);
        let json = self.marathon.connection().delete(&path, &[("force", flag(force))])?;
        if json.get("version").is_some_and(|v| !v.is_null()) {
            DeploymentInfo::new(&json, Some(self.marathon.clone())).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn cancel(&self, id: &str, force: bool) -> Result<Option<DeploymentInfo>> {
        self.delete(id, force)
    }
}
