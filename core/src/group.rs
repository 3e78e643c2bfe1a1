//! Application groups and the `/v2/groups` accessor.

use std::fmt;

use serde_json::{json, Value};

use crate::app::{strip_version, App};
use crate::connection::{flag, resource_path};
use crate::deployment::DeploymentStep;
use crate::deployment_info::DeploymentInfo;
use crate::entity::{self, bound, serialize_info};
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;
use crate::util::{self, get_str, Attributes};

const ROOT_GROUP: &str = "/";

fn defaults() -> Value {
    json!({"dependencies": []})
}

/// A tree of apps and nested groups. Below the root a group holds either
/// apps or groups, never both.
#[derive(Debug, Clone)]
pub struct Group {
    info: Attributes,
    marathon: Option<Marathon>,
    apps: Vec<App>,
    groups: Vec<Group>,
}

serialize_info!(Group);

impl Group {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        let info = util::merge_with_defaults(&defaults(), value)?;
        if get_str(&info, "id").is_none() {
            return Err(MarathonError::Argument("Group must have an id".to_string()));
        }
        let mut group = Self {
            info: Attributes::new(),
            marathon,
            apps: Vec::new(),
            groups: Vec::new(),
        };
        group.replace_info(info)?;
        if !group.apps.is_empty() && !group.groups.is_empty() && group.id() != ROOT_GROUP {
            return Err(MarathonError::Argument(
                "Group can have either groups or apps, not both".to_string(),
            ));
        }
        Ok(group)
    }

    fn replace_info(&mut self, info: Attributes) -> Result<()> {
        self.apps = util::get_array(&info, "apps")
            .iter()
            .map(|a| App::new(a, self.marathon.clone()))
            .collect::<Result<Vec<_>>>()?;
        self.groups = util::get_array(&info, "groups")
            .iter()
            .map(|g| Group::new(g, self.marathon.clone()))
            .collect::<Result<Vec<_>>>()?;
        self.info = info;
        Ok(())
    }

    fn marathon(&self) -> Result<&Marathon> {
        bound(&self.marathon, "group")
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn id(&self) -> &str {
        get_str(&self.info, "id").unwrap_or_default()
    }

    pub fn dependencies(&self) -> Vec<String> {
        util::get_strings(&self.info, "dependencies")
    }

    pub fn version(&self) -> Option<&str> {
        get_str(&self.info, "version")
    }

    pub fn apps(&self) -> &[App] {
        &self.apps
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Reload attributes from the server.
    pub fn refresh(&mut self) -> Result<&mut Self> {
        let fresh = self.marathon()?.groups().get(self.id())?;
        self.replace_info(fresh.info)?;
        Ok(self)
    }

    /// Create and start this group from its current attributes.
    pub fn start(&self) -> Result<DeploymentInfo> {
        self.marathon()?.groups().start(&Value::Object(self.info.clone()))
    }

    /// Change the deployed group. `version` is dropped from a patch that
    /// has other keys. With `dry_run` the server only previews the steps.
    pub fn change(&self, patch: &Value, force: bool, dry_run: bool) -> Result<GroupChange> {
        let patch = strip_version(patch)?;
        self.marathon()?.groups().change(self.id(), &patch, force, dry_run)
    }

    pub fn roll_back(&self, version: &str, force: bool) -> Result<DeploymentInfo> {
        self.change(&json!({ "version": version }), force, false)?.into_deployment()
    }

    /// Multi-line listing; nested apps and groups are indented.
    pub fn to_pretty_string(&self) -> String {
        let mut lines = vec![format!("Group ID:   {}", self.id())];
        let nested = self
            .apps
            .iter()
            .map(App::to_pretty_string)
            .chain(self.groups.iter().map(Group::to_pretty_string));
        for block in nested {
            lines.extend(block.lines().map(|l| format!("    {l}")));
        }
        lines.push(format!("Version:    {}", self.version().unwrap_or_default()));
        lines.join("\n")
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group {{ id: {} }}", self.id())
    }
}

/// Outcome of a group change: a started deployment, or the preview of a
/// dry run.
#[derive(Debug, Clone)]
pub enum GroupChange {
    Deployment(DeploymentInfo),
    DryRun(Vec<DeploymentStep>),
}

impl GroupChange {
    /// The started deployment, or an error for a dry-run result.
    pub fn into_deployment(self) -> Result<DeploymentInfo> {
        match self {
            GroupChange::Deployment(info) => Ok(info),
            GroupChange::DryRun(_) => Err(MarathonError::unexpected("dry run did not start a deployment")),
        }
    }
}

/// Group operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct Groups {
    marathon: Marathon,
}

impl Groups {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    pub fn get(&self, id: &str) -> Result<Group> {
        let json = self.marathon.connection().get(&resource_path("/v2/groups", id), &[])?;
        Group::new(&json, Some(self.marathon.clone()))
    }

    /// The root group, holding every group and app.
    pub fn list(&self) -> Result<Group> {
        let json = self.marathon.connection().get("/v2/groups", &[])?;
        Group::new(&json, Some(self.marathon.clone()))
    }

    pub fn delete(&self, id: &str, force: bool) -> Result<DeploymentInfo> {
        let json = self
            .marathon
            .connection()
            .delete(&resource_path("/v2/groups", id), &[("force", flag(force))])?;
        DeploymentInfo::new(&json, Some(self.marathon.clone()))
    }

    pub fn start(&self, attributes: &Value) -> Result<DeploymentInfo> {
        let body = util::normalize(attributes);
        let json = self.marathon.connection().post("/v2/groups", &[], Some(&body))?;
        DeploymentInfo::new(&json, Some(self.marathon.clone()))
    }

    /// Send `patch` as-is; see [`Group::change`] for the version rule.
    pub fn change(&self, id: &str, patch: &Value, force: bool, dry_run: bool) -> Result<GroupChange> {
        let body = util::normalize(patch);
        let query = [("force", flag(force)), ("dryRun", flag(dry_run))];
        let json = self
            .marathon
            .connection()
            .put(&resource_path("/v2/groups", id), &query, Some(&body))?;
        if dry_run {
            let steps = entity::list(&json, "steps")?
                .iter()
                .map(DeploymentStep::new)
                .collect::<Result<Vec<_>>>()?;
            Ok(GroupChange::DryRun(steps))
        } else {
            DeploymentInfo::new(&json, Some(self.marathon.clone())).map(GroupChange::Deployment)
        }
    }
}
