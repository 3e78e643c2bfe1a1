//! Apps and the `/v2/apps` accessor.
//!
//! # Design
//! An `App` is its normalized attribute map plus typed views (container,
//! constraints, health checks) derived from it. Operations that fetch a new
//! definition replace the map wholesale and rebuild the typed views; nothing
//! is patched in place. A read-only app (an old version, a queue entry)
//! refuses every operation that would talk to the server on its behalf.

use std::fmt;

use serde_json::{json, Value};

use crate::connection::{flag, resource_path, QueryParams};
use crate::constraint::Constraint;
use crate::container::Container;
use crate::deployment_info::DeploymentInfo;
use crate::entity::{self, bound, serialize_info};
use crate::error::{MarathonError, Result};
use crate::health_check::HealthCheck;
use crate::marathon::Marathon;
use crate::task::Task;
use crate::util::{self, display_value, get_bool, get_f64, get_str, get_u64, Attributes, Pretty};

/// Values accepted by the `embed` query parameter when listing apps.
pub const APP_EMBEDS: &[&str] = &[
    "apps.tasks",
    "apps.counts",
    "apps.deployments",
    "apps.lastTaskFailure",
    "apps.failures",
    "apps.taskStats",
];

fn defaults() -> Value {
    json!({"env": {}, "labels": {}})
}

#[derive(Debug, Clone)]
pub struct App {
    info: Attributes,
    read_only: bool,
    marathon: Option<Marathon>,
    container: Option<Container>,
    constraints: Vec<Constraint>,
    health_checks: Vec<HealthCheck>,
}

serialize_info!(App);

impl App {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        Self::build(value, marathon, false)
    }

    /// An app that refuses every mutating or refreshing operation.
    pub fn new_read_only(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        Self::build(value, marathon, true)
    }

    fn build(value: &Value, marathon: Option<Marathon>, read_only: bool) -> Result<Self> {
        let info = util::merge_with_defaults(&defaults(), value)?;
        if !get_str(&info, "id").is_some_and(|id| !id.is_empty()) {
            return Err(MarathonError::Argument("App must have an id".to_string()));
        }
        let mut app = Self {
            info: Attributes::new(),
            read_only,
            marathon,
            container: None,
            constraints: Vec::new(),
            health_checks: Vec::new(),
        };
        app.replace_info(info)?;
        Ok(app)
    }

    /// Swap in a new backing map and rebuild every typed view from it.
    fn replace_info(&mut self, info: Attributes) -> Result<()> {
        self.container = match info.get("container") {
            Some(container) if !container.is_null() => Some(Container::new(container)?),
            _ => None,
        };
        self.constraints = util::get_array(&info, "constraints")
            .iter()
            .map(Constraint::new)
            .collect::<Result<Vec<_>>>()?;
        self.health_checks = util::get_array(&info, "healthChecks")
            .iter()
            .map(HealthCheck::new)
            .collect::<Result<Vec<_>>>()?;
        self.info = info;
        Ok(())
    }

    fn check_read_only(&self) -> Result<()> {
        if self.read_only {
            return Err(MarathonError::Argument(
                "This app is 'read only' and does not support any actions".to_string(),
            ));
        }
        Ok(())
    }

    fn marathon(&self) -> Result<&Marathon> {
        bound(&self.marathon, "app")
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn id(&self) -> &str {
        get_str(&self.info, "id").unwrap_or_default()
    }

    pub fn cmd(&self) -> Option<&str> {
        get_str(&self.info, "cmd")
    }

    pub fn args(&self) -> Vec<String> {
        util::get_strings(&self.info, "args")
    }

    pub fn cpus(&self) -> Option<f64> {
        get_f64(&self.info, "cpus")
    }

    pub fn mem(&self) -> Option<f64> {
        get_f64(&self.info, "mem")
    }

    pub fn disk(&self) -> Option<f64> {
        get_f64(&self.info, "disk")
    }

    pub fn instances(&self) -> Option<u64> {
        get_u64(&self.info, "instances")
    }

    pub fn executor(&self) -> Option<&str> {
        get_str(&self.info, "executor")
    }

    pub fn user(&self) -> Option<&str> {
        get_str(&self.info, "user")
    }

    pub fn ports(&self) -> Vec<u64> {
        util::get_array(&self.info, "ports")
            .iter()
            .filter_map(Value::as_u64)
            .collect()
    }

    pub fn require_ports(&self) -> Option<bool> {
        get_bool(&self.info, "requirePorts")
    }

    /// Environment variables, keys exactly as given.
    pub fn env(&self) -> Option<&Attributes> {
        self.info.get("env").and_then(Value::as_object)
    }

    pub fn labels(&self) -> Option<&Attributes> {
        self.info.get("labels").and_then(Value::as_object)
    }

    /// URIs fetched into the sandbox: `fetch[].uri`, or the legacy `uris`.
    pub fn fetch(&self) -> Vec<String> {
        if self.info.contains_key("fetch") {
            util::get_array(&self.info, "fetch")
                .iter()
                .filter_map(|f| f.get("uri").and_then(Value::as_str).map(str::to_string))
                .collect()
        } else {
            self.uris()
        }
    }

    pub fn uris(&self) -> Vec<String> {
        util::get_strings(&self.info, "uris")
    }

    pub fn store_urls(&self) -> Vec<String> {
        util::get_strings(&self.info, "storeUrls")
    }

    pub fn upgrade_strategy(&self) -> Option<&Value> {
        self.info.get("upgradeStrategy")
    }

    pub fn version(&self) -> Option<&str> {
        get_str(&self.info, "version")
    }

    pub fn tasks_running(&self) -> Option<u64> {
        get_u64(&self.info, "tasksRunning")
    }

    pub fn tasks_staged(&self) -> Option<u64> {
        get_u64(&self.info, "tasksStaged")
    }

    pub fn tasks_healthy(&self) -> Option<u64> {
        get_u64(&self.info, "tasksHealthy")
    }

    pub fn tasks_unhealthy(&self) -> Option<u64> {
        get_u64(&self.info, "tasksUnhealthy")
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn health_checks(&self) -> &[HealthCheck] {
        &self.health_checks
    }

    /// Running tasks. Refreshes first when the backing map has no `tasks`.
    pub fn tasks(&mut self) -> Result<Vec<Task>> {
        self.check_read_only()?;
        if !self.info.contains_key("tasks") {
            self.refresh()?;
        }
        let marathon = self.marathon.clone();
        entity::as_list(
            self.info
                .get("tasks")
                .ok_or_else(|| MarathonError::unexpected("expected to find tasks element in app's info"))?,
            "tasks",
        )?
        .iter()
        .map(|t| Task::new(t, marathon.clone()))
        .collect()
    }

    /// Version identifiers of this app.
    pub fn versions(&self) -> Result<Vec<String>> {
        self.marathon()?.apps().versions(self.id())
    }

    /// This app's definition at `version`, as a read-only app.
    pub fn version_at(&self, version: &str) -> Result<App> {
        self.marathon()?.apps().version(self.id(), version)
    }

    /// Reload attributes from the server.
    pub fn refresh(&mut self) -> Result<&mut Self> {
        self.check_read_only()?;
        let fresh = self.marathon()?.apps().get(self.id())?;
        self.replace_info(fresh.info)?;
        Ok(self)
    }

    /// Create and start this app from its current attributes.
    pub fn start(&mut self) -> Result<&mut Self> {
        self.check_read_only()?;
        let body = Value::Object(self.info.clone());
        let created = self.marathon()?.apps().start(&body)?;
        self.replace_info(created.info)?;
        Ok(self)
    }

    /// Rolling restart of all tasks. `force` overrides a deployment that
    /// currently locks the app.
    pub fn restart(&self, force: bool) -> Result<DeploymentInfo> {
        self.check_read_only()?;
        self.marathon()?.apps().restart(self.id(), force)
    }

    /// Change attributes of the running app. A patch holding only `version`
    /// rolls back to that version; when `version` sits next to other keys it
    /// is dropped and the other keys are applied. `force` overrides a
    /// deployment that currently locks the app.
    pub fn change(&self, patch: &Value, force: bool) -> Result<DeploymentInfo> {
        self.check_read_only()?;
        let patch = strip_version(patch)?;
        self.marathon()?.apps().change(self.id(), &patch, force)
    }

    pub fn roll_back(&self, version: &str, force: bool) -> Result<DeploymentInfo> {
        self.change(&json!({ "version": version }), force)
    }

    pub fn scale(&self, instances: u64, force: bool) -> Result<DeploymentInfo> {
        self.change(&json!({ "instances": instances }), force)
    }

    /// Scale to zero instances.
    pub fn suspend(&self, force: bool) -> Result<DeploymentInfo> {
        self.scale(0, force)
    }

    /// Multi-line listing.
    pub fn to_pretty_string(&self) -> String {
        let running = self
            .tasks_running()
            .unwrap_or_else(|| util::get_array(&self.info, "tasks").len() as u64);
        let mut lines = vec![
            format!("App ID:     {}", self.id()),
            format!("Instances:  {running}/{}", display_value(self.info.get("instances"))),
            format!("Command:    {}", display_value(self.info.get("cmd"))),
            format!("CPUs:       {}", display_value(self.info.get("cpus"))),
            format!("Memory:     {} MB", display_value(self.info.get("mem"))),
        ];
        if let Some(container) = self.container.as_ref().filter(|c| c.docker().is_some()) {
            lines.push(format!("Docker:     {}", container.to_pretty_string()));
        }
        lines.extend(self.fetch().iter().map(|uri| format!("URI:        {uri}")));
        if let Some(env) = self.env() {
            lines.extend(env.iter().map(|(k, v)| format!("ENV:        {k}={}", display_value(Some(v)))));
        }
        lines.extend(self.constraints.iter().map(|c| format!("Constraint: {}", c.to_pretty_string())));
        lines.extend(self.health_checks.iter().map(|h| format!("Health:     {}", h.to_pretty_string())));
        lines.push(format!("Version:    {}", self.version().unwrap_or_default()));
        lines.join("\n")
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "App {{ id: {} }}", self.id())
    }
}

/// Normalize a patch and drop its top-level `version` unless it is the only
/// key. Nested `version` keys (say, under `labels`) are user data and stay.
pub(crate) fn strip_version(patch: &Value) -> Result<Value> {
    let mut patch = util::to_attributes(patch, "patch")?;
    if patch.contains_key("version") && patch.len() > 1 {
        patch.remove("version");
    }
    Ok(Value::Object(patch))
}

/// Filters for [`Apps::list`].
#[derive(Debug, Clone, Default)]
pub struct ListApps {
    /// Only apps whose command contains this string.
    pub cmd: Option<String>,
    /// Nested resources to embed, one of [`APP_EMBEDS`].
    pub embed: Option<String>,
    /// Only apps whose id contains this string.
    pub id: Option<String>,
    /// Label selector, e.g. `env==prod`.
    pub label: Option<String>,
}

/// App operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct Apps {
    marathon: Marathon,
}

impl Apps {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    pub fn marathon(&self) -> &Marathon {
        &self.marathon
    }

    pub fn get(&self, id: &str) -> Result<App> {
        let json = self.marathon.connection().get(&resource_path("/v2/apps", id), &[])?;
        App::new(entity::field(&json, "app")?, Some(self.marathon.clone()))
    }

    pub fn list(&self, filter: &ListApps) -> Result<Vec<App>> {
        let mut query: QueryParams = vec![("cmd", filter.cmd.clone())];
        util::add_choice(&mut query, "embed", filter.embed.as_deref(), APP_EMBEDS, true)?;
        query.push(("id", filter.id.clone()));
        query.push(("label", filter.label.clone()));
        let json = self.marathon.connection().get("/v2/apps", &query)?;
        entity::list(&json, "apps")?
            .iter()
            .map(|a| App::new(a, Some(self.marathon.clone())))
            .collect()
    }

    /// Destroy an app and all of its tasks.
    pub fn delete(&self, id: &str, force: bool) -> Result<DeploymentInfo> {
        let json = self
            .marathon
            .connection()
            .delete(&resource_path("/v2/apps", id), &[("force", flag(force))])?;
        DeploymentInfo::new(&json, Some(self.marathon.clone()))
    }

    /// Create and start an app.
    pub fn start(&self, attributes: &Value) -> Result<App> {
        let body = util::normalize(attributes);
        let json = self.marathon.connection().post("/v2/apps", &[], Some(&body))?;
        App::new(&json, Some(self.marathon.clone()))
    }

    pub fn restart(&self, id: &str, force: bool) -> Result<DeploymentInfo> {
        let path = format!("{}/restart", resource_path("/v2/apps", id));
        let json = self.marathon.connection().post(&path, &[("force", flag(force))], None)?;
        DeploymentInfo::new(&json, Some(self.marathon.clone()))
    }

    /// Send `patch` as-is; see [`App::change`] for the version rule.
    pub fn change(&self, id: &str, patch: &Value, force: bool) -> Result<DeploymentInfo> {
        let body = util::normalize(patch);
        let json = self
            .marathon
            .connection()
            .put(&resource_path("/v2/apps", id), &[("force", flag(force))], Some(&body))?;
        DeploymentInfo::new(&json, Some(self.marathon.clone()))
    }

    pub fn versions(&self, id: &str) -> Result<Vec<String>> {
        let path = format!("{}/versions", resource_path("/v2/apps", id));
        let json = self.marathon.connection().get(&path, &[])?;
        Ok(entity::list(&json, "versions")?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    /// The app's definition at `version`, read-only.
    pub fn version(&self, id: &str, version: &str) -> Result<App> {
        let path = format!("{}/versions/{version}", resource_path("/v2/apps", id));
        let json = self.marathon.connection().get(&path, &[])?;
        App::new_read_only(&json, Some(self.marathon.clone()))
    }
}
