//! Running task instances and the `/v2/tasks` accessor.

use std::fmt;

use serde_json::{json, Value};

use crate::connection::{flag, resource_path, QueryParams};
use crate::entity::{self, bound, serialize_info};
use crate::error::{MarathonError, Result};
use crate::marathon::Marathon;
use crate::util::{self, display_value, get_str, Attributes};

pub const TASK_STATUSES: &[&str] = &["running", "staging"];

/// Read-only snapshot of one running instance of an app.
#[derive(Debug, Clone)]
pub struct Task {
    info: Attributes,
    marathon: Option<Marathon>,
}

serialize_info!(Task);

impl Task {
    pub fn new(value: &Value, marathon: Option<Marathon>) -> Result<Self> {
        Ok(Self {
            info: util::to_attributes(value, "task")?,
            marathon,
        })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn id(&self) -> Option<&str> {
        get_str(&self.info, "id")
    }

    pub fn app_id(&self) -> Option<&str> {
        get_str(&self.info, "appId")
    }

    pub fn host(&self) -> Option<&str> {
        get_str(&self.info, "host")
    }

    pub fn ports(&self) -> Vec<u64> {
        util::get_array(&self.info, "ports").iter().filter_map(Value::as_u64).collect()
    }

    pub fn service_ports(&self) -> Vec<u64> {
        util::get_array(&self.info, "servicePorts")
            .iter()
            .filter_map(Value::as_u64)
            .collect()
    }

    pub fn version(&self) -> Option<&str> {
        get_str(&self.info, "version")
    }

    pub fn staged_at(&self) -> Option<&str> {
        get_str(&self.info, "stagedAt")
    }

    pub fn started_at(&self) -> Option<&str> {
        get_str(&self.info, "startedAt")
    }

    pub fn health_check_results(&self) -> &[Value] {
        util::get_array(&self.info, "healthCheckResults")
    }

    /// Kill this task, optionally scaling its app down by one, and replace
    /// the local attributes with the server's view of the killed task.
    pub fn delete(&mut self, scale: bool) -> Result<&mut Self> {
        let marathon = bound(&self.marathon, "task")?;
        let (Some(app_id), Some(id)) = (self.app_id(), self.id()) else {
            return Err(MarathonError::Argument("task must have an id and an appId".to_string()));
        };
        let killed = marathon.tasks().delete(app_id, id, scale)?;
        self.info = killed.info;
        Ok(self)
    }

    pub fn kill(&mut self, scale: bool) -> Result<&mut Self> {
        self.delete(scale)
    }

    /// Multi-line listing.
    pub fn to_pretty_string(&self) -> String {
        let mut s = format!("Task ID:    {}\n", self.id().unwrap_or_default());
        s += &format!("App ID:     {}\n", self.app_id().unwrap_or_default());
        s += &format!("Host:       {}\n", self.host().unwrap_or_default());
        if self.info.contains_key("ports") {
            let ports: Vec<String> = self.ports().iter().map(u64::to_string).collect();
            s += &format!("Ports:      {}\n", ports.join(","));
        }
        s += &format!("Staged at:  {}\n", display_value(self.info.get("stagedAt")));
        s += &format!("Started at: {}\n", display_value(self.info.get("startedAt")));
        s += &format!("Version:    {}\n", display_value(self.info.get("version")));
        s
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task {{ id: {} appId: {} host: {} }}",
            self.id().unwrap_or_default(),
            self.app_id().unwrap_or_default(),
            self.host().unwrap_or_default()
        )
    }
}

/// Task operations bound to one Marathon instance.
#[derive(Debug, Clone)]
pub struct Tasks {
    marathon: Marathon,
}

impl Tasks {
    pub fn new(marathon: Marathon) -> Self {
        Self { marathon }
    }

    /// Tasks of all apps, optionally filtered by `running` or `staging`.
    pub fn list(&self, status: Option<&str>) -> Result<Vec<Task>> {
        let mut query = QueryParams::new();
        util::add_choice(&mut query, "status", status, TASK_STATUSES, true)?;
        let json = self.marathon.connection().get("/v2/tasks", &query)?;
        self.wrap_list(&json)
    }

    /// Running tasks of one app.
    pub fn get(&self, app_id: &str) -> Result<Vec<Task>> {
        let path = format!("{}/tasks", resource_path("/v2/apps", app_id));
        let json = self.marathon.connection().get(&path, &[])?;
        self.wrap_list(&json)
    }

    /// Kill one task of an app. `scale` decrements the app's instance count.
    pub fn delete(&self, app_id: &str, task_id: &str, scale: bool) -> Result<Task> {
        let path = format!("{}/tasks/{task_id}", resource_path("/v2/apps", app_id));
        let json = self.marathon.connection().delete(&path, &[("scale", flag(scale))])?;
        let task = json.get("task").filter(|t| t.is_object()).unwrap_or(&json);
        Task::new(task, Some(self.marathon.clone()))
    }

    pub fn kill(&self, app_id: &str, task_id: &str, scale: bool) -> Result<Task> {
        self.delete(app_id, task_id, scale)
    }

    /// Kill all tasks of an app, or only those on `host`.
    pub fn delete_all(&self, app_id: &str, host: Option<&str>, scale: bool) -> Result<Vec<Task>> {
        let path = format!("{}/tasks", resource_path("/v2/apps", app_id));
        let query = [("host", host.map(str::to_string)), ("scale", flag(scale))];
        let json = self.marathon.connection().delete(&path, &query)?;
        self.wrap_list(&json)
    }

    pub fn kill_all(&self, app_id: &str, host: Option<&str>, scale: bool) -> Result<Vec<Task>> {
        self.delete_all(app_id, host, scale)
    }

    /// Kill tasks across apps by id.
    pub fn delete_many(&self, ids: &[&str], scale: bool) -> Result<()> {
        let body = json!({ "ids": ids });
        self.marathon
            .connection()
            .post("/v2/tasks/delete", &[("scale", flag(scale))], Some(&body))?;
        Ok(())
    }

    fn wrap_list(&self, json: &Value) -> Result<Vec<Task>> {
        entity::list(json, "tasks")?
            .iter()
            .map(|t| Task::new(t, Some(self.marathon.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::testing::{body_json, marathon, FakeTransport};

    fn example() -> Value {
        json!({"id": "task-id-foo", "appId": "/app/foo", "host": "foo-host"})
    }

    #[test]
    fn renders_task() {
        let task = Task::new(&example(), None).unwrap();
        assert_eq!(task.to_string(), "Task { id: task-id-foo appId: /app/foo host: foo-host }");
        assert_eq!(
            task.to_pretty_string(),
            "Task ID:    task-id-foo\nApp ID:     /app/foo\nHost:       foo-host\nStaged at:  \nStarted at: \nVersion:    \n"
        );
        assert_eq!(task.to_json(), r#"{"appId":"/app/foo","host":"foo-host","id":"task-id-foo"}"#);
    }

    #[test]
    fn pretty_lists_ports_when_present() {
        let task = Task::new(&json!({"id": "t", "ports": [31000, 31001]}), None).unwrap();
        assert!(task.to_pretty_string().contains("Ports:      31000,31001\n"));
        assert_eq!(task.ports(), vec![31000, 31001]);
    }

    #[test]
    fn delete_replaces_info() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"task": {"id": "task_123", "appId": "/app/foo", "deleted": true}}));
        let mut task = Task::new(&json!({"id": "task_123", "appId": "/app/foo"}), Some(marathon(&transport))).unwrap();

        task.kill(false).unwrap();

        assert_eq!(task.info()["deleted"], true);
        let req = transport.last_request();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:8080/v2/apps/app/foo/tasks/task_123");
    }

    #[test]
    fn delete_requires_binding() {
        let mut task = Task::new(&example(), None).unwrap();
        assert!(matches!(task.delete(false), Err(MarathonError::Argument(_))));
    }

    #[test]
    fn list_validates_status_before_any_request() {
        let transport = FakeTransport::new();
        let err = marathon(&transport).tasks().list(Some("foo")).unwrap_err();
        assert!(matches!(err, MarathonError::Argument(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn list_passes_status() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"tasks": [example()]}));
        let tasks = marathon(&transport).tasks().list(Some("running")).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].app_id(), Some("/app/foo"));
        assert_eq!(transport.last_request().url, "http://localhost:8080/v2/tasks?status=running");
    }

    #[test]
    fn delete_all_passes_host_and_scale() {
        let transport = FakeTransport::new();
        transport.push_json(200, json!({"tasks": []}));
        marathon(&transport)
            .tasks()
            .delete_all("/app/foo", Some("agent-1"), true)
            .unwrap();
        assert_eq!(
            transport.last_request().url,
            "http://localhost:8080/v2/apps/app/foo/tasks?host=agent-1&scale=true"
        );
    }

    #[test]
    fn delete_many_posts_ids() {
        let transport = FakeTransport::new();
        transport.push_raw(200, "");
        marathon(&transport).tasks().delete_many(&["a.1", "b.2"], false).unwrap();
        let req = transport.last_request();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8080/v2/tasks/delete");
        assert_eq!(body_json(&req), json!({"ids": ["a.1", "b.2"]}));
    }
}
