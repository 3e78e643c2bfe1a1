//! In-memory stand-in for the Marathon REST API, for integration tests.
//!
//! Every mutation records a deployment. A deployment is listed by exactly
//! one `GET /v2/deployments` and is gone afterwards, so clients that poll
//! for completion see it finish on their second poll. Until it has been
//! listed, a deployment locks the apps it affects.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const LEADER: &str = "127.0.0.1:8080";

pub type Db = Arc<RwLock<MockState>>;

type Params = HashMap<String, String>;
type ApiResult = Result<Response, ApiError>;

/// Error body in the shape Marathon uses: `{"message": ...}`, plus
/// `details` for validation failures and `deployments` for locks.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn invalid(details: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: json!({
                "message": "Object is not valid",
                "details": [{"path": "/", "errors": [details]}]
            }),
        }
    }

    fn locked(deployments: &[String]) -> Self {
        let ids: Vec<Value> = deployments.iter().map(|id| json!({ "id": id })).collect();
        Self {
            status: StatusCode::CONFLICT,
            body: json!({
                "message": "App is locked by one or more deployments. Override with the option '?force=true'.",
                "deployments": ids
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone)]
struct AppRecord {
    definition: Map<String, Value>,
    versions: Vec<Map<String, Value>>,
    tasks: Vec<Value>,
}

impl AppRecord {
    fn new(mut definition: Map<String, Value>, version: &str) -> Self {
        definition.entry("instances").or_insert(json!(1));
        let mut record = Self {
            definition: Map::new(),
            versions: Vec::new(),
            tasks: Vec::new(),
        };
        record.apply(definition, version);
        record
    }

    fn id(&self) -> &str {
        self.definition.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    fn instances(&self) -> usize {
        self.definition.get("instances").and_then(Value::as_u64).unwrap_or(0) as usize
    }

    /// Make `definition` the current version and converge tasks onto it.
    fn apply(&mut self, mut definition: Map<String, Value>, version: &str) {
        definition.insert("version".to_string(), json!(version));
        self.definition = definition;
        self.versions.push(self.definition.clone());
        self.scale_tasks(version);
    }

    fn scale_tasks(&mut self, version: &str) {
        let wanted = self.instances();
        self.tasks.truncate(wanted);
        while self.tasks.len() < wanted {
            let task = new_task(self.id(), version, self.tasks.len());
            self.tasks.push(task);
        }
    }

    fn restart_tasks(&mut self, version: &str) {
        self.tasks.clear();
        self.scale_tasks(version);
    }

    fn set_instances(&mut self, instances: usize, version: &str) {
        let mut definition = self.definition.clone();
        definition.insert("instances".to_string(), json!(instances));
        self.apply(definition, version);
    }

    fn at_version(&self, version: &str) -> Option<&Map<String, Value>> {
        self.versions
            .iter()
            .find(|v| v.get("version").and_then(Value::as_str) == Some(version))
    }
}

#[derive(Debug, Clone)]
struct GroupRecord {
    definition: Map<String, Value>,
    versions: Vec<Map<String, Value>>,
}

impl GroupRecord {
    fn apply(&mut self, mut definition: Map<String, Value>, version: &str) {
        definition.insert("version".to_string(), json!(version));
        self.definition = definition;
        self.versions.push(self.definition.clone());
    }

    fn app_ids(&self) -> Vec<String> {
        app_ids_of(&self.definition)
    }
}

#[derive(Debug, Clone)]
struct DeploymentRecord {
    id: String,
    version: String,
    affected_apps: Vec<String>,
    action: &'static str,
}

impl DeploymentRecord {
    fn to_json(&self) -> Value {
        let actions: Vec<Value> = self
            .affected_apps
            .iter()
            .map(|app| json!({ "action": self.action, "app": app }))
            .collect();
        json!({
            "id": self.id,
            "version": self.version,
            "affectedApps": self.affected_apps,
            "steps": [{ "actions": actions }],
            "currentActions": actions,
            "currentStep": 1,
            "totalSteps": 1
        })
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    apps: BTreeMap<String, AppRecord>,
    groups: BTreeMap<String, GroupRecord>,
    deployments: Vec<DeploymentRecord>,
    subscriptions: Vec<String>,
    clock: u64,
}

impl MockState {
    /// Strictly increasing timestamps, one per mutation.
    fn next_version(&mut self) -> String {
        self.clock += 1;
        let n = self.clock;
        format!(
            "2015-01-01T{:02}:{:02}:{:02}.000Z",
            n / 3600 % 24,
            n / 60 % 60,
            n % 60
        )
    }

    /// Record a deployment and return its `{deploymentId, version}` handle.
    fn deploy(&mut self, version: String, affected_apps: Vec<String>, action: &'static str) -> Value {
        let id = Uuid::new_v4().to_string();
        debug!(deployment_id = %id, action, "recorded deployment");
        let handle = json!({ "deploymentId": id, "version": version });
        self.deployments.push(DeploymentRecord {
            id,
            version,
            affected_apps,
            action,
        });
        handle
    }

    /// Fail with 409 while a pending deployment touches `app_id`. With
    /// `force` the pending deployments are dropped instead.
    fn take_lock(&mut self, app_id: &str, force: bool) -> Result<(), ApiError> {
        let locking = |d: &DeploymentRecord| d.affected_apps.iter().any(|a| a == app_id);
        if force {
            self.deployments.retain(|d| !locking(d));
            return Ok(());
        }
        let ids: Vec<String> = self
            .deployments
            .iter()
            .filter(|&d| locking(d))
            .map(|d| d.id.clone())
            .collect();
        if ids.is_empty() {
            Ok(())
        } else {
            Err(ApiError::locked(&ids))
        }
    }

    fn app_json(&self, record: &AppRecord, embed_tasks: bool) -> Value {
        let mut app = record.definition.clone();
        let pending: Vec<Value> = self
            .deployments
            .iter()
            .filter(|d| d.affected_apps.iter().any(|a| a == record.id()))
            .map(|d| json!({ "id": d.id }))
            .collect();
        app.insert("tasksRunning".to_string(), json!(record.tasks.len()));
        app.insert("tasksStaged".to_string(), json!(0));
        app.insert("tasksHealthy".to_string(), json!(0));
        app.insert("tasksUnhealthy".to_string(), json!(0));
        app.insert("deployments".to_string(), Value::Array(pending));
        if embed_tasks {
            app.insert("tasks".to_string(), Value::Array(record.tasks.clone()));
        }
        Value::Object(app)
    }

    fn app(&self, id: &str) -> Result<&AppRecord, ApiError> {
        self.apps
            .get(id)
            .ok_or_else(|| ApiError::not_found(format!("App '{id}' does not exist")))
    }

    fn app_mut(&mut self, id: &str) -> Result<&mut AppRecord, ApiError> {
        self.apps
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("App '{id}' does not exist")))
    }

    fn create_app(&mut self, mut definition: Map<String, Value>) -> Result<(Value, Value), ApiError> {
        let id = definition
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim_matches('/').is_empty())
            .map(absolute)
            .ok_or_else(|| ApiError::invalid("error.path.missing: id"))?;
        if self.apps.contains_key(&id) {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("An app with id [{id}] already exists."),
            ));
        }
        definition.insert("id".to_string(), json!(id));
        let version = self.next_version();
        let record = AppRecord::new(definition, &version);
        self.apps.insert(id.clone(), record);
        let handle = self.deploy(version, vec![id.clone()], "StartApplication");
        info!(app_id = %id, "created app");
        let app = self.app(&id).map(|record| self.app_json(record, false))?;
        Ok((app, handle))
    }

    fn root_group(&self) -> Value {
        let apps: Vec<Value> = self.apps.values().map(|r| self.app_json(r, false)).collect();
        let groups: Vec<Value> = self
            .groups
            .values()
            .map(|g| Value::Object(g.definition.clone()))
            .collect();
        json!({
            "id": "/",
            "apps": apps,
            "groups": groups,
            "dependencies": [],
            "version": format!("2015-01-01T00:00:00.{:03}Z", self.clock % 1000)
        })
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(MockState::default()));
    Router::new()
        .route("/ping", get(ping))
        .route("/v2/info", get(server_info))
        .route("/v2/leader", get(get_leader).delete(abdicate))
        .route("/v2/queue", get(list_queue))
        .route(
            "/v2/eventSubscriptions",
            get(list_subscriptions).post(subscribe).delete(unsubscribe),
        )
        .route("/v2/apps", get(list_apps).post(create_app))
        .route(
            "/v2/apps/{*path}",
            get(get_app_path).put(put_app).post(post_app_path).delete(delete_app_path),
        )
        .route("/v2/tasks", get(list_tasks))
        .route("/v2/tasks/delete", post(delete_tasks))
        .route("/v2/deployments", get(list_deployments))
        .route("/v2/deployments/{id}", axum::routing::delete(cancel_deployment))
        .route("/v2/groups", get(get_root_group).post(create_group))
        .route(
            "/v2/groups/{*path}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn absolute(id: &str) -> String {
    format!("/{}", id.trim_matches('/'))
}

fn flag(params: &Params, name: &str) -> bool {
    params.get(name).is_some_and(|v| v == "true")
}

fn object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::invalid("error.expected.jsobject")),
    }
}

/// A patch holding nothing but `version` rolls back to that version.
fn rollback_target(patch: &Map<String, Value>) -> Option<String> {
    patch
        .get("version")
        .and_then(Value::as_str)
        .filter(|_| patch.len() == 1)
        .map(str::to_string)
}

fn app_ids_of(group: &Map<String, Value>) -> Vec<String> {
    group
        .get("apps")
        .and_then(Value::as_array)
        .map(|apps| {
            apps.iter()
                .filter_map(|a| a.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn new_task(app_id: &str, version: &str, index: usize) -> Value {
    json!({
        "id": format!("{}.{}", app_id.trim_start_matches('/').replace('/', "_"), Uuid::new_v4()),
        "appId": app_id,
        "host": "127.0.0.1",
        "ports": [31000 + index],
        "servicePorts": [10000 + index],
        "stagedAt": version,
        "startedAt": version,
        "version": version
    })
}

/// Sub-resources under `/v2/apps/{id}`. App ids contain slashes, so the
/// suffix decides what the path addresses.
#[derive(Debug, PartialEq)]
enum AppPath {
    App(String),
    Restart(String),
    Versions(String),
    Version(String, String),
    Tasks(String),
    Task(String, String),
}

impl AppPath {
    fn parse(path: &str) -> Self {
        let path = path.trim_matches('/');
        if let Some(id) = path.strip_suffix("/restart") {
            AppPath::Restart(absolute(id))
        } else if let Some(id) = path.strip_suffix("/versions") {
            AppPath::Versions(absolute(id))
        } else if let Some(id) = path.strip_suffix("/tasks") {
            AppPath::Tasks(absolute(id))
        } else if let Some((id, version)) = path.rsplit_once("/versions/") {
            AppPath::Version(absolute(id), version.to_string())
        } else if let Some((id, task)) = path.rsplit_once("/tasks/") {
            AppPath::Task(absolute(id), task.to_string())
        } else {
            AppPath::App(absolute(path))
        }
    }
}

fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

// --- misc ---

async fn ping() -> &'static str {
    "pong\n"
}

async fn server_info() -> Json<Value> {
    Json(json!({
        "name": "marathon",
        "version": "1.4.0",
        "leader": LEADER,
        "frameworkId": "mock-framework",
        "marathon_config": {"master": "local", "hostname": "127.0.0.1"},
        "http_config": {"http_port": 8080}
    }))
}

async fn get_leader() -> Json<Value> {
    Json(json!({ "leader": LEADER }))
}

async fn abdicate() -> Json<Value> {
    info!("leader abdicated");
    Json(json!({ "message": "Leadership abdicated" }))
}

async fn list_queue() -> Json<Value> {
    Json(json!({ "queue": [] }))
}

// --- event subscriptions ---

#[derive(Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

fn callback_url(query: CallbackQuery) -> Result<String, ApiError> {
    query
        .callback_url
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "callbackUrl is required"))
}

async fn list_subscriptions(State(db): State<Db>) -> Json<Value> {
    Json(json!({ "callbackUrls": db.read().await.subscriptions }))
}

async fn subscribe(State(db): State<Db>, Query(query): Query<CallbackQuery>) -> ApiResult {
    let url = callback_url(query)?;
    let mut state = db.write().await;
    if !state.subscriptions.contains(&url) {
        state.subscriptions.push(url.clone());
    }
    Ok(Json(json!({
        "callbackUrl": url,
        "clientIp": "127.0.0.1",
        "eventType": "subscribe_event"
    }))
    .into_response())
}

async fn unsubscribe(State(db): State<Db>, Query(query): Query<CallbackQuery>) -> ApiResult {
    let url = callback_url(query)?;
    db.write().await.subscriptions.retain(|u| u != &url);
    Ok(Json(json!({
        "callbackUrl": url,
        "clientIp": "127.0.0.1",
        "eventType": "unsubscribe_event"
    }))
    .into_response())
}

// --- apps ---

async fn list_apps(State(db): State<Db>, Query(params): Query<Params>) -> Json<Value> {
    let state = db.read().await;
    let embed_tasks = params.get("embed").is_some_and(|e| e == "apps.tasks");
    let label = params.get("label").map(|l| match l.split_once("==") {
        Some((k, v)) => (k.to_string(), Some(v.to_string())),
        None => (l.clone(), None),
    });
    let apps: Vec<Value> = state
        .apps
        .values()
        .filter(|r| {
            params.get("cmd").map_or(true, |cmd| {
                r.definition
                    .get("cmd")
                    .and_then(Value::as_str)
                    .is_some_and(|c| c.contains(cmd.as_str()))
            })
        })
        .filter(|r| params.get("id").map_or(true, |id| r.id().contains(id.as_str())))
        .filter(|r| {
            label.as_ref().map_or(true, |(key, value)| {
                let found = r.definition.get("labels").and_then(|l| l.get(key));
                match value {
                    Some(value) => found.and_then(Value::as_str) == Some(value.as_str()),
                    None => found.is_some(),
                }
            })
        })
        .map(|r| state.app_json(r, embed_tasks))
        .collect();
    Json(json!({ "apps": apps }))
}

async fn create_app(State(db): State<Db>, Json(body): Json<Value>) -> ApiResult {
    let definition = object(body)?;
    let (app, _) = db.write().await.create_app(definition)?;
    Ok((StatusCode::CREATED, Json(app)).into_response())
}

async fn get_app_path(State(db): State<Db>, Path(path): Path<String>) -> ApiResult {
    let state = db.read().await;
    let body = match AppPath::parse(&path) {
        AppPath::App(id) => json!({ "app": state.app_json(state.app(&id)?, true) }),
        AppPath::Versions(id) => {
            let versions: Vec<&Value> = state
                .app(&id)?
                .versions
                .iter()
                .rev()
                .filter_map(|v| v.get("version"))
                .collect();
            json!({ "versions": versions })
        }
        AppPath::Version(id, version) => {
            let definition = state
                .app(&id)?
                .at_version(&version)
                .ok_or_else(|| ApiError::not_found(format!("App '{id}' does not exist in version {version}")))?;
            Value::Object(definition.clone())
        }
        AppPath::Tasks(id) => json!({ "tasks": state.app(&id)?.tasks }),
        AppPath::Restart(_) | AppPath::Task(..) => return Err(method_not_allowed()),
    };
    Ok(Json(body).into_response())
}

async fn put_app(
    State(db): State<Db>,
    Path(path): Path<String>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> ApiResult {
    let AppPath::App(id) = AppPath::parse(&path) else {
        return Err(method_not_allowed());
    };
    let mut patch = object(body)?;
    let mut state = db.write().await;

    if !state.apps.contains_key(&id) {
        patch.insert("id".to_string(), json!(id));
        let (_, handle) = state.create_app(patch)?;
        return Ok(Json(handle).into_response());
    }

    state.take_lock(&id, flag(&params, "force"))?;
    let version = state.next_version();
    let record = state.app_mut(&id)?;
    let definition = match rollback_target(&patch) {
        Some(old) => record
            .at_version(&old)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("App '{id}' does not exist in version {old}")))?,
        None => {
            let mut merged = record.definition.clone();
            merged.extend(patch);
            merged.insert("id".to_string(), json!(id));
            merged
        }
    };
    record.apply(definition, &version);
    info!(app_id = %id, %version, "changed app");
    let handle = state.deploy(version, vec![id], "ScaleApplication");
    Ok(Json(handle).into_response())
}

async fn post_app_path(
    State(db): State<Db>,
    Path(path): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult {
    let AppPath::Restart(id) = AppPath::parse(&path) else {
        return Err(method_not_allowed());
    };
    let mut state = db.write().await;
    state.app(&id)?;
    state.take_lock(&id, flag(&params, "force"))?;
    let version = state.next_version();
    state.app_mut(&id)?.restart_tasks(&version);
    info!(app_id = %id, "restarted app");
    let handle = state.deploy(version, vec![id], "RestartApplication");
    Ok(Json(handle).into_response())
}

async fn delete_app_path(
    State(db): State<Db>,
    Path(path): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult {
    let mut state = db.write().await;
    let scale = flag(&params, "scale");
    match AppPath::parse(&path) {
        AppPath::App(id) => {
            state.app(&id)?;
            state.take_lock(&id, flag(&params, "force"))?;
            state.apps.remove(&id);
            let version = state.next_version();
            info!(app_id = %id, "deleted app");
            let handle = state.deploy(version, vec![id], "StopApplication");
            Ok(Json(handle).into_response())
        }
        AppPath::Tasks(id) => {
            let host = params.get("host");
            let version = state.next_version();
            let record = state.app_mut(&id)?;
            let (killed, kept): (Vec<Value>, Vec<Value>) = record
                .tasks
                .drain(..)
                .partition(|t| host.map_or(true, |h| t.get("host").and_then(Value::as_str) == Some(h.as_str())));
            record.tasks = kept;
            if scale {
                let remaining = record.instances().saturating_sub(killed.len());
                record.set_instances(remaining, &version);
            } else {
                record.scale_tasks(&version);
            }
            Ok(Json(json!({ "tasks": killed })).into_response())
        }
        AppPath::Task(id, task_id) => {
            let version = state.next_version();
            let record = state.app_mut(&id)?;
            let index = record
                .tasks
                .iter()
                .position(|t| t.get("id").and_then(Value::as_str) == Some(task_id.as_str()))
                .ok_or_else(|| ApiError::not_found(format!("Task '{task_id}' does not exist")))?;
            let killed = record.tasks.remove(index);
            if scale {
                let remaining = record.instances().saturating_sub(1);
                record.set_instances(remaining, &version);
            } else {
                record.scale_tasks(&version);
            }
            Ok(Json(json!({ "task": killed })).into_response())
        }
        AppPath::Restart(_) | AppPath::Versions(_) | AppPath::Version(..) => Err(method_not_allowed()),
    }
}

// --- tasks ---

async fn list_tasks(State(db): State<Db>, Query(params): Query<Params>) -> Json<Value> {
    let state = db.read().await;
    // Every mock task is running as soon as it exists.
    let tasks: Vec<Value> = match params.get("status").map(String::as_str) {
        Some("staging") => Vec::new(),
        _ => state.apps.values().flat_map(|r| r.tasks.iter().cloned()).collect(),
    };
    Json(json!({ "tasks": tasks }))
}

async fn delete_tasks(
    State(db): State<Db>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> ApiResult {
    let ids: Vec<String> = body
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid("error.path.missing: ids"))?
        .iter()
        .filter_map(|id| id.as_str().map(str::to_string))
        .collect();
    let scale = flag(&params, "scale");
    let mut state = db.write().await;
    let version = state.next_version();
    for record in state.apps.values_mut() {
        let before = record.tasks.len();
        record
            .tasks
            .retain(|t| !t.get("id").and_then(Value::as_str).is_some_and(|id| ids.iter().any(|i| i == id)));
        let killed = before - record.tasks.len();
        if killed == 0 {
            continue;
        }
        if scale {
            let remaining = record.instances().saturating_sub(killed);
            record.set_instances(remaining, &version);
        } else {
            record.scale_tasks(&version);
        }
    }
    debug!(count = ids.len(), scale, "killed tasks");
    Ok(StatusCode::OK.into_response())
}

// --- deployments ---

async fn list_deployments(State(db): State<Db>) -> Json<Value> {
    let listed = std::mem::take(&mut db.write().await.deployments);
    Json(Value::Array(listed.iter().map(DeploymentRecord::to_json).collect()))
}

async fn cancel_deployment(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(params): Query<Params>,
) -> ApiResult {
    let mut state = db.write().await;
    let index = state
        .deployments
        .iter()
        .position(|d| d.id == id)
        .ok_or_else(|| ApiError::not_found(format!("DeploymentPlan {id} does not exist")))?;
    let canceled = state.deployments.remove(index);
    info!(deployment_id = %id, "canceled deployment");
    if flag(&params, "force") {
        return Ok(StatusCode::ACCEPTED.into_response());
    }
    let version = state.next_version();
    let handle = state.deploy(version, canceled.affected_apps, "RestartApplication");
    Ok(Json(handle).into_response())
}

// --- groups ---

async fn get_root_group(State(db): State<Db>) -> Json<Value> {
    Json(db.read().await.root_group())
}

async fn create_group(State(db): State<Db>, Json(body): Json<Value>) -> ApiResult {
    let mut definition = object(body)?;
    let id = definition
        .get("id")
        .and_then(Value::as_str)
        .map(absolute)
        .ok_or_else(|| ApiError::invalid("error.path.missing: id"))?;
    let mut state = db.write().await;
    if state.groups.contains_key(&id) {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("Group {id} is already created. Use PUT to change this group."),
        ));
    }
    definition.insert("id".to_string(), json!(id));
    definition.entry("dependencies").or_insert(json!([]));
    let version = state.next_version();
    let mut record = GroupRecord {
        definition: Map::new(),
        versions: Vec::new(),
    };
    record.apply(definition, &version);
    let apps = record.app_ids();
    state.groups.insert(id.clone(), record);
    info!(group_id = %id, "created group");
    let handle = state.deploy(version, apps, "StartApplication");
    Ok((StatusCode::CREATED, Json(handle)).into_response())
}

async fn get_group(State(db): State<Db>, Path(path): Path<String>) -> ApiResult {
    let id = absolute(&path);
    let state = db.read().await;
    if id == "/" {
        return Ok(Json(state.root_group()).into_response());
    }
    let record = state
        .groups
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Group '{id}' does not exist")))?;
    Ok(Json(Value::Object(record.definition.clone())).into_response())
}

async fn update_group(
    State(db): State<Db>,
    Path(path): Path<String>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> ApiResult {
    let id = absolute(&path);
    let patch = object(body)?;
    let mut state = db.write().await;
    let record = state
        .groups
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Group '{id}' does not exist")))?;

    if flag(&params, "dryRun") {
        let mut apps = app_ids_of(&patch);
        if apps.is_empty() {
            apps = record.app_ids();
        }
        let steps: Vec<Value> = apps
            .iter()
            .map(|app| json!({ "actions": [{ "action": "ScaleApplication", "app": app }] }))
            .collect();
        return Ok(Json(json!({ "steps": steps })).into_response());
    }

    let definition = match rollback_target(&patch) {
        Some(old) => record
            .versions
            .iter()
            .find(|v| v.get("version").and_then(Value::as_str) == Some(old.as_str()))
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Group '{id}' does not exist in version {old}")))?,
        None => {
            let mut merged = record.definition.clone();
            merged.extend(patch);
            merged.insert("id".to_string(), json!(id));
            merged
        }
    };
    let version = state.next_version();
    let record = state
        .groups
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("Group '{id}' does not exist")))?;
    record.apply(definition, &version);
    let apps = record.app_ids();
    info!(group_id = %id, %version, "changed group");
    let handle = state.deploy(version, apps, "ScaleApplication");
    Ok(Json(handle).into_response())
}

async fn delete_group(State(db): State<Db>, Path(path): Path<String>) -> ApiResult {
    let id = absolute(&path);
    let mut state = db.write().await;
    let record = state
        .groups
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("Group '{id}' does not exist")))?;
    let version = state.next_version();
    info!(group_id = %id, "deleted group");
    let handle = state.deploy(version, record.app_ids(), "StopApplication");
    Ok(Json(handle).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_path_splits_sub_resources() {
        assert_eq!(AppPath::parse("app/foo"), AppPath::App("/app/foo".to_string()));
        assert_eq!(AppPath::parse("app/foo/restart"), AppPath::Restart("/app/foo".to_string()));
        assert_eq!(AppPath::parse("/app/foo/versions"), AppPath::Versions("/app/foo".to_string()));
        assert_eq!(
            AppPath::parse("app/foo/versions/2015-01-01T00:00:01.000Z"),
            AppPath::Version("/app/foo".to_string(), "2015-01-01T00:00:01.000Z".to_string())
        );
        assert_eq!(AppPath::parse("app/foo/tasks"), AppPath::Tasks("/app/foo".to_string()));
        assert_eq!(
            AppPath::parse("app/foo/tasks/app_foo.1"),
            AppPath::Task("/app/foo".to_string(), "app_foo.1".to_string())
        );
    }

    #[test]
    fn versions_increase() {
        let mut state = MockState::default();
        let first = state.next_version();
        let second = state.next_version();
        assert!(second > first);
        assert_eq!(first, "2015-01-01T00:00:01.000Z");
    }

    #[test]
    fn app_record_converges_tasks() {
        let mut record = AppRecord::new(
            json!({"id": "/app/foo", "instances": 2}).as_object().cloned().unwrap(),
            "v1",
        );
        assert_eq!(record.tasks.len(), 2);
        assert_eq!(record.tasks[0]["appId"], "/app/foo");
        assert!(record.tasks[0]["id"].as_str().unwrap().starts_with("app_foo."));

        record.set_instances(5, "v2");
        assert_eq!(record.tasks.len(), 5);
        assert_eq!(record.versions.len(), 2);
        assert_eq!(record.at_version("v1").unwrap()["instances"], 2);
    }

    #[test]
    fn missing_instances_default_to_one() {
        let record = AppRecord::new(json!({"id": "/a"}).as_object().cloned().unwrap(), "v1");
        assert_eq!(record.definition["instances"], 1);
        assert_eq!(record.tasks.len(), 1);
    }

    #[test]
    fn lock_is_released_by_force() {
        let mut state = MockState::default();
        state.deploy("v1".to_string(), vec!["/a".to_string()], "StartApplication");
        assert!(state.take_lock("/b", false).is_ok());
        assert!(state.take_lock("/a", false).is_err());
        assert!(state.take_lock("/a", true).is_ok());
        assert!(state.deployments.is_empty());
    }

    #[test]
    fn deployment_json_has_one_step() {
        let deployment = DeploymentRecord {
            id: "d1".to_string(),
            version: "v1".to_string(),
            affected_apps: vec!["/a".to_string()],
            action: "ScaleApplication",
        };
        let json = deployment.to_json();
        assert_eq!(json["steps"][0]["actions"][0], json!({"action": "ScaleApplication", "app": "/a"}));
        assert_eq!(json["totalSteps"], 1);
    }
}
