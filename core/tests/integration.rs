//! Lifecycle tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client through
//! the default `ureq` transport over real HTTP. Every deployment the mock
//! records is reported once by the deployment list, so `wait` completes on
//! its second poll.

use std::time::Duration;

use marathon_core::{ConnectionOptions, GroupChange, ListApps, Marathon, MarathonError};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(5);

fn start_server() -> Marathon {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_marathon::run(listener).await
        })
        .unwrap();
    });

    Marathon::new(&format!("http://{addr}"))
}

#[test]
fn server_endpoints() {
    let marathon = start_server();

    assert_eq!(marathon.ping().unwrap(), "pong\n");
    assert_eq!(marathon.info().unwrap()["name"], "marathon");
    assert_eq!(marathon.leader().get().unwrap(), "127.0.0.1:8080");
    assert_eq!(marathon.leader().abdicate().unwrap(), "Leadership abdicated");
    assert!(marathon.queues().list().unwrap().is_empty());
}

#[test]
fn app_lifecycle() {
    let marathon = start_server();
    let apps = marathon.apps();

    // Step 1: nothing deployed yet.
    assert!(apps.list(&ListApps::default()).unwrap().is_empty());

    // Step 2: start an app from snake_case attributes.
    let mut app = apps
        .start(&json!({
            "id": "/integration/app",
            "cmd": "sleep 60",
            "instances": 2,
            "env": {"MY_VAR": "1"},
            "health_checks": [{"protocol": "TCP"}]
        }))
        .unwrap();
    assert_eq!(app.id(), "/integration/app");
    assert_eq!(app.health_checks()[0].protocol(), "TCP");
    let first_version = app.version().unwrap().to_string();

    // Step 3: the start deployment still locks the app.
    let err = app.scale(3, false).unwrap_err();
    assert!(matches!(err, MarathonError::Conflict(_)), "{err}");

    // Step 4: force the scale and wait for it.
    app.scale(3, true).unwrap().wait(WAIT).unwrap();

    // Step 5: no tasks were loaded, so asking for them refreshes.
    assert_eq!(app.tasks().unwrap().len(), 3);
    assert_eq!(app.instances(), Some(3));
    assert_eq!(app.env().unwrap()["MY_VAR"], "1");

    // Step 6: versions, newest first, and an old version as read-only app.
    let versions = app.versions().unwrap();
    assert_eq!(versions.len(), 2);
    let old = app.version_at(&first_version).unwrap();
    assert!(old.read_only());
    assert_eq!(old.instances(), Some(2));

    // Step 7: roll back to the first version.
    app.roll_back(&first_version, false).unwrap().wait(WAIT).unwrap();
    app.refresh().unwrap();
    assert_eq!(app.instances(), Some(2));

    // Step 8: filters.
    let filter = ListApps {
        cmd: Some("sleep".to_string()),
        embed: Some("apps.tasks".to_string()),
        ..ListApps::default()
    };
    let listed = apps.list(&filter).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].info().contains_key("tasks"));

    // Step 9: delete, then the app is gone.
    apps.delete(app.id(), false).unwrap().wait(WAIT).unwrap();
    let err = apps.get("/integration/app").unwrap_err();
    assert!(matches!(err, MarathonError::NotFound(_)), "{err}");
}

#[test]
fn invalid_app_is_a_client_error() {
    let marathon = start_server();
    let err = marathon.apps().start(&json!({"cmd": "sleep 1"})).unwrap_err();
    assert!(matches!(err, MarathonError::Client(ref m) if m.contains("Object is not valid")), "{err}");
}

#[test]
fn task_lifecycle() {
    let marathon = start_server();
    let app = marathon
        .apps()
        .start(&json!({"id": "/tasks-app", "instances": 3}))
        .unwrap();

    let tasks = marathon.tasks().list(Some("running")).unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(marathon.tasks().list(Some("staging")).unwrap().is_empty());

    // Killing without scale keeps the instance count.
    let mut task = tasks[0].clone();
    task.kill(false).unwrap();
    assert_eq!(task.app_id(), Some("/tasks-app"));
    assert_eq!(marathon.tasks().get(app.id()).unwrap().len(), 3);

    // Killing with scale lowers it.
    let second = tasks[1].id().unwrap();
    marathon.tasks().delete_many(&[second], true).unwrap();
    assert_eq!(marathon.apps().get(app.id()).unwrap().instances(), Some(2));

    let killed = marathon.tasks().kill_all(app.id(), Some("127.0.0.1"), true).unwrap();
    assert_eq!(killed.len(), 2);
    assert_eq!(marathon.apps().get(app.id()).unwrap().instances(), Some(0));
}

#[test]
fn deployment_cancel() {
    let marathon = start_server();
    let app = marathon.apps().start(&json!({"id": "/cancel-me"})).unwrap();

    // Cancelling without force starts a rollback deployment.
    let restart = app.restart(true).unwrap();
    let id = restart.deployment_id().unwrap().to_string();
    let running = marathon.deployments().list().unwrap();
    assert!(running.iter().any(|d| d.id() == Some(id.as_str())));

    let restart = app.restart(false).unwrap();
    let rollback = marathon
        .deployments()
        .cancel(restart.deployment_id().unwrap(), false)
        .unwrap()
        .expect("plain cancel starts a rollback");
    assert_ne!(rollback.deployment_id(), restart.deployment_id());

    // A forced cancel does not.
    assert!(marathon
        .deployments()
        .cancel(rollback.deployment_id().unwrap(), true)
        .unwrap()
        .is_none());

    let err = marathon.deployments().cancel("no-such-deployment", false).unwrap_err();
    assert!(matches!(err, MarathonError::NotFound(_)), "{err}");
}

#[test]
fn group_lifecycle() {
    let marathon = start_server();
    let groups = marathon.groups();

    let info = groups
        .start(&json!({
            "id": "/product",
            "apps": [{"id": "/product/service", "cmd": "sleep 60", "instances": 1}]
        }))
        .unwrap();
    info.wait(WAIT).unwrap();

    let mut group = groups.get("/product").unwrap();
    assert_eq!(group.apps()[0].id(), "/product/service");
    assert!(group.dependencies().is_empty());

    let preview = group
        .change(&json!({"apps": [{"id": "/product/other"}]}), false, true)
        .unwrap();
    let GroupChange::DryRun(steps) = preview else {
        panic!("dry run must not deploy");
    };
    assert_eq!(steps[0].actions()[0].app(), Some("/product/other"));

    group
        .change(&json!({"dependencies": ["/db"]}), false, false)
        .unwrap()
        .into_deployment()
        .unwrap()
        .wait(WAIT)
        .unwrap();
    group.refresh().unwrap();
    assert_eq!(group.dependencies(), vec!["/db".to_string()]);

    let root = groups.list().unwrap();
    assert_eq!(root.id(), "/");
    assert_eq!(root.groups()[0].id(), "/product");

    groups.delete("/product", false).unwrap();
    assert!(matches!(groups.get("/product"), Err(MarathonError::NotFound(_))));
}

#[test]
fn event_subscriptions() {
    let marathon = start_server();
    let subscriptions = marathon.event_subscriptions();

    let ack = subscriptions.register("http://localhost:9000/events").unwrap();
    assert_eq!(ack["eventType"], "subscribe_event");
    assert_eq!(
        subscriptions.list().unwrap(),
        vec!["http://localhost:9000/events".to_string()]
    );

    subscriptions.unregister("http://localhost:9000/events").unwrap();
    assert!(subscriptions.list().unwrap().is_empty());
}

#[test]
fn refused_connection_is_an_io_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = Marathon::new(&format!("http://{addr}")).ping().unwrap_err();
    assert!(matches!(err, MarathonError::Io(_)), "{err:?}");
}

#[test]
fn silent_server_times_out_as_io_error() {
    // Accepted by the kernel backlog, never answered.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let options = ConnectionOptions::default().with_timeout(Duration::from_millis(300));
    let err = Marathon::with_options(&format!("http://{addr}"), options)
        .ping()
        .unwrap_err();
    assert!(matches!(err, MarathonError::Io(_)), "{err:?}");
    drop(listener);
}
