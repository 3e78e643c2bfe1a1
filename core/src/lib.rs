//! Blocking client for the Marathon REST API.
//!
//! # Overview
//! A [`Marathon`] handle owns one [`Connection`] and hands out accessors
//! ([`Apps`], [`Tasks`], [`Deployments`], [`Groups`], [`Queues`],
//! [`EventSubscriptions`], [`Leader`]). Accessors turn calls into HTTP
//! requests and wrap the JSON they get back into entities bound to the same
//! handle, so follow-up calls (`refresh`, `scale`, `wait`) reuse it.
//!
//! # Design
//! - Request building and response parsing are plain functions over
//!   [`HttpRequest`] / [`HttpResponse`]; the round trip itself goes through
//!   the [`Transport`] trait, backed by `ureq` by default.
//! - Every entity is a normalized attribute map plus typed sub-objects
//!   derived from it. Unknown keys survive a round trip unchanged.
//! - Non-2xx responses become a [`MarathonError`] classified by status.
//!
//! ```no_run
//! use std::time::Duration;
//! use marathon_core::Marathon;
//!
//! # fn main() -> marathon_core::Result<()> {
//! let marathon = Marathon::new("http://localhost:8080");
//! let app = marathon.apps().get("/my-app")?;
//! app.scale(3, false)?.wait(Duration::from_secs(60))?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod connection;
pub mod constraint;
pub mod container;
pub mod deployment;
pub mod deployment_info;
mod entity;
pub mod error;
pub mod event_subscriptions;
pub mod group;
pub mod health_check;
pub mod http;
pub mod leader;
pub mod marathon;
pub mod queue;
pub mod task;
pub mod util;

#[cfg(test)]
mod testing;

pub use app::{App, Apps, ListApps};
pub use config::ConnectionOptions;
pub use connection::Connection;
pub use constraint::Constraint;
pub use container::{Container, ContainerDocker, ContainerDockerPortMapping, ContainerVolume};
pub use deployment::{Deployment, DeploymentAction, DeploymentStep, Deployments};
pub use deployment_info::DeploymentInfo;
pub use error::{MarathonError, Result};
pub use event_subscriptions::EventSubscriptions;
pub use group::{Group, GroupChange, Groups};
pub use health_check::HealthCheck;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use leader::Leader;
pub use marathon::Marathon;
pub use queue::{QueueElement, Queues};
pub use task::{Task, Tasks};
pub use util::Pretty;
