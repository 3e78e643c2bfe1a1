//! Container definitions embedded in an app: the container itself, its
//! docker settings, port mappings and volumes. All four validate their
//! enumerated fields when built.

use std::fmt;

use serde_json::{json, Value};

use crate::entity::serialize_info;
use crate::error::{MarathonError, Result};
use crate::util::{self, get_bool, get_str, items_to_pretty, Attributes, Pretty};

pub const CONTAINER_TYPES: &[&str] = &["DOCKER", "MESOS"];
pub const DOCKER_NETWORKS: &[&str] = &["BRIDGE", "HOST"];
pub const PORT_PROTOCOLS: &[&str] = &["tcp", "udp"];
pub const VOLUME_MODES: &[&str] = &["RW", "RO"];

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    info: Attributes,
    docker: Option<ContainerDocker>,
    volumes: Vec<ContainerVolume>,
}

serialize_info!(Container);

impl Container {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::merge_with_defaults(&json!({"type": "DOCKER", "volumes": []}), value)?;
        util::validate_field_choice(&info, "type", CONTAINER_TYPES, true)?;
        let docker = match info.get("docker") {
            Some(docker) if !docker.is_null() => Some(ContainerDocker::new(docker)?),
            _ => None,
        };
        let volumes = util::get_array(&info, "volumes")
            .iter()
            .map(ContainerVolume::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { info, docker, volumes })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn container_type(&self) -> Option<&str> {
        get_str(&self.info, "type")
    }

    pub fn docker(&self) -> Option<&ContainerDocker> {
        self.docker.as_ref()
    }

    pub fn volumes(&self) -> &[ContainerVolume] {
        &self.volumes
    }
}

impl Pretty for Container {
    fn to_pretty_string(&self) -> String {
        self.docker.to_pretty_string()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Container {{ type: {} docker: {} volumes: {} }}",
            self.container_type().unwrap_or_default(),
            self.docker.to_pretty_string(),
            items_to_pretty(&self.volumes)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDocker {
    info: Attributes,
    port_mappings: Vec<ContainerDockerPortMapping>,
}

serialize_info!(ContainerDocker);

impl ContainerDocker {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::merge_with_defaults(&json!({"network": "BRIDGE", "portMappings": []}), value)?;
        util::validate_field_choice(&info, "network", DOCKER_NETWORKS, true)?;
        if get_str(&info, "image").is_none() {
            return Err(MarathonError::Argument("image must not be nil".to_string()));
        }
        let port_mappings = util::get_array(&info, "portMappings")
            .iter()
            .map(ContainerDockerPortMapping::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { info, port_mappings })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn image(&self) -> &str {
        get_str(&self.info, "image").unwrap_or_default()
    }

    pub fn network(&self) -> Option<&str> {
        get_str(&self.info, "network")
    }

    pub fn privileged(&self) -> Option<bool> {
        get_bool(&self.info, "privileged")
    }

    pub fn force_pull_image(&self) -> Option<bool> {
        get_bool(&self.info, "forcePullImage")
    }

    pub fn port_mappings(&self) -> &[ContainerDockerPortMapping] {
        &self.port_mappings
    }
}

impl Pretty for ContainerDocker {
    fn to_pretty_string(&self) -> String {
        self.image().to_string()
    }
}

impl fmt::Display for ContainerDocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerDocker {{ image: {} }}", self.image())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDockerPortMapping {
    info: Attributes,
}

serialize_info!(ContainerDockerPortMapping);

impl ContainerDockerPortMapping {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::merge_with_defaults(&json!({"protocol": "tcp", "hostPort": 0}), value)?;
        util::validate_field_choice(&info, "protocol", PORT_PROTOCOLS, false)?;
        match info.get("containerPort") {
            None | Some(Value::Null) => {
                return Err(MarathonError::Argument("containerPort must not be nil".to_string()))
            }
            Some(port) if !port.as_i64().is_some_and(|p| p > 0) => {
                return Err(MarathonError::Argument(
                    "containerPort must be a positive number".to_string(),
                ))
            }
            Some(_) => {}
        }
        if !info.get("hostPort").and_then(Value::as_i64).is_some_and(|p| p >= 0) {
            return Err(MarathonError::Argument(
                "hostPort must be a non negative number".to_string(),
            ));
        }
        Ok(Self { info })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn container_port(&self) -> u64 {
        util::get_u64(&self.info, "containerPort").unwrap_or_default()
    }

    pub fn host_port(&self) -> u64 {
        util::get_u64(&self.info, "hostPort").unwrap_or_default()
    }

    pub fn service_port(&self) -> Option<u64> {
        util::get_u64(&self.info, "servicePort")
    }

    pub fn protocol(&self) -> &str {
        get_str(&self.info, "protocol").unwrap_or_default()
    }
}

impl Pretty for ContainerDockerPortMapping {
    fn to_pretty_string(&self) -> String {
        format!("{}/{}:{}", self.protocol(), self.container_port(), self.host_port())
    }
}

impl fmt::Display for ContainerDockerPortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContainerDockerPortMapping {{ protocol: {} containerPort: {} hostPort: {} }}",
            self.protocol(),
            self.container_port(),
            self.host_port()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerVolume {
    info: Attributes,
}

serialize_info!(ContainerVolume);

impl ContainerVolume {
    pub fn new(value: &Value) -> Result<Self> {
        let info = util::merge_with_defaults(&json!({"mode": "RW"}), value)?;
        util::validate_field_choice(&info, "mode", VOLUME_MODES, true)?;
        let container_path = get_str(&info, "containerPath")
            .ok_or_else(|| MarathonError::Argument("containerPath must not be nil".to_string()))?;
        if !container_path.starts_with('/') {
            return Err(MarathonError::Argument(
                "containerPath must be an absolute path".to_string(),
            ));
        }
        if get_str(&info, "hostPath").is_none() {
            return Err(MarathonError::Argument("hostPath must not be nil".to_string()));
        }
        Ok(Self { info })
    }

    pub fn info(&self) -> &Attributes {
        &self.info
    }

    pub fn container_path(&self) -> &str {
        get_str(&self.info, "containerPath").unwrap_or_default()
    }

    pub fn host_path(&self) -> &str {
        get_str(&self.info, "hostPath").unwrap_or_default()
    }

    pub fn mode(&self) -> Option<&str> {
        get_str(&self.info, "mode")
    }
}

impl Pretty for ContainerVolume {
    fn to_pretty_string(&self) -> String {
        format!(
            "{}:{}:{}",
            self.container_path(),
            self.host_path(),
            self.mode().unwrap_or_default()
        )
    }
}

impl fmt::Display for ContainerVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContainerVolume {{ containerPath: {} hostPath: {} mode: {} }}",
            self.container_path(),
            self.host_path(),
            self.mode().unwrap_or_default()
        )
    }
}
