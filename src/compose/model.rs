//! Canonical compose model
//!
//! Produced once per invocation by the normalizer and read-only afterwards.
//! Maps are ordered by key so that rendering and iteration are stable.

use super::config::{Healthcheck, IpamConfig, ServiceNetworkConfig};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fully resolved compose specification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeSpec {
    /// Project name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Services by name
    pub services: BTreeMap<String, ServiceSpec>,
    /// Networks by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkSpec>,
    /// Volumes by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeSpec>,
}

/// One deployable service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceSpec {
    /// Image reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    /// Command arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Entrypoint arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    /// Env files, in load order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<Vec<String>>,
    /// Services this one waits on
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, DependencyCondition>,
    /// DNS servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    /// DNS search domains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_search: Option<Vec<String>>,
    /// Tmpfs mounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmpfs: Option<Vec<String>>,
    /// Attached networks
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, Option<ServiceNetworkConfig>>,
    /// Port mappings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,
    /// Mount specs in short syntax, as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,
    /// Extra host entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<String>>,
    /// Labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// User
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Keep stdin open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin_open: Option<bool>,
    /// Allocate a TTY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    /// Read-only root filesystem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    /// Privileged mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    /// Run an init process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
    /// Target platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// CPU limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
    /// Memory limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<String>,
    /// Restart policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// Container name override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Pull policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
    /// Stop signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    /// Stop grace period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_grace_period: Option<String>,
    /// Healthcheck
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
}

impl ServiceSpec {
    /// Names of the services this one waits on, in name order
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.depends_on.keys().map(String::as_str)
    }
}

/// Image build instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
    /// Build context, relative to the project directory unless absolute
    pub context: String,
    /// Dockerfile path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Target stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Build arguments
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
    /// Labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            context: ".".to_string(),
            dockerfile: None,
            target: None,
            args: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

impl BuildSpec {
    /// Build context resolved against `project_dir`
    pub fn context_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.context)
    }
}

/// Readiness criterion a dependent service waits for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Dependency container has been started
    #[default]
    ServiceStarted,
    /// Dependency reports healthy
    ServiceHealthy,
    /// Dependency ran to completion with exit status zero
    ServiceCompletedSuccessfully,
}

impl Condition {
    /// Name as written in compose files
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::ServiceStarted => "service_started",
            Condition::ServiceHealthy => "service_healthy",
            Condition::ServiceCompletedSuccessfully => "service_completed_successfully",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "service_started" => Ok(Condition::ServiceStarted),
            "service_healthy" => Ok(Condition::ServiceHealthy),
            "service_completed_successfully" => Ok(Condition::ServiceCompletedSuccessfully),
            other => Err(format!("unknown dependency condition '{}'", other)),
        }
    }
}

/// Condition attached to one `depends_on` entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DependencyCondition {
    /// Readiness criterion
    pub condition: Condition,
    /// Restart the dependent when the dependency is restarted
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub restart: bool,
}

/// Network definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkSpec {
    /// Driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Driver options
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub driver_opts: BTreeMap<String, String>,
    /// Managed outside the project
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    /// Name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Internal network
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub internal: bool,
    /// Attachable
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub attachable: bool,
    /// Enable IPv6
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enable_ipv6: bool,
    /// Labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// IPAM configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<IpamConfig>,
}

/// Volume definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSpec {
    /// Driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Driver options
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub driver_opts: BTreeMap<String, String>,
    /// Managed outside the project
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
    /// Name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ComposeSpec {
    /// Render the model as compose YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render the model as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Non-fatal problems worth reporting to the user
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, service) in &self.services {
            if service.image.is_none() && service.build.is_none() {
                warnings.push(format!(
                    "Service '{}' has neither 'image' nor 'build' specified",
                    name
                ));
            }

            for net in service.networks.keys() {
                if net != "default" && !self.networks.contains_key(net) {
                    warnings.push(format!(
                        "Service '{}' references undefined network '{}'",
                        name, net
                    ));
                }
            }

            for mount in service.volumes.iter().flatten() {
                if let Some(source) = named_volume_source(mount) {
                    if !self.volumes.contains_key(source) {
                        warnings.push(format!(
                            "Service '{}' references undefined volume '{}'",
                            name, source
                        ));
                    }
                }
            }
        }

        warnings
    }
}

/// Source of a short-syntax mount if it names a volume rather than a path
fn named_volume_source(mount: &str) -> Option<&str> {
    let (source, _) = mount.split_once(':')?;
    let is_path = source.is_empty()
        || source.starts_with('/')
        || source.starts_with('.')
        || source.starts_with('~')
        || source.starts_with('$');
    (!is_path).then_some(source)
}
