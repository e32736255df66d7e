//! Normalization of a raw compose document into the canonical model
//!
//! Every loosely-typed field is decoded into its tagged shape from
//! [`super::config`] and resolved into exactly one canonical form here. Field
//! failures are reported against the service and field they occurred in, and
//! the first failure aborts the load.

use super::config::{
    BuildConfig, CommandConfig, DependsOnConfig, EnvFileConfig, EnvFileEntry, EnvironmentConfig,
    ExternalConfig, Healthcheck, KeyValueConfig, NetworkConfig, NetworksConfig, RawDocument,
    ScalarValue, ServiceNetworkConfig, StringOrList, VolumeConfig,
};
use super::env::EnvLookup;
use super::model::{
    BuildSpec, ComposeSpec, Condition, DependencyCondition, NetworkSpec, ServiceSpec, VolumeSpec,
};
use crate::error::{ComposeError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Converts raw documents into [`ComposeSpec`]
pub struct Normalizer<'a> {
    env: &'a dyn EnvLookup,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer; `env` backs bare environment keys
    pub fn new(env: &'a dyn EnvLookup) -> Self {
        Self { env }
    }

    /// Normalize a merged raw document
    pub fn normalize(&self, raw: RawDocument) -> Result<ComposeSpec> {
        let mut services = BTreeMap::new();
        for (name, value) in raw.services {
            let service = self.normalize_service(&name, value)?;
            tracing::debug!(service = %name, "Normalized service");
            services.insert(name, service);
        }

        check_dependencies(&services)?;

        let mut networks = BTreeMap::new();
        for (name, value) in raw.networks {
            let network = normalize_network(&name, value)?;
            networks.insert(name, network);
        }

        let mut volumes = BTreeMap::new();
        for (name, value) in raw.volumes {
            let volume = normalize_volume(&name, value)?;
            volumes.insert(name, volume);
        }

        Ok(ComposeSpec {
            name: raw.name,
            services,
            networks,
            volumes,
        })
    }

    /// Normalize one service definition
    pub fn normalize_service(&self, name: &str, value: Value) -> Result<ServiceSpec> {
        let map = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                return Err(ComposeError::InvalidDefinition {
                    kind: "service",
                    name: name.to_string(),
                    message: format!("expected a mapping, found {}", kind_of(&other)),
                })
            }
        };
        let fields = FieldReader { service: name, map: &map };

        Ok(ServiceSpec {
            image: fields.string("image")?,
            build: fields.build("build")?,
            command: fields.typed("command")?.map(resolve_command),
            entrypoint: fields.typed("entrypoint")?.map(resolve_command),
            environment: fields
                .typed("environment")?
                .map(|env: EnvironmentConfig| self.resolve_environment(env)),
            env_file: fields.typed("env_file")?.map(resolve_env_file),
            depends_on: fields
                .typed("depends_on")?
                .map(resolve_depends_on)
                .unwrap_or_default(),
            dns: fields.typed("dns")?.map(resolve_string_or_list),
            dns_search: fields.typed("dns_search")?.map(resolve_string_or_list),
            tmpfs: fields.typed("tmpfs")?.map(resolve_string_or_list),
            networks: fields
                .typed("networks")?
                .map(resolve_networks)
                .unwrap_or_default(),
            ports: fields.string_list("ports")?,
            volumes: fields.string_list("volumes")?,
            extra_hosts: fields.string_list("extra_hosts")?,
            labels: fields.typed("labels")?.map(resolve_key_values),
            working_dir: fields.string("working_dir")?,
            user: fields.string("user")?,
            hostname: fields.string("hostname")?,
            stdin_open: fields.typed("stdin_open")?,
            tty: fields.typed("tty")?,
            read_only: fields.typed("read_only")?,
            privileged: fields.typed("privileged")?,
            init: fields.typed("init")?,
            platform: fields.string("platform")?,
            cpus: fields.string("cpus")?,
            mem_limit: fields.string("mem_limit")?,
            restart: fields.string("restart")?,
            container_name: fields.string("container_name")?,
            pull_policy: fields.string("pull_policy")?,
            stop_signal: fields.string("stop_signal")?,
            stop_grace_period: fields.string("stop_grace_period")?,
            healthcheck: fields.typed::<Healthcheck>("healthcheck")?,
        })
    }

    fn resolve_environment(&self, config: EnvironmentConfig) -> BTreeMap<String, String> {
        match config {
            EnvironmentConfig::Array(items) => items
                .into_iter()
                .map(|item| {
                    let entry = item.to_string();
                    match entry.split_once('=') {
                        Some((key, value)) => (key.to_string(), value.to_string()),
                        None => {
                            let value = self.env.get_or_empty(&entry);
                            (entry, value)
                        }
                    }
                })
                .collect(),
            EnvironmentConfig::Map(map) => map
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Some(v) => v.to_string(),
                        None => self.env.get_or_empty(&key),
                    };
                    (key, value)
                })
                .collect(),
        }
    }
}

/// Reads individual fields of one service, tagging failures with their location
struct FieldReader<'m> {
    service: &'m str,
    map: &'m Mapping,
}

impl FieldReader<'_> {
    fn raw(&self, field: &str) -> Option<&Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn typed<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        match self.raw(field) {
            None => Ok(None),
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|e| ComposeError::field(self.service, field, e)),
        }
    }

    /// Scalar field coerced to a string
    fn string(&self, field: &str) -> Result<Option<String>> {
        match self.raw(field) {
            Some(value) if !is_scalar(value) => Err(ComposeError::field(
                self.service,
                field,
                format!("expected a scalar, found {}", kind_of(value)),
            )),
            _ => Ok(self.typed::<ScalarValue>(field)?.map(|v| v.to_string())),
        }
    }

    /// List of scalars coerced to strings
    fn string_list(&self, field: &str) -> Result<Option<Vec<String>>> {
        match self.raw(field) {
            Some(value) if !value.is_sequence() => Err(ComposeError::field(
                self.service,
                field,
                format!("expected a list, found {}", kind_of(value)),
            )),
            _ => Ok(self
                .typed::<Vec<ScalarValue>>(field)?
                .map(|items| items.iter().map(ToString::to_string).collect())),
        }
    }

    fn build(&self, field: &str) -> Result<Option<BuildSpec>> {
        match self.raw(field) {
            Some(value) if !(value.is_string() || value.is_mapping()) => Err(ComposeError::field(
                self.service,
                field,
                format!("expected a string or a mapping, found {}", kind_of(value)),
            )),
            _ => Ok(self.typed::<BuildConfig>(field)?.map(resolve_build)),
        }
    }
}

fn resolve_command(config: CommandConfig) -> Vec<String> {
    match config {
        CommandConfig::Shell(s) => s.split_whitespace().map(str::to_string).collect(),
        CommandConfig::Exec(items) => items.iter().map(ToString::to_string).collect(),
    }
}

fn resolve_env_file(config: EnvFileConfig) -> Vec<String> {
    match config {
        EnvFileConfig::Single(path) => vec![path],
        EnvFileConfig::Multiple(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                EnvFileEntry::Path(path) => Some(path.to_string()),
                EnvFileEntry::Detailed { path, .. } => path,
            })
            .collect(),
    }
}

fn resolve_depends_on(config: DependsOnConfig) -> BTreeMap<String, DependencyCondition> {
    match config {
        DependsOnConfig::Array(names) => names
            .into_iter()
            .map(|name| (name, DependencyCondition::default()))
            .collect(),
        DependsOnConfig::Map(map) => map
            .into_iter()
            .map(|(name, value)| (name, resolve_dependency_condition(&value)))
            .collect(),
    }
}

/// Read `{condition, restart}` leniently; anything unrecognized keeps the default
fn resolve_dependency_condition(value: &Value) -> DependencyCondition {
    let condition = value
        .get("condition")
        .and_then(Value::as_str)
        .and_then(|c| c.parse::<Condition>().ok())
        .unwrap_or_default();
    let restart = value
        .get("restart")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    DependencyCondition { condition, restart }
}

fn resolve_string_or_list(config: StringOrList) -> Vec<String> {
    match config {
        StringOrList::Single(value) => vec![value.to_string()],
        StringOrList::List(items) => items.iter().map(ToString::to_string).collect(),
    }
}

fn resolve_networks(config: NetworksConfig) -> BTreeMap<String, Option<ServiceNetworkConfig>> {
    match config {
        NetworksConfig::Array(names) => names.into_iter().map(|name| (name, None)).collect(),
        NetworksConfig::Map(map) => map,
    }
}

/// `KEY=VALUE` lists and maps into a string map; bare keys and nulls map to ""
fn resolve_key_values(config: KeyValueConfig) -> BTreeMap<String, String> {
    match config {
        KeyValueConfig::Array(items) => items
            .iter()
            .map(|item| {
                let entry = item.to_string();
                match entry.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (entry, String::new()),
                }
            })
            .collect(),
        KeyValueConfig::Map(map) => map
            .into_iter()
            .map(|(key, value)| (key, value.map(|v| v.to_string()).unwrap_or_default()))
            .collect(),
    }
}

fn resolve_build(config: BuildConfig) -> BuildSpec {
    match config {
        BuildConfig::Simple(context) => BuildSpec {
            context,
            ..Default::default()
        },
        BuildConfig::Full(full) => BuildSpec {
            context: full
                .context
                .map(|c| c.to_string())
                .unwrap_or_else(|| ".".to_string()),
            dockerfile: full.dockerfile.map(|d| d.to_string()),
            target: full.target.map(|t| t.to_string()),
            args: full.args.map(resolve_key_values).unwrap_or_default(),
            labels: full.labels.map(resolve_key_values).unwrap_or_default(),
        },
    }
}

fn resolve_external(
    external: Option<ExternalConfig>,
    name: Option<String>,
) -> (bool, Option<String>) {
    match external {
        Some(ExternalConfig::Named { name: external_name }) => {
            (true, Some(external_name.to_string()))
        }
        Some(ExternalConfig::Bool(flag)) => (flag, name),
        None => (false, name),
    }
}

fn decode_definition<T: DeserializeOwned + Default>(
    kind: &'static str,
    name: &str,
    value: Value,
) -> Result<T> {
    match value {
        Value::Null => Ok(T::default()),
        Value::Mapping(_) => {
            serde_yaml::from_value(value).map_err(|e| ComposeError::InvalidDefinition {
                kind,
                name: name.to_string(),
                message: e.to_string(),
            })
        }
        other => Err(ComposeError::InvalidDefinition {
            kind,
            name: name.to_string(),
            message: format!("expected a mapping, found {}", kind_of(&other)),
        }),
    }
}

fn normalize_network(name: &str, value: Value) -> Result<NetworkSpec> {
    let config: NetworkConfig = decode_definition("network", name, value)?;
    let (external, name) = resolve_external(config.external, config.name);

    Ok(NetworkSpec {
        driver: config.driver,
        driver_opts: config.driver_opts.map(resolve_key_values).unwrap_or_default(),
        external,
        name,
        internal: config.internal.unwrap_or(false),
        attachable: config.attachable.unwrap_or(false),
        enable_ipv6: config.enable_ipv6.unwrap_or(false),
        labels: config.labels.map(resolve_key_values).unwrap_or_default(),
        ipam: config.ipam,
    })
}

fn normalize_volume(name: &str, value: Value) -> Result<VolumeSpec> {
    let config: VolumeConfig = decode_definition("volume", name, value)?;
    let (external, name) = resolve_external(config.external, config.name);

    Ok(VolumeSpec {
        driver: config.driver,
        driver_opts: config.driver_opts.map(resolve_key_values).unwrap_or_default(),
        external,
        name,
        labels: config.labels.map(resolve_key_values).unwrap_or_default(),
    })
}

/// Every `depends_on` key must name a declared service
fn check_dependencies(services: &BTreeMap<String, ServiceSpec>) -> Result<()> {
    for (name, service) in services {
        if let Some(missing) = service.dependencies().find(|dep| !services.contains_key(*dep)) {
            return Err(ComposeError::UndefinedDependency {
                service: name.clone(),
                dependency: missing.to_string(),
            });
        }
    }
    Ok(())
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
