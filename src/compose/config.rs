//! Raw compose document and the loosely-typed shapes its fields may take
//!
//! Compose authors can write most fields in more than one style: a command as
//! a string or a list, environment as a mapping or `KEY=VALUE` entries, and so
//! on. Each such field is represented here as a small untagged enum. The
//! normalizer resolves every one of them into a single canonical shape.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A compose document as decoded from text, before normalization
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDocument {
    /// Project name
    #[serde(default, deserialize_with = "optional_scalar")]
    pub name: Option<String>,
    /// Service definitions, kept dynamic until normalization
    #[serde(default, deserialize_with = "null_as_empty")]
    pub services: BTreeMap<String, serde_yaml::Value>,
    /// Network definitions
    #[serde(default, deserialize_with = "null_as_empty")]
    pub networks: BTreeMap<String, serde_yaml::Value>,
    /// Volume definitions
    #[serde(default, deserialize_with = "null_as_empty")]
    pub volumes: BTreeMap<String, serde_yaml::Value>,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, serde_yaml::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, serde_yaml::Value>>::deserialize(deserializer)
        .map(Option::unwrap_or_default)
}

/// Optional scalar stringified, so `name: 2024` reads as `"2024"`
fn optional_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ScalarValue>::deserialize(deserializer).map(|v| v.map(|s| s.to_string()))
}

fn optional_scalar_list<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<ScalarValue>>::deserialize(deserializer)
        .map(|v| v.map(|items| items.iter().map(ToString::to_string).collect()))
}

/// A YAML scalar that is coerced to text where a string is expected
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer beyond `i64`
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::UInt(u) => write!(f, "{}", u),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BuildConfig {
    /// Simple context path
    Simple(String),
    /// Full build configuration
    Full(BuildConfigFull),
}

/// Full build configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfigFull {
    /// Build context
    pub context: Option<ScalarValue>,
    /// Dockerfile path
    pub dockerfile: Option<ScalarValue>,
    /// Target stage
    pub target: Option<ScalarValue>,
    /// Build arguments
    #[serde(default)]
    pub args: Option<KeyValueConfig>,
    /// Labels
    #[serde(default)]
    pub labels: Option<KeyValueConfig>,
}

/// Command or entrypoint
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    /// Shell-style string, split on whitespace
    Shell(String),
    /// Exec form array
    Exec(Vec<ScalarValue>),
}

/// Environment configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    /// Array of `KEY=value` or bare `KEY` entries
    Array(Vec<ScalarValue>),
    /// Map of key to value; a missing value inherits from the environment
    Map(BTreeMap<String, Option<ScalarValue>>),
}

/// Env file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvFileConfig {
    /// Single file
    Single(String),
    /// Multiple files
    Multiple(Vec<EnvFileEntry>),
}

/// One entry of an env file list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvFileEntry {
    /// Plain path
    Path(ScalarValue),
    /// Object form
    Detailed {
        /// File path
        path: Option<String>,
        /// Whether the file must exist
        #[serde(default)]
        required: Option<bool>,
    },
}

/// A value that may be a single scalar or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    /// Single value
    Single(ScalarValue),
    /// List of values
    List(Vec<ScalarValue>),
}

/// Labels, build args and similar string maps
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyValueConfig {
    /// Array of `KEY=value` strings
    Array(Vec<ScalarValue>),
    /// Map of key to value
    Map(BTreeMap<String, Option<ScalarValue>>),
}

/// Service networks configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetworksConfig {
    /// Array of network names
    Array(Vec<String>),
    /// Map of network name to attachment config
    Map(BTreeMap<String, Option<ServiceNetworkConfig>>),
}

/// Per-network attachment options of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNetworkConfig {
    /// Aliases
    #[serde(
        default,
        deserialize_with = "optional_scalar_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub aliases: Option<Vec<String>>,
    /// IPv4 address
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub ipv4_address: Option<String>,
    /// IPv6 address
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub ipv6_address: Option<String>,
    /// Priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Depends on configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependsOnConfig {
    /// Array of service names
    Array(Vec<String>),
    /// Map of service to condition; values are read leniently
    Map(BTreeMap<String, serde_yaml::Value>),
}

/// Healthcheck configuration, durations stringified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Healthcheck {
    /// Test command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<HealthcheckTest>,
    /// Interval
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<String>,
    /// Timeout
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<String>,
    /// Start period
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_period: Option<String>,
    /// Retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Disable healthcheck
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
}

/// Healthcheck test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HealthcheckTest {
    /// Command string
    Command(String),
    /// Command array
    Array(Vec<String>),
}

impl<'de> Deserialize<'de> for HealthcheckTest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match StringOrList::deserialize(deserializer)? {
            StringOrList::Single(command) => HealthcheckTest::Command(command.to_string()),
            StringOrList::List(items) => {
                HealthcheckTest::Array(items.iter().map(ToString::to_string).collect())
            }
        })
    }
}

/// Top-level network definition
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// Driver
    #[serde(default, deserialize_with = "optional_scalar")]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: Option<KeyValueConfig>,
    /// IPAM configuration
    pub ipam: Option<IpamConfig>,
    /// External network
    pub external: Option<ExternalConfig>,
    /// Internal network
    pub internal: Option<bool>,
    /// Attachable
    pub attachable: Option<bool>,
    /// Labels
    #[serde(default)]
    pub labels: Option<KeyValueConfig>,
    /// Enable IPv6
    pub enable_ipv6: Option<bool>,
    /// Name
    #[serde(default, deserialize_with = "optional_scalar")]
    pub name: Option<String>,
}

/// IPAM configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamConfig {
    /// Driver
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub driver: Option<String>,
    /// Address pools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<IpamPoolConfig>,
}

/// IPAM pool configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamPoolConfig {
    /// Subnet
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub subnet: Option<String>,
    /// IP range
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip_range: Option<String>,
    /// Gateway
    #[serde(
        default,
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub gateway: Option<String>,
}

/// Top-level volume definition
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeConfig {
    /// Driver
    #[serde(default, deserialize_with = "optional_scalar")]
    pub driver: Option<String>,
    /// Driver options
    #[serde(default)]
    pub driver_opts: Option<KeyValueConfig>,
    /// External volume
    pub external: Option<ExternalConfig>,
    /// Labels
    #[serde(default)]
    pub labels: Option<KeyValueConfig>,
    /// Name
    #[serde(default, deserialize_with = "optional_scalar")]
    pub name: Option<String>,
}

/// External resource configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExternalConfig {
    /// Boolean
    Bool(bool),
    /// With name
    Named { name: ScalarValue },
}
