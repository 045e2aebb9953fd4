use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of monitored instance, ordered the way `list` prints them.
///
/// # Examples
///
/// ```
/// use oxmon_common::types::InstanceKind;
///
/// let kind: InstanceKind = "mysql".parse().unwrap();
/// assert_eq!(kind, InstanceKind::Mysql);
/// assert_eq!(kind.to_string(), "mysql");
/// assert!(InstanceKind::Os < InstanceKind::Mongodb);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    Os,
    Mysql,
    Mongodb,
}

impl InstanceKind {
    pub const ALL: [InstanceKind; 3] = [InstanceKind::Os, InstanceKind::Mysql, InstanceKind::Mongodb];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceKind::Os => "os",
            InstanceKind::Mysql => "mysql",
            InstanceKind::Mongodb => "mongodb",
        }
    }
}

impl std::fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "os" => Ok(InstanceKind::Os),
            "mysql" => Ok(InstanceKind::Mysql),
            "mongodb" => Ok(InstanceKind::Mongodb),
            _ => Err(format!("unknown instance kind: {s}")),
        }
    }
}

/// Instance resource as stored by the query-analytics API and reported by
/// the local agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "Subsystem")]
    pub subsystem: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    /// UUID of the OS instance of the host that runs the agent for this instance.
    #[serde(rename = "ParentUUID", default)]
    pub parent_uuid: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "DSN", default)]
    pub dsn: String,
    #[serde(rename = "Distro", default)]
    pub distro: String,
    #[serde(rename = "Version", default)]
    pub version: String,
}

/// Instances known to the local agent, keyed by subsystem (`"os"`, `"mysql"`, ...).
pub type InstanceMap = HashMap<String, Vec<Instance>>;

/// Scrape target in the host-list registry. `alias` is the host name shown
/// in dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "Alias")]
    pub alias: String,
    #[serde(rename = "Address")]
    pub address: String,
}

/// Start request for one exporter process. Identity is `(name, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exporter {
    pub name: String,
    pub alias: String,
    pub port: u16,
    /// Owning instance; the process manager uses it to look up the DSN.
    #[serde(rename = "instanceUUID", default, skip_serializing_if = "Option::is_none")]
    pub instance_uuid: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Command envelope relayed by the query-analytics API to an agent.
///
/// `data` carries the payload bytes base64-encoded.
///
/// # Examples
///
/// ```
/// use oxmon_common::types::Cmd;
///
/// let cmd = Cmd::new("admin@db1", "qan", "StopTool", b"abc");
/// assert_eq!(cmd.data, "YWJj");
/// assert_eq!(cmd.payload().unwrap(), b"abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmd {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Cmd")]
    pub cmd: String,
    #[serde(rename = "Data", default)]
    pub data: String,
}

impl Cmd {
    pub fn new(user: &str, service: &str, cmd: &str, payload: &[u8]) -> Self {
        Self {
            user: user.to_string(),
            service: service.to_string(),
            cmd: cmd.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(payload),
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.data)
    }
}

/// Tool config reported by the local agent (`GET /configs`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
}

/// Payload of a `StartTool` command for the query-analytics tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QanStartConfig {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "CollectFrom")]
    pub collect_from: CollectFrom,
}

/// One registration in the service registry. Identity is `(name, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub address: String,
    pub kind: InstanceKind,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Consolidated status of one monitored instance on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub kind: InstanceKind,
    pub name: String,
    pub uuid: Option<String>,
    /// Registered in the registry, so metrics are scraped.
    pub metrics: bool,
    /// The local agent runs a query-analytics job for it.
    pub queries: bool,
}

/// Where queries are collected from, as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuerySource {
    #[default]
    Auto,
    SlowLog,
    PerfSchema,
}

/// Resolved query source sent to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectFrom {
    #[serde(rename = "slowlog")]
    SlowLog,
    #[serde(rename = "perfschema")]
    PerfSchema,
}

impl QuerySource {
    /// Resolves `Auto`: a server on this very host is read through its slow
    /// log, a remote one through performance_schema.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxmon_common::types::{CollectFrom, QuerySource};
    ///
    /// assert_eq!(QuerySource::Auto.resolve("db1", "db1"), CollectFrom::SlowLog);
    /// assert_eq!(QuerySource::Auto.resolve("db2", "db1"), CollectFrom::PerfSchema);
    /// assert_eq!(QuerySource::PerfSchema.resolve("db1", "db1"), CollectFrom::PerfSchema);
    /// ```
    pub fn resolve(self, server_hostname: &str, local_hostname: &str) -> CollectFrom {
        match self {
            QuerySource::SlowLog => CollectFrom::SlowLog,
            QuerySource::PerfSchema => CollectFrom::PerfSchema,
            QuerySource::Auto if server_hostname == local_hostname => CollectFrom::SlowLog,
            QuerySource::Auto => CollectFrom::PerfSchema,
        }
    }
}

impl std::str::FromStr for QuerySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(QuerySource::Auto),
            "slowlog" => Ok(QuerySource::SlowLog),
            "perfschema" => Ok(QuerySource::PerfSchema),
            _ => Err(format!("invalid query source '{s}', expected auto, slowlog or perfschema")),
        }
    }
}

impl std::fmt::Display for CollectFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectFrom::SlowLog => write!(f, "slowlog"),
            CollectFrom::PerfSchema => write!(f, "perfschema"),
        }
    }
}
