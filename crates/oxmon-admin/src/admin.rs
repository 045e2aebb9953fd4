//! Instance lifecycle across the exporter process manager, the
//! query-analytics API and the service registry.
//!
//! None of the three backends share a transaction, so every operation is an
//! ordered sequence of calls that stops at the first failure. Steps already
//! done are left as they are; running the same command again converges
//! because each step tolerates its own earlier success.

use crate::config::LocalConfig;
use crate::list;
use oxmon_api::agent::LocalAgent;
use oxmon_api::error::{AdminError, Result};
use oxmon_api::exporter::profiles::{self, MONGODB_EXPORTER, MYSQLD_EXPORTER, NODE_EXPORTER};
use oxmon_api::exporter::ExporterManager;
use oxmon_api::qan::QanClient;
use oxmon_api::registry::{build_registry, ServiceRegistry};
use oxmon_api::{ApiClient, Endpoints};
use oxmon_common::ports::{MONGODB_DEFAULT_PORT, MONGODB_EXPORTER_PORT, MYSQLD_EXPORTER_PORTS, NODE_EXPORTER_PORT};
use oxmon_common::types::{CollectFrom, Instance, InstanceKind, InstanceStatus, RegistryEntry};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A MySQL server ready to be added: connection already verified.
#[derive(Debug, Clone)]
pub struct MySqlInstance {
    pub name: String,
    /// Driver DSN of the agent account, password included.
    pub dsn: String,
    pub distro: String,
    pub version: String,
    pub collect_from: CollectFrom,
    pub start: bool,
}

#[derive(Debug, Clone)]
pub struct MongoDbInstance {
    /// Defaults to the OS instance name, plus the port when it is not 27017.
    pub name: Option<String>,
    pub uri: String,
    pub replset: Option<String>,
    pub cluster: Option<String>,
    pub start: bool,
}

pub struct Admin {
    config: LocalConfig,
    config_path: PathBuf,
    api: ApiClient,
    endpoints: Endpoints,
    registry: Box<dyn ServiceRegistry>,
    exporters: ExporterManager,
    qan: QanClient,
    agent: LocalAgent,
}

impl Admin {
    /// Builds the orchestrator for the server named in `config`.
    pub fn new(config: LocalConfig, config_path: &Path) -> Result<Self> {
        let endpoints = config.endpoints()?;
        let api = ApiClient::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_parts(config, config_path, api, endpoints))
    }

    pub fn with_parts(config: LocalConfig, config_path: &Path, api: ApiClient, endpoints: Endpoints) -> Self {
        let registry = build_registry(config.registry, api.clone(), &endpoints);
        tracing::debug!(
            registry = registry.name(),
            qan = %endpoints.qan_api,
            registry_addr = %endpoints.registry,
            "Backends"
        );
        Self {
            exporters: ExporterManager::new(api.clone(), &endpoints.metrics_api),
            qan: QanClient::new(api.clone(), &endpoints.qan_api),
            agent: LocalAgent::new(api.clone(), &endpoints.agent_api),
            registry,
            config,
            config_path: config_path.to_path_buf(),
            api,
            endpoints,
        }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Hostname of this machine as reported to the backends.
    pub fn local_hostname(&self) -> &str {
        self.api.hostname()
    }

    /// The OS instance recorded for this host.
    pub async fn os(&self) -> Result<Instance> {
        self.config.require_client()?;
        if self.config.client_uuid.is_empty() {
            return Err(AdminError::OsNotSet);
        }
        let uuid = &self.config.client_uuid;
        match self.qan.get_instance(uuid).await? {
            Some(os) => Ok(os),
            None => {
                let url = ApiClient::url(&self.endpoints.qan_api, &["instances", uuid]);
                Err(AdminError::unexpected("GET", &url, 404, 200, b""))
            }
        }
    }

    /// Checks that the query-analytics API and the registry answer.
    pub async fn ping(&self) -> Result<()> {
        self.config.require_client()?;
        self.api
            .ping(&ApiClient::url(&self.endpoints.qan_api, &["ping"]))
            .await?;
        self.api.ping(&self.registry.health_url()).await?;
        Ok(())
    }

    /// Adds this host's OS at `address`, which becomes the client address.
    ///
    /// The config is written only after every remote step succeeded, so a
    /// [`AdminError::HostConflict`] leaves it untouched.
    pub async fn add_os(&mut self, address: &str, start: bool) -> Result<Instance> {
        let instances = self.agent.instances().await?;
        let os = instances.single_os()?.clone();

        if start {
            self.exporters.start(&profiles::node_exporter(&os.name)).await?;
            self.registry
                .register(&RegistryEntry {
                    name: os.name.clone(),
                    address: address.to_string(),
                    kind: InstanceKind::Os,
                    tags: Vec::new(),
                })
                .await?;
        }

        self.config.client_address = address.to_string();
        self.config.client_uuid = os.uuid.clone();
        self.save_config()?;
        tracing::info!(name = %os.name, address = %address, uuid = %os.uuid, "OS added");
        Ok(os)
    }

    pub async fn remove_os(&self, name: &str) -> Result<()> {
        self.config.require_client()?;
        self.registry.deregister(name, InstanceKind::Os).await?;
        self.exporters.stop(NODE_EXPORTER, NODE_EXPORTER_PORT).await?;
        Ok(())
    }

    /// Adds a MySQL instance and, when `mysql.start` is set, starts its
    /// exporters, registers it and (re)starts query collection.
    ///
    /// Returns the instance as the query-analytics API holds it.
    pub async fn add_mysql(&self, mysql: &MySqlInstance) -> Result<Instance> {
        let client_address = self.require_os_client()?;
        let instances = self.agent.instances().await?;
        let os = instances.single_os()?;

        let descriptor = Instance {
            subsystem: InstanceKind::Mysql.to_string(),
            uuid: new_instance_uuid(),
            parent_uuid: os.uuid.clone(),
            name: mysql.name.clone(),
            dsn: mysql.dsn.clone(),
            distro: mysql.distro.clone(),
            version: mysql.version.clone(),
        };
        let instance = self.qan.ensure_instance(&descriptor).await?;
        if !mysql.start {
            return Ok(instance);
        }

        for exporter in profiles::mysqld_exporters(client_address, &instance.uuid) {
            self.exporters.start(&exporter).await?;
        }
        self.registry
            .register(&RegistryEntry {
                name: mysql.name.clone(),
                address: client_address.to_string(),
                kind: InstanceKind::Mysql,
                tags: Vec::new(),
            })
            .await?;

        let agent_id = self.agent.id().await?;
        // No job may exist yet, so a refused stop is expected.
        match self.qan.stop_collection(&agent_id, &instance.uuid).await {
            Ok(()) => {}
            Err(err @ AdminError::UnexpectedStatus { .. }) => {
                tracing::warn!(uuid = %instance.uuid, error = %err, "StopTool before StartTool failed");
            }
            Err(err) => return Err(err),
        }
        self.qan
            .start_collection(&agent_id, &instance.uuid, mysql.collect_from)
            .await?;

        tracing::info!(name = %instance.name, uuid = %instance.uuid, "MySQL added");
        Ok(instance)
    }

    pub async fn remove_mysql(&self, name: &str) -> Result<()> {
        self.config.require_client()?;
        self.registry.deregister(name, InstanceKind::Mysql).await?;
        self.exporters.stop_all(MYSQLD_EXPORTER, &MYSQLD_EXPORTER_PORTS).await?;

        let instances = self.agent.instances().await?;
        let Some(instance) = instances.find(InstanceKind::Mysql, name)? else {
            tracing::warn!(name = %name, "Local agent has no such MySQL instance, not stopping queries");
            return Ok(());
        };

        let agent_id = self.agent.id().await?;
        self.qan.stop_collection(&agent_id, &instance.uuid).await?;
        tracing::info!(name = %name, uuid = %instance.uuid, "MySQL removed");
        Ok(())
    }

    pub async fn add_mongodb(&self, mongo: &MongoDbInstance) -> Result<Instance> {
        let client_address = self.require_os_client()?;
        let instances = self.agent.instances().await?;
        let os = instances.single_os()?;

        let name = match &mongo.name {
            Some(name) => name.clone(),
            None => mongodb_instance_name(&os.name, mongodb_port(&mongo.uri)),
        };
        let descriptor = Instance {
            subsystem: InstanceKind::Mongodb.to_string(),
            uuid: new_instance_uuid(),
            parent_uuid: os.uuid.clone(),
            name: name.clone(),
            dsn: mongo.uri.clone(),
            ..Default::default()
        };
        let instance = self.qan.ensure_instance(&descriptor).await?;
        if !mongo.start {
            return Ok(instance);
        }

        let exporter = profiles::mongodb_exporter(&name, client_address, &mongo.uri);
        self.exporters.start(&exporter).await?;

        let mut tags = Vec::new();
        if let Some(replset) = &mongo.replset {
            tags.push(format!("replset:{replset}"));
        }
        if let Some(cluster) = &mongo.cluster {
            tags.push(format!("cluster:{cluster}"));
        }
        self.registry
            .register(&RegistryEntry {
                name: name.clone(),
                address: client_address.to_string(),
                kind: InstanceKind::Mongodb,
                tags,
            })
            .await?;

        tracing::info!(name = %name, uuid = %instance.uuid, "MongoDB added");
        Ok(instance)
    }

    pub async fn remove_mongodb(&self, name: &str) -> Result<()> {
        self.config.require_client()?;
        self.registry.deregister(name, InstanceKind::Mongodb).await?;
        self.exporters.stop(MONGODB_EXPORTER, MONGODB_EXPORTER_PORT).await?;
        Ok(())
    }

    /// Status of every instance on this host.
    pub async fn list(&self) -> Result<Vec<InstanceStatus>> {
        let client_address = self.config.require_client()?;
        let entries = self.registry.list().await?;
        let configs = self.agent.configs().await?;
        let instances = self.agent.instances().await?;
        list::reconcile(&entries, &instances, &configs, client_address)
    }

    /// Client address, which only `add os` sets.
    fn require_os_client(&self) -> Result<&str> {
        if self.config.client_address.is_empty() {
            return Err(AdminError::OsNotSet);
        }
        Ok(&self.config.client_address)
    }

    fn save_config(&self) -> Result<()> {
        self.config
            .save(&self.config_path)
            .map_err(|e| AdminError::Config(format!("{e:#}")))
    }
}

/// Proposed id for a new instance; the server's copy is authoritative.
fn new_instance_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn mongodb_instance_name(os_name: &str, port: u16) -> String {
    if port == MONGODB_DEFAULT_PORT {
        os_name.to_string()
    } else {
        format!("{os_name}:{port}")
    }
}

/// Port of the first host in a `mongodb://` URI.
pub fn mongodb_port(uri: &str) -> u16 {
    let rest = uri.strip_prefix("mongodb://").unwrap_or(uri);
    let hosts = rest.split(['/', '?']).next().unwrap_or_default();
    let hosts = hosts.rsplit_once('@').map_or(hosts, |(_, h)| h);
    let first = hosts.split(',').next().unwrap_or_default();
    first
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or(MONGODB_DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mongodb_port_reads_first_host() {
        assert_eq!(mongodb_port("mongodb://localhost:27017"), 27017);
        assert_eq!(mongodb_port("mongodb://user:p:w@db1:27018/admin"), 27018);
        assert_eq!(mongodb_port("mongodb://db1:27019,db2:27020/?replicaSet=rs0"), 27019);
        assert_eq!(mongodb_port("mongodb://db1"), 27017);
    }

    #[test]
    fn mongodb_name_carries_non_default_port() {
        assert_eq!(mongodb_instance_name("db1", 27017), "db1");
        assert_eq!(mongodb_instance_name("db1", 27018), "db1:27018");
    }
}
