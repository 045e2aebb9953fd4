#![allow(dead_code)]

use mockito::{Mock, ServerGuard};
use oxmon_admin::{Admin, LocalConfig};
use oxmon_api::registry::RegistryKind;
use oxmon_api::{ApiClient, Endpoints};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const CLIENT_ADDRESS: &str = "10.0.0.5";
pub const OS_NAME: &str = "db1";
pub const OS_UUID: &str = "os-uuid";
pub const AGENT_ID: &str = "agent-1";

/// Every backend served by one mockito server, plus a config file in a
/// temp dir.
pub struct TestContext {
    pub server: ServerGuard,
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl TestContext {
    pub async fn new() -> Self {
        let server = mockito::Server::new_async().await;
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config_path = temp_dir.path().join("admin.toml");
        Self {
            server,
            temp_dir,
            config_path,
        }
    }

    pub fn admin(&self, config: LocalConfig) -> Admin {
        let api = ApiClient::new(Duration::from_secs(5))
            .expect("client should build")
            .with_hostname(OS_NAME);
        let endpoints = Endpoints::single(&self.server.host_with_port());
        Admin::with_parts(config, &self.config_path, api, endpoints)
    }

    pub fn saved_config(&self) -> LocalConfig {
        LocalConfig::load(&self.config_path).expect("config should load")
    }

    /// `GET /instances` on the local agent.
    pub async fn agent_instances(&mut self, instances: Value) -> Mock {
        self.server
            .mock("GET", "/instances")
            .with_status(200)
            .with_body(instances.to_string())
            .create_async()
            .await
    }

    pub async fn agent_id(&mut self) -> Mock {
        self.server
            .mock("GET", "/id")
            .with_status(200)
            .with_body(AGENT_ID)
            .create_async()
            .await
    }

    /// `POST /instances` answering `status` with a Location, and the GET
    /// that Location points at.
    pub async fn qan_instance(&mut self, status: usize, instance: Value) -> (Mock, Mock) {
        let uuid = instance["UUID"].as_str().unwrap_or_default().to_string();
        let location = format!("/instances/{uuid}");
        let post = self
            .server
            .mock("POST", "/instances")
            .with_status(status)
            .with_header("location", location.as_str())
            .expect(1)
            .create_async()
            .await;
        let get = self
            .server
            .mock("GET", location.as_str())
            .with_status(200)
            .with_body(instance.to_string())
            .create_async()
            .await;
        (post, get)
    }

    /// Any exporter start or stop, expected `hits` times.
    pub async fn exporter_starts(&mut self, hits: usize) -> Mock {
        self.server
            .mock("POST", "/")
            .with_status(201)
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn qan_cmd(&mut self, status: usize, hits: usize) -> Mock {
        self.server
            .mock("PUT", format!("/agents/{AGENT_ID}/cmd").as_str())
            .with_status(status)
            .expect(hits)
            .create_async()
            .await
    }
}

pub fn config() -> LocalConfig {
    LocalConfig {
        client_address: CLIENT_ADDRESS.to_string(),
        client_uuid: OS_UUID.to_string(),
        server_address: "monitor.local".to_string(),
        registry: RegistryKind::HostList,
        timeout_secs: 5,
    }
}

pub fn os_only() -> Value {
    json!({ "os": [{ "Subsystem": "os", "UUID": OS_UUID, "Name": OS_NAME }] })
}

pub fn mysql_instance(uuid: &str, name: &str) -> Value {
    json!({
        "Subsystem": "mysql",
        "UUID": uuid,
        "ParentUUID": OS_UUID,
        "Name": name,
        "DSN": "oxmon:pw@tcp(localhost:3306)/?parseTime=true",
    })
}
