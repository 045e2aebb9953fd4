//! Query-analytics API: instance resources and agent commands.

use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use oxmon_common::types::{Cmd, CollectFrom, Instance, QanStartConfig};
use reqwest::StatusCode;

const QAN_SERVICE: &str = "qan";
const START_TOOL: &str = "StartTool";
const STOP_TOOL: &str = "StopTool";

pub struct QanClient {
    api: ApiClient,
    addr: String,
}

impl QanClient {
    pub fn new(api: ApiClient, addr: &str) -> Self {
        Self {
            api,
            addr: addr.to_string(),
        }
    }

    /// Creates `instance`, or adopts the one the server already holds for
    /// the same identity. Either way the returned instance is the server's
    /// copy, so its UUID is the one every later step must use.
    pub async fn ensure_instance(&self, instance: &Instance) -> Result<Instance> {
        let url = ApiClient::url(&self.addr, &["instances"]);
        let resp = self.api.post_json(&url, instance).await?;
        match resp.status {
            StatusCode::CREATED | StatusCode::CONFLICT => {}
            status => return Err(AdminError::unexpected("POST", &url, status.as_u16(), 201, &resp.body)),
        }
        let conflict = resp.status == StatusCode::CONFLICT;

        let location = resp.location.ok_or_else(|| AdminError::MissingLocation { url: url.clone() })?;
        let location = if location.starts_with("http") {
            location
        } else {
            ApiClient::url(&self.addr, &[location.as_str()])
        };

        let resp = self.api.get(&location).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("GET", &location, resp.status.as_u16(), 200, &resp.body));
        }
        let created: Instance = resp.json()?;

        if conflict {
            tracing::info!(
                name = %created.name,
                subsystem = %created.subsystem,
                uuid = %created.uuid,
                "Instance already exists, reusing it"
            );
        } else {
            tracing::info!(name = %created.name, uuid = %created.uuid, "Instance created");
        }
        Ok(created)
    }

    pub async fn get_instance(&self, uuid: &str) -> Result<Option<Instance>> {
        let url = ApiClient::url(&self.addr, &["instances", uuid]);
        let resp = self.api.get(&url).await?;
        match resp.status {
            StatusCode::OK => Ok(Some(resp.json()?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(AdminError::unexpected("GET", &url, status.as_u16(), 200, &resp.body)),
        }
    }

    /// Tells agent `agent_id` to start collecting queries for `instance_uuid`.
    pub async fn start_collection(&self, agent_id: &str, instance_uuid: &str, collect_from: CollectFrom) -> Result<()> {
        let config = QanStartConfig {
            uuid: instance_uuid.to_string(),
            collect_from,
        };
        let payload = serde_json::to_vec(&config)?;
        self.send_cmd(agent_id, START_TOOL, &payload).await?;
        tracing::info!(agent = %agent_id, uuid = %instance_uuid, source = %collect_from, "Query collection started");
        Ok(())
    }

    /// Tells agent `agent_id` to stop collecting queries for `instance_uuid`.
    pub async fn stop_collection(&self, agent_id: &str, instance_uuid: &str) -> Result<()> {
        self.send_cmd(agent_id, STOP_TOOL, instance_uuid.as_bytes()).await?;
        tracing::info!(agent = %agent_id, uuid = %instance_uuid, "Query collection stopped");
        Ok(())
    }

    async fn send_cmd(&self, agent_id: &str, cmd: &str, payload: &[u8]) -> Result<()> {
        let user = format!("oxmon-admin@{}", self.api.hostname());
        let cmd = Cmd::new(&user, QAN_SERVICE, cmd, payload);
        let url = ApiClient::url(&self.addr, &["agents", agent_id, "cmd"]);
        let resp = self.api.put_json(&url, &cmd).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("PUT", &url, resp.status.as_u16(), 200, &resp.body));
        }
        Ok(())
    }
}
