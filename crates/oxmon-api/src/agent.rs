//! Read-only view of the agent running on this host.

use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use oxmon_common::types::{AgentConfig, Instance, InstanceKind, InstanceMap};
use reqwest::StatusCode;

pub struct LocalAgent {
    api: ApiClient,
    addr: String,
}

/// Instances the local agent knows, grouped by subsystem.
#[derive(Debug, Clone, Default)]
pub struct LocalInstances(pub InstanceMap);

impl LocalInstances {
    pub fn of_kind(&self, kind: InstanceKind) -> &[Instance] {
        self.0.get(kind.as_str()).map(Vec::as_slice).unwrap_or_default()
    }

    /// The host's OS instance. There must be exactly one.
    pub fn single_os(&self) -> Result<&Instance> {
        match self.of_kind(InstanceKind::Os) {
            [os] => Ok(os),
            others => Err(AdminError::OsInstanceCount { count: others.len() }),
        }
    }

    /// The instance of `kind` called `name`, if any.
    pub fn find(&self, kind: InstanceKind, name: &str) -> Result<Option<&Instance>> {
        let mut matches = self.of_kind(kind).iter().filter(|i| i.name == name);
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            return Err(AdminError::Ambiguous {
                kind,
                name: name.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }
}

impl LocalAgent {
    pub fn new(api: ApiClient, addr: &str) -> Self {
        Self {
            api,
            addr: addr.to_string(),
        }
    }

    pub async fn id(&self) -> Result<String> {
        let resp = self.get_ok(&["id"]).await?;
        Ok(resp.text())
    }

    pub async fn instances(&self) -> Result<LocalInstances> {
        let resp = self.get_ok(&["instances"]).await?;
        Ok(LocalInstances(resp.json()?))
    }

    /// Tool configs the agent is running; a `qan` config means queries are
    /// being collected for its UUID.
    pub async fn configs(&self) -> Result<Vec<AgentConfig>> {
        let resp = self.get_ok(&["configs"]).await?;
        Ok(resp.json()?)
    }

    async fn get_ok(&self, paths: &[&str]) -> Result<crate::transport::ApiResponse> {
        let url = ApiClient::url(&self.addr, paths);
        let resp = self.api.get(&url).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("GET", &url, resp.status.as_u16(), 200, &resp.body));
        }
        Ok(resp)
    }
}
