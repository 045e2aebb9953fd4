use super::{resolve_existing, Deregistration, Registration, ServiceRegistry};
use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use async_trait::async_trait;
use oxmon_common::types::{Host, InstanceKind, RegistryEntry};
use reqwest::StatusCode;
use std::collections::HashMap;

/// Prometheus host-list registry: `GET/POST/DELETE /hosts/{kind}[/{name}]`.
pub struct HostListRegistry {
    api: ApiClient,
    addr: String,
}

impl HostListRegistry {
    pub fn new(api: ApiClient, addr: &str) -> Self {
        Self {
            api,
            addr: addr.to_string(),
        }
    }

    fn entry(host: Host, kind: InstanceKind) -> RegistryEntry {
        RegistryEntry {
            name: host.alias,
            address: host.address,
            kind,
            tags: Vec::new(),
        }
    }
}

#[async_trait]
impl ServiceRegistry for HostListRegistry {
    fn name(&self) -> &str {
        "host-list"
    }

    fn health_url(&self) -> String {
        ApiClient::url(&self.addr, &["hosts"])
    }

    async fn register(&self, entry: &RegistryEntry) -> Result<Registration> {
        if !entry.tags.is_empty() {
            tracing::debug!(name = %entry.name, tags = ?entry.tags, "Host list registry ignores tags");
        }

        let url = ApiClient::url(&self.addr, &["hosts", entry.kind.as_str()]);
        let host = Host {
            alias: entry.name.clone(),
            address: entry.address.clone(),
        };
        let resp = self.api.post_json(&url, &host).await?;
        match resp.status {
            StatusCode::CREATED => {
                tracing::info!(name = %entry.name, kind = %entry.kind, address = %entry.address, "Host registered");
                Ok(Registration::Created)
            }
            StatusCode::CONFLICT => match self.lookup(&entry.name, entry.kind).await? {
                Some(existing) => resolve_existing(entry, &existing),
                // Conflict reported but nothing to compare with.
                None => Err(AdminError::unexpected("POST", &url, 409, 201, &resp.body)),
            },
            status => Err(AdminError::unexpected("POST", &url, status.as_u16(), 201, &resp.body)),
        }
    }

    async fn deregister(&self, name: &str, kind: InstanceKind) -> Result<Deregistration> {
        let url = ApiClient::url(&self.addr, &["hosts", kind.as_str(), name]);
        let resp = self.api.delete(&url).await?;
        match resp.status {
            StatusCode::OK => {
                tracing::info!(name = %name, kind = %kind, "Host removed from registry");
                Ok(Deregistration::Removed)
            }
            StatusCode::NOT_FOUND => {
                tracing::warn!(name = %name, kind = %kind, "Host not registered, nothing to remove");
                Ok(Deregistration::NotFound)
            }
            status => Err(AdminError::unexpected("DELETE", &url, status.as_u16(), 200, &resp.body)),
        }
    }

    async fn lookup(&self, name: &str, kind: InstanceKind) -> Result<Option<RegistryEntry>> {
        let url = ApiClient::url(&self.addr, &["hosts", kind.as_str(), name]);
        let resp = self.api.get(&url).await?;
        match resp.status {
            StatusCode::OK => Ok(Some(Self::entry(resp.json()?, kind))),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(AdminError::unexpected("GET", &url, status.as_u16(), 200, &resp.body)),
        }
    }

    async fn list(&self) -> Result<Vec<RegistryEntry>> {
        let url = self.health_url();
        let resp = self.api.get(&url).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("GET", &url, resp.status.as_u16(), 200, &resp.body));
        }

        let hosts: HashMap<String, Vec<Host>> = resp.json()?;
        let mut entries = Vec::new();
        for (kind, hosts) in hosts {
            let Ok(kind) = kind.parse::<InstanceKind>() else {
                tracing::debug!(kind = %kind, "Skipping unknown host kind");
                continue;
            };
            entries.extend(hosts.into_iter().map(|h| Self::entry(h, kind)));
        }
        Ok(entries)
    }
}
