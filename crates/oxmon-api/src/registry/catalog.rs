use super::{resolve_existing, Deregistration, Registration, ServiceRegistry};
use crate::error::{AdminError, Result};
use crate::transport::ApiClient;
use async_trait::async_trait;
use oxmon_common::ports;
use oxmon_common::types::{InstanceKind, RegistryEntry};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Consul catalog registry. A host is a catalog node; each monitored kind on
/// it is a service whose ID and name are the kind.
pub struct CatalogRegistry {
    api: ApiClient,
    addr: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "Node")]
    node: &'a str,
    #[serde(rename = "Address")]
    address: &'a str,
    #[serde(rename = "Service")]
    service: CatalogService,
}

#[derive(Debug, Serialize)]
struct DeregisterRequest<'a> {
    #[serde(rename = "Node")]
    node: &'a str,
    #[serde(rename = "ServiceID")]
    service_id: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Service")]
    service: String,
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
    #[serde(rename = "Port", default)]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct NodeSummary {
    #[serde(rename = "Node")]
    node: String,
    #[serde(rename = "Address")]
    address: String,
}

#[derive(Debug, Deserialize)]
struct NodeServices {
    #[serde(rename = "Node")]
    node: NodeSummary,
    #[serde(rename = "Services", default)]
    services: Option<HashMap<String, CatalogService>>,
}

impl NodeServices {
    fn entries(self) -> Vec<RegistryEntry> {
        let NodeServices { node, services } = self;
        services
            .unwrap_or_default()
            .into_values()
            .filter_map(|svc| {
                let kind = svc.service.parse::<InstanceKind>().ok()?;
                Some(RegistryEntry {
                    name: node.node.clone(),
                    address: node.address.clone(),
                    kind,
                    tags: svc.tags.unwrap_or_default(),
                })
            })
            .collect()
    }
}

impl CatalogRegistry {
    pub fn new(api: ApiClient, addr: &str) -> Self {
        Self {
            api,
            addr: addr.to_string(),
        }
    }

    /// `GET /v1/catalog/node/{name}`; Consul answers `null` for unknown nodes.
    async fn node(&self, name: &str) -> Result<Option<NodeServices>> {
        let url = ApiClient::url(&self.addr, &["v1", "catalog", "node", name]);
        let resp = self.api.get(&url).await?;
        match resp.status {
            StatusCode::OK => resp.json(),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(AdminError::unexpected("GET", &url, status.as_u16(), 200, &resp.body)),
        }
    }

    async fn put(&self, url: &str, body: &impl Serialize) -> Result<()> {
        let resp = self.api.put_json(url, body).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("PUT", url, resp.status.as_u16(), 200, &resp.body));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for CatalogRegistry {
    fn name(&self) -> &str {
        "catalog"
    }

    fn health_url(&self) -> String {
        ApiClient::url(&self.addr, &["v1", "status", "leader"])
    }

    async fn register(&self, entry: &RegistryEntry) -> Result<Registration> {
        // The catalog upserts silently, so conflicts are found up front.
        let mut outcome = Registration::Created;
        if let Some(node) = self.node(&entry.name).await? {
            let existing = RegistryEntry {
                name: node.node.node.clone(),
                address: node.node.address.clone(),
                kind: entry.kind,
                tags: Vec::new(),
            };
            let has_service = node
                .services
                .as_ref()
                .is_some_and(|s| s.contains_key(entry.kind.as_str()));
            if existing.address != entry.address || has_service {
                outcome = resolve_existing(entry, &existing)?;
            }
        }

        let url = ApiClient::url(&self.addr, &["v1", "catalog", "register"]);
        let request = RegisterRequest {
            node: &entry.name,
            address: &entry.address,
            service: CatalogService {
                id: entry.kind.as_str().to_string(),
                service: entry.kind.as_str().to_string(),
                tags: Some(entry.tags.clone()),
                port: ports::scrape_port(entry.kind),
            },
        };
        self.put(&url, &request).await?;

        if outcome == Registration::Created {
            tracing::info!(
                node = %entry.name,
                kind = %entry.kind,
                address = %entry.address,
                "Service registered in catalog"
            );
        }
        Ok(outcome)
    }

    async fn deregister(&self, name: &str, kind: InstanceKind) -> Result<Deregistration> {
        if self.lookup(name, kind).await?.is_none() {
            tracing::warn!(node = %name, kind = %kind, "Service not in catalog, nothing to remove");
            return Ok(Deregistration::NotFound);
        }

        let url = ApiClient::url(&self.addr, &["v1", "catalog", "deregister"]);
        let request = DeregisterRequest {
            node: name,
            service_id: kind.as_str(),
        };
        self.put(&url, &request).await?;
        tracing::info!(node = %name, kind = %kind, "Service removed from catalog");
        Ok(Deregistration::Removed)
    }

    async fn lookup(&self, name: &str, kind: InstanceKind) -> Result<Option<RegistryEntry>> {
        Ok(self
            .node(name)
            .await?
            .map(NodeServices::entries)
            .and_then(|entries| entries.into_iter().find(|e| e.kind == kind)))
    }

    async fn list(&self) -> Result<Vec<RegistryEntry>> {
        let url = ApiClient::url(&self.addr, &["v1", "catalog", "nodes"]);
        let resp = self.api.get(&url).await?;
        if resp.status != StatusCode::OK {
            return Err(AdminError::unexpected("GET", &url, resp.status.as_u16(), 200, &resp.body));
        }

        let nodes: Vec<NodeSummary> = resp.json()?;
        let mut entries = Vec::new();
        for summary in nodes {
            if let Some(node) = self.node(&summary.node).await? {
                entries.extend(node.entries());
            }
        }
        Ok(entries)
    }
}
