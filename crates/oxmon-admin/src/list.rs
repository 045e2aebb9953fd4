//! Consolidated status of the instances on this host.
//!
//! Nothing links a registry entry to an agent instance except the name, so
//! the view is an outer join on `(kind, name)`: every entry from either
//! side yields a row, with the capability the other side would have
//! provided marked absent.

use oxmon_api::agent::LocalInstances;
use oxmon_api::error::{AdminError, Result};
use oxmon_common::types::{AgentConfig, InstanceKind, InstanceStatus, RegistryEntry};
use std::collections::BTreeMap;

const QAN_SERVICE: &str = "qan";

/// Joins registry entries at `client_address` with the agent's instances.
/// Rows come out ordered by kind, then name.
pub fn reconcile(
    entries: &[RegistryEntry],
    instances: &LocalInstances,
    configs: &[AgentConfig],
    client_address: &str,
) -> Result<Vec<InstanceStatus>> {
    let local: Vec<&RegistryEntry> = entries.iter().filter(|e| e.address == client_address).collect();

    let os_entries: Vec<&&RegistryEntry> = local.iter().filter(|e| e.kind == InstanceKind::Os).collect();
    if os_entries.len() > 1 {
        return Err(AdminError::Ambiguous {
            kind: InstanceKind::Os,
            name: client_address.to_string(),
            count: os_entries.len(),
        });
    }

    let mut rows: BTreeMap<(InstanceKind, String), InstanceStatus> = BTreeMap::new();
    for entry in local {
        rows.entry((entry.kind, entry.name.clone()))
            .or_insert_with(|| InstanceStatus {
                kind: entry.kind,
                name: entry.name.clone(),
                uuid: None,
                metrics: true,
                queries: false,
            });
    }

    for kind in InstanceKind::ALL {
        for instance in instances.of_kind(kind) {
            // Rejects a second agent instance with this name.
            instances.find(kind, &instance.name)?;

            let queries = configs
                .iter()
                .any(|c| c.service == QAN_SERVICE && c.uuid == instance.uuid);
            let row = rows
                .entry((kind, instance.name.clone()))
                .or_insert_with(|| InstanceStatus {
                    kind,
                    name: instance.name.clone(),
                    uuid: None,
                    metrics: false,
                    queries: false,
                });
            row.uuid = Some(instance.uuid.clone());
            row.queries = queries;
        }
    }

    Ok(rows.into_values().collect())
}
