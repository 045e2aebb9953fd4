use crate::types::InstanceKind;

/// Query-analytics API on the monitoring server.
pub const QAN_API_PORT: u16 = 9001;
/// Host-list registry (Prometheus config API) on the monitoring server.
pub const HOST_LIST_REGISTRY_PORT: u16 = 9003;
/// Catalog registry (Consul HTTP API) on the monitoring server.
pub const CATALOG_REGISTRY_PORT: u16 = 8500;
/// Agent API on this host.
pub const AGENT_API_PORT: u16 = 9000;
/// Exporter process manager on this host.
pub const METRICS_API_PORT: u16 = 9002;

pub const NODE_EXPORTER_PORT: u16 = 9100;
pub const MYSQLD_EXPORTER_PORTS: [u16; 3] = [9104, 9105, 9106];
pub const MONGODB_EXPORTER_PORT: u16 = 9216;

pub const MYSQL_DEFAULT_PORT: u16 = 3306;
pub const MONGODB_DEFAULT_PORT: u16 = 27017;

/// Port the registry scrapes for an instance kind. For MySQL this is the
/// high-resolution exporter.
pub fn scrape_port(kind: InstanceKind) -> u16 {
    match kind {
        InstanceKind::Os => NODE_EXPORTER_PORT,
        InstanceKind::Mysql => MYSQLD_EXPORTER_PORTS[0],
        InstanceKind::Mongodb => MONGODB_EXPORTER_PORT,
    }
}
