//! Exporter start requests for each instance kind.
//!
//! A MySQL server is scraped by three `mysqld_exporter` processes at
//! different resolutions: cheap counters every scrape, expensive
//! information_schema and performance_schema tables only at low resolution.

use oxmon_common::ports::{MONGODB_EXPORTER_PORT, MYSQLD_EXPORTER_PORTS, NODE_EXPORTER_PORT};
use oxmon_common::types::Exporter;

pub const NODE_EXPORTER: &str = "node_exporter";
pub const MYSQLD_EXPORTER: &str = "mysqld_exporter";
pub const MONGODB_EXPORTER: &str = "mongodb_exporter";

const NODE_COLLECTORS: &str = "diskstats,filesystem,loadavg,meminfo,netdev,netstat,stat,time,uname,vmstat";

/// `-collect.*` switches, in the order the exporter documents them.
const MYSQL_COLLECTORS: [&str; 15] = [
    "global_status",
    "global_variables",
    "slave_status",
    "info_schema.tables",
    "binlog_size",
    "info_schema.processlist",
    "info_schema.userstats",
    "auto_increment.columns",
    "info_schema.tablestats",
    "perf_schema.file_events",
    "perf_schema.eventsstatements",
    "perf_schema.indexiowaits",
    "perf_schema.tableiowaits",
    "perf_schema.tablelocks",
    "perf_schema.eventswaits",
];

const HIGH_RES: &[&str] = &["global_status"];
const MEDIUM_RES: &[&str] = &[
    "slave_status",
    "info_schema.processlist",
    "perf_schema.file_events",
    "perf_schema.eventswaits",
];
const LOW_RES: &[&str] = &[
    "global_variables",
    "info_schema.tables",
    "info_schema.userstats",
    "auto_increment.columns",
    "info_schema.tablestats",
    "perf_schema.eventsstatements",
    "perf_schema.indexiowaits",
    "perf_schema.tableiowaits",
];

pub fn node_exporter(os_name: &str) -> Exporter {
    Exporter {
        name: NODE_EXPORTER.to_string(),
        alias: format!("{os_name} metrics"),
        port: NODE_EXPORTER_PORT,
        instance_uuid: None,
        args: vec![format!("-collectors.enabled={NODE_COLLECTORS}")],
    }
}

/// High, medium and low resolution exporters for one MySQL instance, in
/// start order.
pub fn mysqld_exporters(client_address: &str, instance_uuid: &str) -> [Exporter; 3] {
    let [high, medium, low] = MYSQLD_EXPORTER_PORTS;
    [
        mysqld_exporter("high res", high, client_address, instance_uuid, HIGH_RES),
        mysqld_exporter("medium res", medium, client_address, instance_uuid, MEDIUM_RES),
        mysqld_exporter("low res", low, client_address, instance_uuid, LOW_RES),
    ]
}

fn mysqld_exporter(alias: &str, port: u16, client_address: &str, instance_uuid: &str, enabled: &[&str]) -> Exporter {
    let mut args = vec![format!("-web.listen-address={client_address}:{port}")];
    args.extend(
        MYSQL_COLLECTORS
            .iter()
            .map(|c| format!("-collect.{c}={}", enabled.contains(c))),
    );
    Exporter {
        name: MYSQLD_EXPORTER.to_string(),
        alias: alias.to_string(),
        port,
        instance_uuid: Some(instance_uuid.to_string()),
        args,
    }
}

pub fn mongodb_exporter(name: &str, client_address: &str, uri: &str) -> Exporter {
    Exporter {
        name: MONGODB_EXPORTER.to_string(),
        alias: format!("{name} metrics"),
        port: MONGODB_EXPORTER_PORT,
        instance_uuid: None,
        args: vec![
            format!("-web.listen-address={client_address}:{MONGODB_EXPORTER_PORT}"),
            format!("-mongodb.uri={uri}"),
        ],
    }
}
