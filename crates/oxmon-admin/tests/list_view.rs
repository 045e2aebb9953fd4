mod common;

use common::*;
use oxmon_admin::LocalConfig;
use oxmon_api::error::AdminError;
use oxmon_api::registry::RegistryKind;
use oxmon_common::types::{InstanceKind, InstanceStatus};
use serde_json::json;

async fn mock_hosts(ctx: &mut TestContext, hosts: serde_json::Value) -> mockito::Mock {
    ctx.server
        .mock("GET", "/hosts")
        .with_status(200)
        .with_body(hosts.to_string())
        .create_async()
        .await
}

async fn mock_configs(ctx: &mut TestContext, configs: serde_json::Value) -> mockito::Mock {
    ctx.server
        .mock("GET", "/configs")
        .with_status(200)
        .with_body(configs.to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn registered_instance_without_collection_is_listed_with_queries_off() {
    let mut ctx = TestContext::new().await;
    let _hosts = mock_hosts(
        &mut ctx,
        json!({
            "os": [{"Alias": OS_NAME, "Address": CLIENT_ADDRESS}],
            "mysql": [{"Alias": "db1", "Address": CLIENT_ADDRESS}],
            "mongodb": [{"Alias": "elsewhere", "Address": "10.0.0.9"}]
        }),
    )
    .await;
    let _configs = mock_configs(&mut ctx, json!([])).await;
    let _instances = ctx.agent_instances(os_only()).await;

    let rows = ctx.admin(config()).list().await.unwrap();

    assert_eq!(
        rows,
        vec![
            InstanceStatus {
                kind: InstanceKind::Os,
                name: OS_NAME.to_string(),
                uuid: Some(OS_UUID.to_string()),
                metrics: true,
                queries: false,
            },
            InstanceStatus {
                kind: InstanceKind::Mysql,
                name: "db1".to_string(),
                uuid: None,
                metrics: true,
                queries: false,
            },
        ]
    );
}

#[tokio::test]
async fn collecting_instance_is_joined_by_name() {
    let mut ctx = TestContext::new().await;
    let _hosts = mock_hosts(
        &mut ctx,
        json!({
            "os": [{"Alias": OS_NAME, "Address": CLIENT_ADDRESS}],
            "mysql": [{"Alias": "db1", "Address": CLIENT_ADDRESS}]
        }),
    )
    .await;
    let _configs = mock_configs(
        &mut ctx,
        json!([{"Service": "qan", "UUID": "my-uuid"}, {"Service": "agent", "UUID": "x"}]),
    )
    .await;
    let mut instances = os_only();
    instances["mysql"] = json!([mysql_instance("my-uuid", "db1"), mysql_instance("other-uuid", "db2")]);
    let _instances = ctx.agent_instances(instances).await;

    let rows = ctx.admin(config()).list().await.unwrap();

    assert_eq!(rows.len(), 3);
    let db1 = &rows[1];
    assert_eq!(db1.name, "db1");
    assert_eq!(db1.uuid.as_deref(), Some("my-uuid"));
    assert!(db1.metrics && db1.queries);

    let db2 = &rows[2];
    assert_eq!(db2.name, "db2");
    assert!(!db2.metrics);
    assert!(!db2.queries);
}

#[tokio::test]
async fn two_os_entries_at_client_address_are_an_error() {
    let mut ctx = TestContext::new().await;
    let _hosts = mock_hosts(
        &mut ctx,
        json!({
            "os": [
                {"Alias": "db1", "Address": CLIENT_ADDRESS},
                {"Alias": "db1-old", "Address": CLIENT_ADDRESS}
            ]
        }),
    )
    .await;
    let _configs = mock_configs(&mut ctx, json!([])).await;
    let _instances = ctx.agent_instances(os_only()).await;

    let err = ctx.admin(config()).list().await.unwrap_err();
    assert!(
        matches!(err, AdminError::Ambiguous { kind: InstanceKind::Os, count: 2, .. }),
        "got {err}"
    );
}

#[tokio::test]
async fn list_without_client_address_makes_no_requests() {
    let mut ctx = TestContext::new().await;
    let hosts = ctx.server.mock("GET", "/hosts").expect(0).create_async().await;

    let admin = ctx.admin(LocalConfig {
        client_address: String::new(),
        ..config()
    });
    let err = admin.list().await.unwrap_err();

    assert!(matches!(err, AdminError::ClientNotSet), "got {err}");
    hosts.assert_async().await;
}

#[tokio::test]
async fn catalog_registry_is_listed_node_by_node() {
    let mut ctx = TestContext::new().await;
    let _nodes = ctx
        .server
        .mock("GET", "/v1/catalog/nodes")
        .with_status(200)
        .with_body(json!([{"Node": OS_NAME, "Address": CLIENT_ADDRESS}]).to_string())
        .create_async()
        .await;
    let _node = ctx
        .server
        .mock("GET", "/v1/catalog/node/db1")
        .with_status(200)
        .with_body(
            json!({
                "Node": {"Node": OS_NAME, "Address": CLIENT_ADDRESS},
                "Services": {
                    "os": {"ID": "os", "Service": "os", "Tags": [], "Port": 9100},
                    "mongodb": {"ID": "mongodb", "Service": "mongodb", "Tags": ["replset:rs0"], "Port": 9216}
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _configs = mock_configs(&mut ctx, json!([])).await;
    let _instances = ctx.agent_instances(os_only()).await;

    let admin = ctx.admin(LocalConfig {
        registry: RegistryKind::Catalog,
        ..config()
    });
    let rows = admin.list().await.unwrap();

    let kinds: Vec<InstanceKind> = rows.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![InstanceKind::Os, InstanceKind::Mongodb]);
    assert!(rows.iter().all(|r| r.metrics));
    assert_eq!(rows[0].uuid.as_deref(), Some(OS_UUID));
}

#[tokio::test]
async fn os_info_comes_from_query_analytics_api() {
    let mut ctx = TestContext::new().await;
    let _os = ctx
        .server
        .mock("GET", "/instances/os-uuid")
        .with_status(200)
        .with_body(json!({"Subsystem": "os", "UUID": OS_UUID, "Name": OS_NAME}).to_string())
        .create_async()
        .await;

    let os = ctx.admin(config()).os().await.unwrap();
    assert_eq!(os.name, OS_NAME);
}

#[tokio::test]
async fn os_info_requires_recorded_os() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin(LocalConfig {
        client_uuid: String::new(),
        ..config()
    });
    assert!(matches!(admin.os().await, Err(AdminError::OsNotSet)));
}

#[tokio::test]
async fn unknown_os_uuid_is_reported_as_not_found() {
    let mut ctx = TestContext::new().await;
    let _os = ctx
        .server
        .mock("GET", "/instances/os-uuid")
        .with_status(404)
        .create_async()
        .await;

    let err = ctx.admin(config()).os().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn ping_checks_qan_api_and_registry() {
    let mut ctx = TestContext::new().await;
    let qan = ctx
        .server
        .mock("GET", "/ping")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let registry = ctx
        .server
        .mock("GET", "/hosts")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    ctx.admin(config()).ping().await.unwrap();
    qan.assert_async().await;
    registry.assert_async().await;
}
