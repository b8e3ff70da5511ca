use sacvm::provider::sakura::{Credentials, SakuraClient};
use sacvm::provider::{
    Availability, CloudProvider, DiskEdit, PowerState, ProviderError, ServerQuery,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "/is1a/api/cloud/1.1";

fn client(server: &MockServer) -> SakuraClient {
    SakuraClient::new(&Credentials {
        token: "t".into(),
        secret: "s".into(),
        zone: "is1a".into(),
        api_root: server.uri(),
    })
    .unwrap()
}

fn query(name: &str) -> ServerQuery {
    ServerQuery {
        name_like: name.into(),
        offset: 0,
        limit: 5,
        include: vec!["Name", "Interfaces.IPAddress", "Disks"],
    }
}

#[tokio::test]
async fn find_servers_decodes_string_and_numeric_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/server")))
        // base64("t:s")
        .and(header("authorization", "Basic dDpz"))
        .and(header("X-Sakura-Bigint-As-Int", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Total": 2,
            "Servers": [
                {
                    "ID": "113000000001",
                    "Name": "demo",
                    "Interfaces": [{ "ID": 5, "IPAddress": "203.0.113.5" }],
                    "Disks": [{ "ID": 113000000002_i64 }]
                },
                {
                    "ID": 113000000003_i64,
                    "Name": "demo-old",
                    "Interfaces": null,
                    "Disks": null
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let servers = client(&server).find_servers(&query("demo")).await.unwrap();

    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].id, 113000000001);
    assert_eq!(servers[0].addresses, vec!["203.0.113.5".to_string()]);
    assert_eq!(servers[0].disk_ids, vec![113000000002]);
    assert_eq!(servers[1].name, "demo-old");
    assert!(servers[1].addresses.is_empty());
    assert!(servers[1].disk_ids.is_empty());
}

#[tokio::test]
async fn empty_search_result_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/server")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Total": 0, "Servers": null })),
        )
        .mount(&server)
        .await;

    let servers = client(&server).find_servers(&query("nobody")).await.unwrap();
    assert!(servers.is_empty());
}

#[tokio::test]
async fn rejected_credentials_are_auth_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/server")))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = client(&server)
        .find_servers(&query("demo"))
        .await
        .unwrap_err();
    assert!(err.is_auth_failure(), "got {err:?}");
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/disk/42")))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such disk"))
        .mount(&server)
        .await;

    let err = client(&server).read_disk(42).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{API}/server/7/power")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    match client(&server).boot_server(7).await.unwrap_err() {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn disk_availability_is_read_from_the_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/disk/42")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Disk": { "ID": 42, "Availability": "migrating" }
        })))
        .mount(&server)
        .await;

    let disk = client(&server).read_disk(42).await.unwrap();
    assert_eq!(disk.id, 42);
    assert_eq!(disk.availability, Availability::Migrating);
}

#[tokio::test]
async fn power_state_reads_instance_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/server/7/power")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Instance": { "Status": "down" } })),
        )
        .mount(&server)
        .await;

    let state = client(&server).power_state(7).await.unwrap();
    assert_eq!(state, PowerState::Down);
}

#[tokio::test]
async fn disk_config_sends_hostname_password_and_notes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{API}/disk/42/config")))
        .and(body_partial_json(json!({
            "HostName": "demo",
            "Password": "hunter22",
            "Notes": [{ "ID": 7000 }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let edit = DiskEdit {
        hostname: "demo".into(),
        password: "hunter22".into(),
        ssh_keys: Vec::new(),
        notes: vec![7000],
    };
    client(&server).configure_disk(42, &edit).await.unwrap();
}

#[tokio::test]
async fn delete_cascade_paths() {
    let server = MockServer::start().await;
    for (verb, route) in [
        ("DELETE", format!("{API}/disk/42/to/server")),
        ("DELETE", format!("{API}/server/7")),
        ("DELETE", format!("{API}/disk/42")),
    ] {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Success": true })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let api = client(&server);
    api.disconnect_disk(42).await.unwrap();
    api.delete_server(7).await.unwrap();
    api.delete_disk(42).await.unwrap();
}
