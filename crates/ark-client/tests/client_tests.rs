//! Client integration tests against a mock ark container

use ark_client::{
    ArkClient, ArkError, BizIdentity, BizState, HealthReport, InstallRequest, Operation,
    RuntimeCoordinate, TransportErrorKind, UninstallOutcome, UninstallRequest,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn container() -> (ServerGuard, RuntimeCoordinate) {
    let server = Server::new_async().await;
    let port = server
        .host_with_port()
        .rsplit(':')
        .next()
        .and_then(|port| port.parse().ok())
        .expect("mock server port");
    (server, RuntimeCoordinate::local(Some(port)))
}

fn biz() -> BizIdentity {
    BizIdentity::new("biz1", "0.0.1-SNAPSHOT").with_source("file:///tmp/biz1-0.0.1-SNAPSHOT-ark-biz.jar")
}

/// Accepts connections and never answers
async fn silent_listener() -> (u16, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (port, handle)
}

#[tokio::test]
async fn test_install_success() {
    let (mut server, coordinate) = container().await;
    let mock = server
        .mock("POST", "/installBiz")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "bizModel": {
                "bizName": "biz1",
                "bizVersion": "0.0.1-SNAPSHOT",
                "bizUrl": "file:///tmp/biz1-0.0.1-SNAPSHOT-ark-biz.jar"
            },
            "targetContainer": { "runType": "local" },
            "installType": "filesystem"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":"SUCCESS","data":{"code":"SUCCESS","message":"Install Biz: biz1:0.0.1-SNAPSHOT success","elapsedSpace":1460,"bizInfos":[]},"message":"install biz success!"}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let envelope = client
        .install(&InstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(envelope.is_success());
    assert_eq!(envelope.data.elapsed_space, 1460);
    assert_eq!(envelope.message, "install biz success!");
}

#[tokio::test]
async fn test_install_failure_includes_stack_trace() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/installBiz")
        .with_status(200)
        .with_body(r#"{"code":"FAILED","data":{"code":"INSTALL_BIZ_FAILED","message":"boom"},"message":"install biz failed!","errorStackTrace":"java.lang.IllegalStateException: boom"}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let err = client
        .install(&InstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArkError::RemoteOperation { operation: Operation::InstallBiz, .. }));
    assert_eq!(
        err.to_string(),
        "install biz failed: install biz failed! \n Caused by: java.lang.IllegalStateException: boom"
    );
}

#[tokio::test]
async fn test_uninstall_success() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/uninstallBiz")
        .match_body(Matcher::PartialJson(json!({
            "bizModel": { "bizName": "biz1", "bizVersion": "0.0.1-SNAPSHOT" }
        })))
        .with_status(200)
        .with_body(r#"{"code":"SUCCESS","data":{"code":"SUCCESS","message":"Uninstall biz: biz1:0.0.1-SNAPSHOT success."},"message":"uninstall biz success!"}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let outcome = client
        .uninstall(&UninstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, UninstallOutcome::Uninstalled(_)));
    assert!(outcome.was_installed());
}

#[tokio::test]
async fn test_uninstall_absent_module_is_success() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/uninstallBiz")
        .with_status(200)
        .with_body(r#"{"code":"FAILED","data":{"code":"NOT_FOUND_BIZ","message":"Uninstall biz: biz1:0.0.1-SNAPSHOT not found."},"message":"uninstall biz failed!"}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let outcome = client
        .uninstall(&UninstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.was_installed());
    assert_eq!(outcome.envelope().data.code, "NOT_FOUND_BIZ");
}

#[tokio::test]
async fn test_uninstall_absent_module_with_null_members() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/uninstallBiz")
        .with_status(200)
        .with_body(r#"{"code":"FAILED","data":{"code":"NOT_FOUND_BIZ","message":null,"bizInfos":null},"message":"uninstall biz failed!","errorStackTrace":null}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let outcome = client
        .uninstall(&UninstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, UninstallOutcome::NotInstalled(_)));
}

#[tokio::test]
async fn test_uninstall_unmapped_nested_code_renders_envelope() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/uninstallBiz")
        .with_status(200)
        .with_body(r#"{"code":"FAILED","data":{"code":"FOO"},"message":"uninstall biz failed!","errorStackTrace":null}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let err = client
        .uninstall(&UninstallRequest::new(biz(), coordinate), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        r#"uninstall biz failed: {"code":"FAILED","data":{"code":"FOO","message":"","elapsedSpace":0,"bizInfos":[]},"message":"uninstall biz failed!"}"#
    );
}

#[tokio::test]
async fn test_install_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = ArkClient::new().unwrap();
    let err = client
        .install(
            &InstallRequest::new(biz(), RuntimeCoordinate::local(Some(port))),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ArkError::Transport { kind: TransportErrorKind::ConnectionRefused, .. }
    ));
    assert_eq!(
        err.to_string(),
        format!(
            "POST \"http://127.0.0.1:{port}/installBiz\": tcp connect 127.0.0.1:{port}: connection refused"
        )
    );
}

#[tokio::test]
async fn test_query_all_preserves_order_and_history() {
    let (mut server, coordinate) = container().await;
    let data = json!([
        {
            "bizName": "biz2",
            "bizVersion": "1.0.0",
            "bizState": "ACTIVATED",
            "mainClass": "com.example.Biz2Application",
            "webContextPath": "biz2",
            "bizStateRecords": [
                { "changeTime": 1700000000000i64, "state": "RESOLVED", "reason": "INSTALL", "message": "resolved" },
                { "changeTime": 1700000001234i64, "state": "ACTIVATED", "reason": "START", "message": "started" }
            ]
        },
        {
            "bizName": "biz1",
            "bizVersion": "0.0.1",
            "bizState": "DEACTIVATED",
            "mainClass": "com.example.Biz1Application",
            "webContextPath": "biz1",
            "bizStateRecords": [
                { "changeTime": 1700000002000i64, "state": "DEACTIVATED", "reason": "", "message": "" }
            ]
        }
    ]);
    server
        .mock("POST", "/queryAllBiz")
        .match_body(Matcher::Json(json!({})))
        .with_status(200)
        .with_body(json!({ "code": "SUCCESS", "data": data }).to_string())
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let modules = client
        .query_all(&coordinate, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].name, "biz2");
    assert_eq!(modules[1].state, BizState::Deactivated);
    assert_eq!(modules[0].state_history[1].timestamp_epoch_millis, 1700000001234);
    assert_eq!(serde_json::to_value(&modules).unwrap(), data);
}

#[tokio::test]
async fn test_health_snapshot() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/health")
        .with_status(200)
        .with_body(
            json!({
                "code": "SUCCESS",
                "data": {
                    "healthData": {
                        "jvm": {
                            "max heap memory(M)": 4096,
                            "used heap memory(M)": 1024,
                            "java version": "1.8.0_291"
                        },
                        "cpu": { "count": 12, "free (%)": 82.5 },
                        "masterBizInfo": {
                            "bizName": "base",
                            "bizState": "ACTIVATED",
                            "bizVersion": "1.0.0",
                            "webContextPath": "/"
                        }
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let report = client
        .health(&coordinate, &CancellationToken::new())
        .await
        .unwrap();

    let snapshot = match report {
        HealthReport::Snapshot(snapshot) => snapshot,
        other => panic!("expected snapshot, got {:?}", other),
    };
    assert_eq!(snapshot.master_biz_info.name, "base");
    assert_eq!(snapshot.cpu_metrics.get_i64("count"), Some(12));
    assert_eq!(snapshot.jvm_metrics.get_str("java version"), Some("1.8.0_291"));
    assert_eq!(snapshot.heap_usage_ratio(), Some(0.25));
}

#[tokio::test]
async fn test_health_failure_code() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/health")
        .with_status(200)
        .with_body(r#"{"code":"FAILED","data":null,"message":"health check failed"}"#)
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let err = client
        .health(&coordinate, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "health failed: health check failed");
}

#[tokio::test]
async fn test_non_envelope_body_is_decode_error() {
    let (mut server, coordinate) = container().await;
    server
        .mock("POST", "/queryAllBiz")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let client = ArkClient::new().unwrap();
    let err = client
        .query_all(&coordinate, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArkError::Decode { .. }));
    assert_eq!(err.kind(), "decode");
    assert!(err.to_string().contains("Bad Gateway"));
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let (port, server) = silent_listener().await;
    let client = ArkClient::new().unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.query_all(&RuntimeCoordinate::local(Some(port)), &cancel),
    )
    .await
    .expect("cancelled call should return promptly")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(
        err.to_string(),
        format!("POST \"http://127.0.0.1:{port}/queryAllBiz\": request cancelled")
    );
    server.abort();
}

#[tokio::test]
async fn test_request_timeout() {
    let (port, server) = silent_listener().await;
    let client = ArkClient::builder()
        .request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let err = client
        .health(&RuntimeCoordinate::local(Some(port)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ArkError::Transport { kind: TransportErrorKind::Timeout, .. }
    ));
    assert!(err.to_string().ends_with(": request timed out"));
    server.abort();
}
