//! HEAD-probe tests against a local HTTP server.

mod common;

use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use common::MockFactory;
use edgequake_office2pdf::engine::assets::verify_assets;
use edgequake_office2pdf::{
    AssetLocation, AssetProber, AssetStatus, DefaultAssetProber, EngineConfig, EngineManager,
    InitError,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn wasm_body() -> impl axum::response::IntoResponse {
    ([(header::CONTENT_TYPE, "application/wasm")], vec![0u8; 2048])
}

async fn script_body() -> impl axum::response::IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript")], "self.onmessage = () => {};")
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Serve `/office/*` with the given data-bundle handler; the worker script
/// is only served when `with_worker` is set.
async fn spawn_asset_server(data_ok: bool, with_worker: bool) -> SocketAddr {
    let mut app = Router::new()
        .route("/office/soffice.js", get(script_body))
        .route("/office/soffice.wasm", get(wasm_body));
    app = if data_ok {
        app.route("/office/soffice.data", get(wasm_body))
    } else {
        app.route("/office/soffice.data", get(broken))
    };
    if with_worker {
        app = app.route("/office/soffice.worker.js", get(script_body));
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> EngineConfig {
    EngineConfig::builder()
        .base_path(format!("http://{addr}/office/"))
        .probe_timeout_secs(5)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_head_probe_reports_content_type() {
    let addr = spawn_asset_server(true, true).await;
    let base = AssetLocation::parse(&format!("http://{addr}/office/")).unwrap();
    let prober = DefaultAssetProber::new(Duration::from_secs(5)).unwrap();

    // The same client serves successive probes.
    let wasm = prober.probe(&base.join("soffice.wasm").unwrap()).await.unwrap();
    assert_eq!(wasm.content_type.as_deref(), Some("application/wasm"));
    let script = prober.probe(&base.join("soffice.js").unwrap()).await.unwrap();
    assert_eq!(script.content_type.as_deref(), Some("text/javascript"));
}

#[tokio::test]
async fn test_missing_remote_asset_is_404() {
    let addr = spawn_asset_server(true, false).await;
    let config = config_for(addr);
    let assets = config.assets().unwrap();

    let prober = DefaultAssetProber::new(config.probe_timeout()).unwrap();
    let err = verify_assets(&prober, &assets).await.unwrap_err();
    assert_eq!(
        err,
        InitError::AssetUnavailable {
            file: format!("http://{addr}/office/soffice.worker.js"),
            status: AssetStatus::Http(404),
        }
    );
}

#[tokio::test]
async fn test_server_error_names_status() {
    let addr = spawn_asset_server(false, true).await;
    let config = config_for(addr);

    let err = verify_assets(
        &DefaultAssetProber::new(config.probe_timeout()).unwrap(),
        &config.assets().unwrap(),
    )
    .await
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("soffice.data"), "got {msg}");
    assert!(msg.contains("HTTP 500"), "got {msg}");
}

#[tokio::test]
async fn test_unreachable_host_is_reported() {
    // Bind then drop so the port is (almost certainly) closed.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let location = AssetLocation::parse(&format!("http://{addr}/"))
        .unwrap()
        .join("soffice.js")
        .unwrap();

    let status = DefaultAssetProber::new(Duration::from_secs(2))
        .unwrap()
        .probe(&location)
        .await
        .unwrap_err();
    assert!(matches!(status, AssetStatus::Unreachable(_)), "got {status:?}");
}

#[tokio::test]
async fn test_manager_initializes_from_remote_assets() {
    let addr = spawn_asset_server(true, true).await;
    let (factory, _state) = MockFactory::new();
    let manager = EngineManager::new(config_for(addr), factory).unwrap();

    manager.initialize(None).await.unwrap();
    assert!(manager.is_ready());
}

#[tokio::test]
async fn test_manager_initializes_from_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["soffice.js", "soffice.wasm", "soffice.data", "soffice.worker.js"] {
        std::fs::write(dir.path().join(name), b"asset").unwrap();
    }
    let config = EngineConfig::builder()
        .base_path(dir.path().to_string_lossy())
        .build()
        .unwrap();
    let (factory, state) = MockFactory::new();
    let manager = Arc::new(EngineManager::new(config, factory).unwrap());

    manager.initialize(None).await.unwrap();
    assert_eq!(common::MockState::count(&state.startups), 1);
}
