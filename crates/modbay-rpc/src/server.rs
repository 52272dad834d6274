//! HTTP server implementation using Axum.

use crate::handlers::{handle_health, handle_rpc};
use axum::{
    routing::{get, post},
    Router,
};
use modbay_core::ModbayApi;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub api: ModbayApi,
}

/// Build the router without binding it.
pub fn router(api: ModbayApi) -> Router {
    let state = Arc::new(AppState { api });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/rpc", post(handle_rpc))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the JSON-RPC HTTP server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(api: ModbayApi, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = router(api);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn rpc(addr: SocketAddr, method: &str, params: Value) -> Value {
        reqwest::Client::new()
            .post(format!("http://{}/rpc", addr))
            .json(&json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1}))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap()
    }

    fn legacy_source(root: &Path) -> std::path::PathBuf {
        let source = root.join("legacy");
        std::fs::create_dir_all(source.join("resources/mods")).unwrap();
        std::fs::create_dir_all(source.join("home/default/classification")).unwrap();
        std::fs::write(
            source.join("home/default/classification/fire"),
            "lw\nhutao\n",
        )
        .unwrap();
        source
    }

    async fn start(temp: &TempDir) -> SocketAddr {
        let api = ModbayApi::new(temp.path().join("data")).unwrap();
        start_server(api, "127.0.0.1", 0).await.unwrap()
    }

    #[tokio::test]
    async fn test_server_starts() {
        let temp = TempDir::new().unwrap();
        let addr = start(&temp).await;
        assert!(addr.port() > 0);

        let health: Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }

    #[tokio::test]
    async fn test_migration_over_rpc() {
        let temp = TempDir::new().unwrap();
        let source = legacy_source(temp.path());
        let addr = start(&temp).await;

        let analysis = rpc(addr, "analyze_source", json!({"sourcePath": source})).await;
        assert_eq!(analysis["result"]["analysis"]["classificationObjects"], 2);

        let started = rpc(addr, "start_migration", json!({"source_path": source})).await;
        let id = started["result"]["migration_id"].as_str().unwrap().to_string();

        let mut result = Value::Null;
        for _ in 0..200 {
            let response = rpc(addr, "get_migration_result", json!({"migrationId": id})).await;
            if !response["result"]["result"].is_null() {
                result = response["result"]["result"].clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert_eq!(result["success"], true);
        assert_eq!(result["classificationRulesCreated"], 3);

        let tree = rpc(addr, "get_classification_tree", json!({})).await;
        let roots = tree["result"]["tree"].as_array().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["children"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_errors_use_rpc_codes() {
        let temp = TempDir::new().unwrap();
        let addr = start(&temp).await;

        let missing = rpc(addr, "get_migration_progress", json!({})).await;
        assert_eq!(missing["error"]["code"], -32602);

        let unknown = rpc(addr, "get_migration_result", json!({"migration_id": "nope"})).await;
        assert_eq!(unknown["error"]["code"], -32001);

        let bad_source = rpc(
            addr,
            "start_migration",
            json!({"sourcePath": temp.path().join("missing")}),
        )
        .await;
        assert_eq!(bad_source["error"]["code"], -32002);

        let no_method = rpc(addr, "frobnicate", json!({})).await;
        assert!(no_method["error"].is_object());
    }
}
