//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::{ConfigProvider, ServerConfig};
use crate::status::Aggregator;

use axum::{
    routing::{any, get, post},
    Router,
};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ConfigProvider>,
    pub aggregator: Arc<Aggregator>,
}

/// Build the router with all routes.
///
/// When `static_dir` is given, non-API paths are served from it with
/// `index.html` as the fallback for client-side routes.
pub fn router(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    let mut router = Router::new()
        .route("/api/status", get(handlers::handle_status))
        .route("/api/status/{id}", get(handlers::handle_service_status))
        .route("/api/history/{id}", get(handlers::handle_history))
        .route("/api/config", get(handlers::handle_get_config))
        .route("/api/config/reload", post(handlers::handle_reload_config))
        .route("/api", any(handlers::handle_api_not_found))
        .route("/api/{*rest}", any(handlers::handle_api_not_found));

    if let Some(dir) = static_dir {
        let index = Path::new(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Web server for eryx-status.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, services: Arc<ConfigProvider>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            config,
            state: AppState {
                services,
                aggregator,
            },
        }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.config.host, self.config.http_port);
        let router = router(self.state.clone(), self.config.static_dir.as_deref());

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CheckRecord, CheckStore, Store};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::Value;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};
    use tower::ServiceExt;

    const SERVICES: &str = r#"{
        "checkInterval": 120,
        "services": [
            { "id": "web", "name": "Website", "url": "https://example.com" },
            { "id": "db", "name": "Database", "url": "db.internal", "type": "tcp", "port": 5432 }
        ]
    }"#;

    fn services_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn state(file: &NamedTempFile) -> (Arc<Store>, AppState) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let services = Arc::new(ConfigProvider::load(file.path()).unwrap());
        let aggregator = Arc::new(Aggregator::new(store.clone(), services.clone()));
        (store, AppState { services, aggregator })
    }

    fn record(service_id: &str, online: bool, minutes_ago: i64) -> CheckRecord {
        CheckRecord {
            id: 0,
            service_id: service_id.to_string(),
            online,
            status: None,
            latency_ms: 7,
            error: if online { None } else { Some("timeout".to_string()) },
            created_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let file = services_file(SERVICES);
        let (store, state) = state(&file);
        store.append(&record("db", true, 10)).unwrap();
        store.append(&record("db", false, 5)).unwrap();

        let (status, body) = send(router(state, None), "GET", "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall"], "degraded");

        let services = body["services"].as_array().unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0]["id"], "web");
        assert_eq!(services[0]["online"], true);
        assert_eq!(services[0]["uptime"], 100.0);
        assert_eq!(services[1]["id"], "db");
        assert_eq!(services[1]["online"], false);
        assert_eq!(services[1]["uptime"], 50.0);
        assert_eq!(services[1]["latency"], 7);
        assert_eq!(services[1]["error"], "timeout");
        assert!(services[1]["lastCheck"].is_string());
    }

    #[tokio::test]
    async fn test_single_service_status() {
        let file = services_file(SERVICES);
        let (_store, state) = state(&file);

        let (status, body) = send(router(state.clone(), None), "GET", "/api/status/web").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Website");

        let (status, _) = send(router(state, None), "GET", "/api/status/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let file = services_file(SERVICES);
        let (store, state) = state(&file);
        store.append(&record("web", true, 60 * 30)).unwrap();
        store.append(&record("web", false, 5)).unwrap();
        store.append(&record("web", true, 20)).unwrap();

        let (status, body) = send(router(state, None), "GET", "/api/history/web").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["serviceId"], "web");

        let checks = body["checks"].as_array().unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0]["online"], true);
        assert_eq!(checks[1]["online"], false);
        assert_eq!(checks[1]["latency"], 7);
        assert!(checks[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_config_and_reload() {
        let file = services_file(SERVICES);
        let (_store, state) = state(&file);

        let (status, body) = send(router(state.clone(), None), "GET", "/api/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "checkInterval": 120 }));

        std::fs::write(file.path(), r#"{"checkInterval": 600, "services": []}"#).unwrap();
        let (status, body) = send(router(state.clone(), None), "POST", "/api/config/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["message"], "config reloaded");

        let (_, body) = send(router(state.clone(), None), "GET", "/api/config").await;
        assert_eq!(body["checkInterval"], 600);

        std::fs::write(file.path(), "{ broken").unwrap();
        let (status, body) = send(router(state.clone(), None), "POST", "/api/config/reload").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);

        // The last good snapshot is still served.
        let (_, body) = send(router(state, None), "GET", "/api/config").await;
        assert_eq!(body["checkInterval"], 600);
    }

    #[tokio::test]
    async fn test_unknown_api_route() {
        let file = services_file(SERVICES);
        let (_store, state) = state(&file);

        let (status, body) = send(router(state, None), "GET", "/api/nothing/here").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found");
    }

    #[tokio::test]
    async fn test_static_fallback_serves_index() {
        let file = services_file(SERVICES);
        let (_store, state) = state(&file);
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>status</h1>").unwrap();
        let dir_str = dir.path().to_str().unwrap().to_string();

        let response = router(state.clone(), Some(dir_str.as_str()))
            .oneshot(Request::builder().uri("/some/page").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>status</h1>");

        // API misses stay JSON 404s even with static serving on.
        let (status, _) = send(router(state, Some(dir_str.as_str())), "GET", "/api/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
