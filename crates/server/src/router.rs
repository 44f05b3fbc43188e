//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{api, live};

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health))
        .route("/ready", get(api::ready))
        .route("/metrics", get(api::metrics))
        .route("/config", get(api::config))
        .route(
            "/api/threats",
            get(api::list_threats).post(api::create_threat),
        )
        // Static segment wins over the `{id}` capture below.
        .route("/api/threats/trigger", post(api::trigger_threat))
        .route("/api/threats/{id}", get(api::get_threat))
        .route("/api/analytics", get(api::analytics))
        .route("/ws", get(live::ws_upgrade))
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin; otherwise a comma-separated origin list.
fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use warden_core::Config;
    use warden_relay::{MetricsCollector, SharedStore};

    use crate::startup::assemble_state;

    async fn app() -> Router {
        let mut config = Config::default();
        config.generator.enabled = false;
        let store = SharedStore::local_only(config.store.clone()).await;
        build_router(assemble_state(config, store, MetricsCollector::new()))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_ready() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, get_req("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analyzers"].as_array().unwrap().len(), 5);
        assert_eq!(body["store_mode"], "degraded");
        assert_eq!(body["store_backend"], "local");
    }

    #[tokio::test]
    async fn create_then_get_and_list() {
        let app = app().await;
        let (status, created) = send(
            &app,
            post_json(
                "/api/threats",
                json!({
                    "category": "bot_traffic",
                    "subject": "Acme Corp",
                    "metadata": {"user_agent": "python-requests/2.31", "request_count": 4200}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["opinions"].as_object().unwrap().len(), 5);
        assert_eq!(created["signal"]["subject"], "Acme Corp");
        assert!(created["response_plan"]["primary_action"]["action_type"].is_string());
        assert!(!created["investigation_timeline"]["events"].as_array().unwrap().is_empty());
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, get_req(&format!("/api/threats/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, page) = send(&app, get_req("/api/threats?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["threats"][0]["id"], id.as_str());
        assert_eq!(page["limit"], 5);
    }

    #[tokio::test]
    async fn malformed_signals_are_rejected() {
        let app = app().await;
        let (status, body) = send(
            &app,
            post_json("/api/threats", json!({"category": "phishing", "subject": "Acme Corp"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("phishing"));

        let (status, _) = send(
            &app,
            post_json("/api/threats", json!({"category": "geo_anomaly", "subject": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_limit_is_bounded() {
        let app = app().await;
        for uri in ["/api/threats?limit=0", "/api/threats?limit=101"] {
            let (status, _) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
        let (status, body) = send(&app, get_req("/api/threats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["limit"], 20);
        assert_eq!(body["threats"], json!([]));
    }

    #[tokio::test]
    async fn huge_offset_returns_an_empty_page() {
        let app = app().await;
        let (status, _) = send(
            &app,
            post_json("/api/threats", json!({"category": "geo_anomaly", "subject": "Acme Corp"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_req("/api/threats?offset=18446744073709551615")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threats"], json!([]));
        assert_eq!(body["offset"], json!(u64::MAX));
    }

    #[tokio::test]
    async fn unknown_threat_is_404() {
        let app = app().await;
        let (status, _) = send(&app, get_req(&format!("/api/threats/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send(&app, get_req("/api/threats/not-a-uuid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Threat not found");
    }

    #[tokio::test]
    async fn trigger_variants() {
        let app = app().await;
        let empty = Request::builder()
            .method("POST")
            .uri("/api/threats/trigger")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, empty).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            post_json("/api/threats/trigger", json!({"scenario": "critical_threat"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signal"]["category"], "device_compromise");

        let (status, body) = send(
            &app,
            post_json("/api/threats/trigger", json!({"threat_type": "geo_anomaly"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signal"]["category"], "geo_anomaly");

        let (status, _) = send(
            &app,
            post_json("/api/threats/trigger", json!({"scenario": "meteor_strike"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analytics_and_metrics_reflect_activity() {
        let app = app().await;
        for _ in 0..2 {
            let (status, _) = send(
                &app,
                post_json("/api/threats/trigger", json!({"category": "proxy_network"})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&app, get_req("/api/analytics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_verdicts"], 2);
        assert_eq!(body["verdicts_by_category"]["proxy_network"], 2);

        let (status, body) = send(&app, get_req("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["operations"]["coordinator.run"]["calls"], 2);
        assert_eq!(body["active_sessions"], 0);
    }

    #[tokio::test]
    async fn config_is_redacted() {
        let app = app().await;
        let (status, body) = send(&app, get_req("/config")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"], "default");
        assert_eq!(body["store"]["max_retained"], 100);
    }
}
