//! Router assembly

use axum::{
    routing::get,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;
use crate::websocket;

/// Build the control-plane router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/investigate", post(handlers::create_investigation))
        .route(
            "/investigations/:id",
            get(handlers::get_investigation).delete(handlers::delete_investigation),
        )
        .route("/investigations/:id/logs", get(handlers::get_investigation_logs))
        .route("/ws", get(websocket::ws_handler))
        .route("/healthz", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::testing::MockOrchestrator;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    fn test_app() -> (Router, Arc<MockOrchestrator>) {
        let orchestrator = MockOrchestrator::shared();
        let config = ServerConfig {
            poll_interval: Duration::from_secs(3600), // watchers stay quiet in tests
            ..Default::default()
        };
        let state = AppState::new(orchestrator.clone(), config);
        (create_router(state), orchestrator)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_investigate(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/investigate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_identifiers() {
        let (app, _orchestrator) = test_app();

        let response = app
            .oneshot(post_investigate(
                &json!({"goal": "api 502s in checkout", "turn_budget": 5}).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["investigation_id"].is_string());
        let job_name = body["job_name"].as_str().unwrap();
        assert!(job_name.starts_with("investigation-"));
        assert!(body["log_stream_hint"].as_str().unwrap().contains(job_name));
    }

    #[tokio::test]
    async fn test_empty_goal_is_rejected() {
        let (app, _orchestrator) = test_app();

        let response = app
            .oneshot(post_investigate(&json!({"goal": "  "}).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "bad_request");
        assert!(body["detail"].as_str().unwrap().contains("goal"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, _orchestrator) = test_app();

        let response = app.oneshot(post_investigate("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_orchestrator_rejection_maps_to_503() {
        let (app, orchestrator) = test_app();
        orchestrator.set_reject_creates(true);

        let response = app
            .oneshot(post_investigate(&json!({"goal": "goal"}).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["error"], "orchestrator_unavailable");
    }

    #[tokio::test]
    async fn test_lifecycle_over_http() {
        let (app, _orchestrator) = test_app();

        // Create
        let response = app
            .clone()
            .oneshot(post_investigate(&json!({"goal": "disk filling up"}).to_string()))
            .await
            .unwrap();
        let id = body_json(response).await["investigation_id"]
            .as_str()
            .unwrap()
            .to_string();

        // Status: running, not terminal
        let response = app
            .clone()
            .oneshot(get(&format!("/investigations/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["state"], "running");
        assert!(body["created_at"].is_string());
        assert!(body["terminal_at"].is_null());

        // Cancel
        let response = app
            .clone()
            .oneshot(delete(&format!("/investigations/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Terminal state is stable across reads
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get(&format!("/investigations/{}", id)))
                .await
                .unwrap();
            let body = body_json(response).await;
            assert_eq!(body["state"], "cancelled");
            assert!(body["terminal_at"].is_string());
        }

        // DELETE on a terminal investigation stays 204
        let response = app
            .clone()
            .oneshot(delete(&format!("/investigations/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_investigation_is_404() {
        let (app, _orchestrator) = test_app();

        let response = app
            .clone()
            .oneshot(get("/investigations/deadbeef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(delete("/investigations/deadbeef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_replay_after_disconnect() {
        let (app, orchestrator) = test_app();

        let response = app
            .clone()
            .oneshot(post_investigate(&json!({"goal": "replay me"}).to_string()))
            .await
            .unwrap();
        let body = body_json(response).await;
        let id = body["investigation_id"].as_str().unwrap().to_string();
        let job_name = body["job_name"].as_str().unwrap().to_string();

        orchestrator.set_job_logs(
            &job_name,
            concat!(
                "INFO worker boot\n",
                "{\"type\":\"thought\",\"turn\":1,\"text\":\"look at nodes\"}\n",
                "{\"type\":\"action\",\"turn\":1,\"tool\":\"execute_shell\",\"params\":{}}\n",
                "{\"type\":\"finish\",\"turn\":1,\"result\":\"resolved\"}\n",
            ),
        );

        let response = app
            .oneshot(get(&format!("/investigations/{}/logs", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "thought");
        assert_eq!(events[2]["type"], "finish");
    }
}
