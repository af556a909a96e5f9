//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, len_handler, set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a key-value pair, optionally waiting for maintenance
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `GET /len` - Number of stored entries
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/len", get(len_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOf;
    use crate::config::CacheConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::util::ServiceExt;

    fn create_test_app(capacity: usize) -> Router {
        let config = CacheConfig::with_capacity(capacity).default_ttl(None);
        create_router(AppState::new(CacheOf::new(config).unwrap()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_waited_set_with_deadline_is_confirmed() {
        let app = create_test_app(4);

        let body = r#"{"key":"user","value":{"id":7},"wait":true,"timeout_ms":5000}"#;
        let (status, json) = call(&app, "PUT", "/set", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["confirmed"], true);
        assert_eq!(json["key"], "user");
    }

    #[tokio::test]
    async fn test_waited_sets_keep_len_within_capacity() {
        let app = create_test_app(1);

        for key in ["old", "new"] {
            let body = format!(r#"{{"key":"{}","value":1,"wait":true}}"#, key);
            call(&app, "PUT", "/set", Some(&body)).await;
        }

        let (status, json) = call(&app, "GET", "/len", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["len"], 1);

        let (status, _) = call(&app, "GET", "/get/old", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, json) = call(&app, "GET", "/get/new", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["value"], 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected() {
        let app = create_test_app(4);

        let (status, json) =
            call(&app, "PUT", "/set", Some(r#"{"key":"k","value":1,"ttl_ms":0}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("TTL"));
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let app = create_test_app(4);

        let (status, _) = call(&app, "GET", "/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "POST", "/set", Some("{}")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
