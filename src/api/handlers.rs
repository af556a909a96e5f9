//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::CacheOf;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, LenResponse, SetRequest, SetResponse,
};

/// Application state shared across all handlers.
///
/// The cache handle is internally synchronized and cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The served cache
    pub cache: CacheOf<Value>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: CacheOf<Value>) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Spawns the cache's maintenance task on the current runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = CacheOf::new(config.cache.clone())?;
        Ok(Self::new(cache))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair. With `wait` set, answers once maintenance has
/// applied the write; a missed deadline still answers with `confirmed: false`
/// because the value is already stored.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let options = req.options();
    if !req.wait {
        state
            .cache
            .put_and_forget_with_ttl(req.key.clone(), req.value, options.ttl);
        return Ok(Json(SetResponse::new(req.key, false)));
    }

    let confirmed = match state
        .cache
        .put_and_wait_with(req.key.clone(), req.value, options)
        .await
    {
        Ok(()) => true,
        Err(CacheError::Timeout { .. }) => false,
        Err(e) => return Err(e),
    };

    Ok(Json(SetResponse::new(req.key, confirmed)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key) {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.remove(&key) {
        Ok(Json(DeleteResponse::new(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for GET /len
///
/// Returns the number of stored entries.
pub async fn len_handler(State(state): State<AppState>) -> Json<LenResponse> {
    Json(LenResponse {
        len: state.cache.len(),
        capacity: state.cache.capacity(),
    })
}

/// Handler for GET /health
///
/// Reports degraded once the maintenance task has stopped.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    if state.cache.is_running() {
        Json(HealthResponse::healthy())
    } else {
        Json(HealthResponse::degraded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn test_state(capacity: usize) -> AppState {
        let cache = CacheOf::new(CacheConfig::with_capacity(capacity)).unwrap();
        AppState::new(cache)
    }

    fn set_request(key: &str, value: Value, wait: bool) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl_ms: None,
            wait,
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state(100);

        let req = set_request("test_key", Value::from("test_value"), false);
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        let result = get_handler(State(state.clone()), Path("test_key".to_string())).await;
        let response = result.unwrap();
        assert_eq!(response.value, Value::from("test_value"));
    }

    #[tokio::test]
    async fn test_waited_set_is_confirmed() {
        let state = test_state(100);

        let req = set_request("key", Value::from(1), true);
        let response = set_handler(State(state), Json(req)).await.unwrap();
        assert!(response.confirmed);
    }

    #[tokio::test]
    async fn test_waited_set_evicts_before_answering() {
        let state = test_state(1);

        for key in ["a", "b"] {
            let req = set_request(key, Value::from(key), true);
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }

        let response = len_handler(State(state.clone())).await;
        assert_eq!(response.len, 1);
        assert_eq!(response.capacity, 1);
        assert!(get_handler(State(state), Path("a".to_string())).await.is_err());
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state(100);

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state(100);

        let req = set_request("to_delete", Value::from("value"), false);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        // Verify it's gone
        let result = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = test_state(100);

        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status, "healthy");

        state.cache.shutdown().await;
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "degraded");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state(100);

        let req = set_request("", Value::from("value"), false);
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
