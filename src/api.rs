//! REST API server for the advice router
//!
//! Thin HTTP surface over the orchestrator's function-level contracts.
//! Every endpoint answers with the same `ApiResponse` envelope.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::RoutingOrchestrator;
use crate::error::AdvisorError;
use crate::models::AdviceQuery;
use crate::tone::Tone;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct PaydayRequest {
    pub user_id: String,
    /// Defaults to now.
    #[serde(default)]
    pub payday: Option<DateTime<Utc>>,
    #[serde(default)]
    pub spending_amount: f64,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToneInfo {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    catchphrase: &'static str,
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<RoutingOrchestrator>,
}

fn error_status(error: &AdvisorError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<AdviceQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(
        user_id = %req.profile.user_id,
        session_id = ?req.session_id,
        "Received chat request"
    );

    match state.orchestrator.route(req).await {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => (
            error_status(&e),
            Json(ApiResponse::error(format!("Routing failed: {}", e))),
        ),
    }
}

/// =============================
/// Session Endpoint
/// =============================

async fn session_handler(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.orchestrator.session_summary(&session_id).await {
        Some(summary) => (StatusCode::OK, Json(ApiResponse::success(summary))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Session not found: {}", session_id))),
        ),
    }
}

/// =============================
/// Personalities Endpoint
/// =============================

async fn personalities() -> Json<ApiResponse> {
    let tones: Vec<ToneInfo> = Tone::ALL
        .iter()
        .map(|tone| ToneInfo {
            id: tone.as_str(),
            name: tone.display_name(),
            description: tone.description(),
            catchphrase: tone.catchphrase(),
        })
        .collect();

    Json(ApiResponse::success(serde_json::json!({
        "personalities": tones,
        "default": Tone::default().as_str(),
    })))
}

/// =============================
/// Payday Endpoint
/// =============================

async fn payday_handler(
    State(state): State<ApiState>,
    Json(req): Json<PaydayRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let now = Utc::now();
    let payday = req.payday.unwrap_or(now);

    let record = match state
        .orchestrator
        .record_payday_at(&req.user_id, payday, req.spending_amount, now)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            return (
                error_status(&e),
                Json(ApiResponse::error(format!("Failed to record payday: {}", e))),
            )
        }
    };

    let effect = state.orchestrator.payday_effect(&req.user_id, now).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "user_id": req.user_id,
            "last_payday": record.last_payday,
            "average_overspend_after_payday": record.average_overspend_after_payday,
            "payday_periods": record.payday_periods.len(),
            "history_entries": record.spending_history.len(),
            "payday_effect": effect,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<RoutingOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/session/:session_id", get(session_handler))
        .route("/api/personalities", get(personalities))
        .route("/api/payday", post(payday_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<RoutingOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::OfflineGenerator;
    use crate::state::InMemoryUserStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> Router {
        let orchestrator = RoutingOrchestrator::new(
            Arc::new(OfflineGenerator),
            Arc::new(InMemoryUserStore::new()),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&router(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_then_session_summary() {
        let router = router();
        let (status, body) = send(
            &router,
            post_json(
                "/api/chat",
                serde_json::json!({
                    "query": "Should I invest in an index fund?",
                    "user_context": {"user_id": "user_123", "financial_personality": "zen"},
                    "session_id": "abc"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["metadata"]["handler_name"], "investing");
        assert_eq!(body["data"]["metadata"]["tone_used"], "zen");

        let (status, body) = send(&router, get_req("/api/session/abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["interaction_count"], 1);
        assert_eq!(body["data"]["handlers_used"][0], "investing");
    }

    #[tokio::test]
    async fn test_invalid_chat_is_bad_request() {
        let (status, body) = send(
            &router(),
            post_json(
                "/api/chat",
                serde_json::json!({"query": "  ", "profile": {"user_id": "u1"}}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (status, body) = send(&router(), get_req("/api/session/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_personalities() {
        let (status, body) = send(&router(), get_req("/api/personalities")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["personalities"].as_array().unwrap().len(), 5);
        assert_eq!(body["data"]["default"], "supportive");
    }

    #[tokio::test]
    async fn test_payday_recording() {
        let router = router();
        let (status, body) = send(
            &router,
            post_json(
                "/api/payday",
                serde_json::json!({"user_id": "u1", "spending_amount": 180.0}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["average_overspend_after_payday"], 80.0);
        assert_eq!(body["data"]["payday_effect"]["suggested_transfer"], 40.0);

        let (status, _) = send(
            &router,
            post_json("/api/payday", serde_json::json!({"user_id": "", "spending_amount": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
