//! Gateway module - the HTTP surface
//!
//! Exposes the orchestrator over REST:
//!
//! - `POST /chat` — chat request; SSE stream when `stream_response` is set
//! - `POST /sessions` — create a session (with context when route params
//!   are supplied)
//! - `GET  /sessions?user_id=` — list a user's sessions
//! - `GET  /sessions/{id}` / `GET /sessions/{id}/messages`
//! - `DELETE /sessions/{id}` — soft delete
//! - `GET  /routes`, `GET /health`
//!
//! Built on Axum; known error categories are translated into HTTP statuses
//! at this boundary.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};

use crate::context::FrontendContext;
use crate::error::SwitchboardError;
use crate::orchestrator::{ChatRequest, Orchestrator};

type SharedState = Arc<Orchestrator>;

/// Build the Axum router with all gateway routes.
pub fn build_router(orchestrator: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route(
            "/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/:id/messages", get(session_messages_handler))
        .route("/routes", get(routes_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// Start the gateway HTTP server.
pub async fn start(orchestrator: SharedState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, build_router(orchestrator)).await?;
    Ok(())
}

/// Error wrapper translating `SwitchboardError` into an HTTP response.
struct ApiError(SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(err: SwitchboardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

async fn chat_handler(
    State(orchestrator): State<SharedState>,
    headers: HeaderMap,
    Json(mut req): Json<ChatRequest>,
) -> Response {
    // Fall back to the Authorization header when the body carries no token.
    if req.bearer_token.is_empty() {
        if let Some(token) = bearer_from_headers(&headers) {
            req.bearer_token = token;
        }
    }

    if req.stream_response {
        return stream_chat(orchestrator, req).await.into_response();
    }

    match orchestrator.handle_chat(req).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(error = %e, "Chat request failed");
            ApiError(e).into_response()
        }
    }
}

async fn stream_chat(
    orchestrator: SharedState,
    req: ChatRequest,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let result = orchestrator
            .handle_chat_stream(req, |chunk| {
                let _ = tx.send(chunk);
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "Streaming chat request failed");
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|chunk| {
        let data = serde_json::to_string(&chunk).unwrap_or_default();
        Ok(SseEvent::default().data(data))
    });

    Sse::new(stream)
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(default)]
    title: String,
    route_path: String,
    #[serde(default)]
    route_params: HashMap<String, String>,
    #[serde(default)]
    frontend: Option<FrontendContext>,
}

fn default_user_id() -> String {
    "guest".to_string()
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

async fn create_session_handler(
    State(orchestrator): State<SharedState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let title = if req.title.is_empty() {
        format!("Chat - {}", req.route_path)
    } else {
        req.title
    };

    let session_id = orchestrator
        .create_session_with_context(
            &req.user_id,
            &title,
            &req.route_path,
            req.route_params,
            req.frontend,
        )
        .await?;

    Ok(Json(CreateSessionResponse { session_id }))
}

#[derive(Debug, Deserialize)]
struct ListSessionsQuery {
    user_id: String,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_sessions_handler(
    State(orchestrator): State<SharedState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Response, ApiError> {
    let sessions = orchestrator
        .list_user_sessions(&query.user_id, query.limit, query.offset)
        .await?;
    Ok(Json(json!({ "sessions": sessions })).into_response())
}

async fn get_session_handler(
    State(orchestrator): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = orchestrator.get_session(&id).await?;
    Ok(Json(session).into_response())
}

async fn session_messages_handler(
    State(orchestrator): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bundle = orchestrator.get_session_with_messages(&id).await?;
    Ok(Json(bundle).into_response())
}

async fn delete_session_handler(
    State(orchestrator): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    orchestrator.delete_session(&id).await?;
    Ok(Json(json!({ "deleted": true })).into_response())
}

async fn routes_handler(State(orchestrator): State<SharedState>) -> Response {
    Json(json!({
        "routes": orchestrator.list_routes(),
        "stats": orchestrator.stats(),
    }))
    .into_response()
}

async fn health_handler(State(orchestrator): State<SharedState>) -> Response {
    match orchestrator.health() {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer tok123".parse().unwrap(),
        );
        assert_eq!(bearer_from_headers(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn test_bearer_from_headers_missing() {
        assert_eq!(bearer_from_headers(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcg==".parse().unwrap(),
        );
        assert_eq!(bearer_from_headers(&headers), None);
    }

    #[test]
    fn test_api_error_status_mapping() {
        let response =
            ApiError(SwitchboardError::RouteNotFound("/x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError(SwitchboardError::ProvidersFailed {
            names: vec!["a".into()],
            reasons: vec!["500".into()],
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response =
            ApiError(SwitchboardError::Validation("bad".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
