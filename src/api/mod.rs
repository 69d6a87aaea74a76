//! HTTP 入口：POST /agent/analyze、POST /agent/chat、GET /health
//!
//! 请求体解析失败统一返回 400；Agent 禁用返回 503；回退耗尽等其他错误返回 500。
//! 错误响应体：{"statusCode", "error", "message"}

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;

use crate::agent::{AgentService, AnalysisOutcome, AnalysisRequest, ChatRequest, ChatResponse};
use crate::core::AgentError;

pub type AppState = Arc<AgentService>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(AgentError::Disabled(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }
        let body = json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// 创建 Agent 路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/agent/analyze", post(analyze))
        .route("/agent/chat", post(chat))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

/// POST /agent/analyze
async fn analyze(
    State(service): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = service.analyze(&request).await?;
    Ok(Json(outcome))
}

/// POST /agent/chat
async fn chat(
    State(service): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let response = service.chat(&request).await?;
    Ok(Json(response))
}
