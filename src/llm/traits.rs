//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：complete（非流式）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// LLM 调用错误
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// 映射为流内错误事件的 error_code
    pub fn error_code(&self) -> &'static str {
        match self {
            LlmError::ApiError { status: 429, .. } => "RESOURCE_EXHAUSTED",
            LlmError::ApiError { status: 404, .. } => "NOT_FOUND",
            LlmError::ApiError { status: 400, .. } | LlmError::InvalidRequest(_) => {
                "INVALID_ARGUMENT"
            }
            LlmError::ApiError { status: 401 | 403, .. } => "PERMISSION_DENIED",
            LlmError::ApiError { status: 503, .. } | LlmError::NetworkError(_) => "UNAVAILABLE",
            LlmError::Timeout => "DEADLINE_EXCEEDED",
            LlmError::ApiError { .. } => "UNKNOWN",
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 当前绑定的模型名
    fn model(&self) -> &str;

    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
