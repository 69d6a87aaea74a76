//! Agent 错误类型
//!
//! 与 RequestExecutor 配合：Disabled 直接返回；Llm / Runtime / Session 触发模型回退；
//! Exhausted 为回退列表耗尽后的终止错误。

use thiserror::Error;

use crate::llm::LlmError;
use crate::session::SessionError;

/// 执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    /// API Key 缺失等导致 Agent 未初始化，所有模型都会同样失败，不做回退
    #[error("Agent runner not initialized: {0}")]
    Disabled(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),

    /// 流内错误事件（如 429 / 404），携带 error_code
    #[error("Model {model} returned error {code}: {message}")]
    StreamError {
        model: String,
        code: String,
        message: String,
    },

    #[error("Runtime error: {0}")]
    Runtime(String),

    /// 所有候选模型均失败，携带最后尝试的模型与原因
    #[error("Agent execution failed after retries: all models failed, last model {model}: {cause}")]
    Exhausted {
        model: String,
        #[source]
        cause: Box<AgentError>,
    },
}

impl AgentError {
    /// 是否应切换到下一个模型重试
    pub fn triggers_fallback(&self) -> bool {
        !matches!(
            self,
            AgentError::Disabled(_) | AgentError::ConfigError(_) | AgentError::Exhausted { .. }
        )
    }
}
