//! Mock LLM 客户端（用于本地运行与测试，无需 API）
//!
//! - MockLlmClient：回显最后一条 User 消息，`llm.provider = "mock"` 时使用
//! - ScriptedLlmClient：按顺序返回预设回复或错误，并记录每次收到的消息

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug)]
pub struct MockLlmClient {
    model: String,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock ({}): {}", self.model, last_user))
    }
}

/// 脚本客户端：依次弹出预设结果，用尽后返回空字符串
pub struct ScriptedLlmClient {
    model: String,
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(model: impl Into<String>, replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            model: model.into(),
            replies: Mutex::new(replies.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// 每次 complete 调用收到的完整消息列表
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages.to_vec());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }
}
