//! Agent 运行时事件：流式返回给执行器，并作为会话历史持久化

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 事件内容中的一段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    FunctionCall { name: String, args: Value },
    FunctionResponse { name: String, response: Value },
}

/// 一条消息内容：角色（user / model）+ 若干 Part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// 拼接所有非空文本片段；没有文本时返回 None
    pub fn text(&self) -> Option<String> {
        let joined: String = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// 运行时产生的单个事件：错误（error_code）或内容（content）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub id: String,
    pub invocation_id: String,
    /// "user" 或 Agent 名
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentEvent {
    pub fn new(invocation_id: &str, author: &str, content: Content) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.to_string(),
            author: author.to_string(),
            timestamp: Utc::now(),
            content: Some(content),
            error_code: None,
            error_message: None,
        }
    }

    pub fn error(
        invocation_id: &str,
        author: &str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.to_string(),
            author: author.to_string(),
            timestamp: Utc::now(),
            content: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }

    pub fn is_from_user(&self) -> bool {
        self.author == "user"
    }

    /// 模型回复中的文本（用户事件与纯工具事件返回 None）
    pub fn response_text(&self) -> Option<String> {
        if self.is_from_user() {
            return None;
        }
        self.content.as_ref().and_then(Content::text)
    }
}
