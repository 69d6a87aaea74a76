//! 会话存储抽象层
//!
//! 定义统一的会话管理接口（get / create / append_event / delete / list），支持内存和 SQLite 两种实现

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SessionBackend, SessionSection};
use crate::runtime::AgentEvent;

pub use memory::InMemorySessionService;
pub use sqlite::SqliteSessionService;

/// 会话定位键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// 会话记录：状态 + 事件历史
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    #[serde(default)]
    pub state: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub events: Vec<AgentEvent>,
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    pub fn new(app_name: &str, user_id: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state: serde_json::Map::new(),
            events: Vec::new(),
            last_update_time: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 会话存储接口
#[async_trait]
pub trait SessionService: Send + Sync {
    /// 获取会话；不存在返回 None
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError>;

    /// 创建会话：沿用请求的 session_id（为空时生成 UUID）；已存在时返回现有会话
    async fn create_session(&self, key: &SessionKey) -> Result<Session, SessionError>;

    /// 追加事件到会话历史
    async fn append_event(&self, key: &SessionKey, event: &AgentEvent) -> Result<(), SessionError>;

    async fn delete_session(&self, key: &SessionKey) -> Result<(), SessionError>;

    /// 列出某用户的会话（不含事件）
    async fn list_sessions(&self, app_name: &str, user_id: &str)
        -> Result<Vec<Session>, SessionError>;
}

/// 空 session_id 时生成新的 UUID
pub(crate) fn resolve_session_id(requested: &str) -> String {
    if requested.trim().is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        requested.to_string()
    }
}

/// 按配置创建会话存储；SQLite 打开失败时回退到内存存储
pub fn create_session_service(section: &SessionSection) -> Arc<dyn SessionService> {
    if section.backend == SessionBackend::Sqlite {
        match SqliteSessionService::open(&section.path) {
            Ok(store) => {
                tracing::info!("Using SQLite session store: {:?}", section.path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite session store, falling back to memory: {}", e);
            }
        }
    }

    tracing::info!("Using in-memory session store");
    Arc::new(InMemorySessionService::new())
}
