//! SQLite 会话存储
//!
//! 会话元数据与事件历史分表保存，服务重启后可恢复。rusqlite 为同步接口，所有调用经 spawn_blocking 执行。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{resolve_session_id, Session, SessionError, SessionKey, SessionService};
use crate::runtime::AgentEvent;

pub struct SqliteSessionService {
    conn: Arc<Mutex<Connection>>,
}

fn storage(e: rusqlite::Error) -> SessionError {
    SessionError::Storage(e.to_string())
}

impl SqliteSessionService {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SessionError::Storage(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, SessionError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                app_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                id TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (app_name, user_id, id)
            );
            CREATE TABLE IF NOT EXISTS session_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                app_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                event TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_session_events_session
                ON session_events(app_name, user_id, session_id);",
        )
        .map_err(storage)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Connection) -> Result<T, SessionError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| SessionError::Storage("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?
    }
}

fn load_session(conn: &Connection, key: &SessionKey) -> Result<Option<Session>, SessionError> {
    let row = conn
        .query_row(
            "SELECT state, updated_at FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
            params![key.app_name, key.user_id, key.session_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, DateTime<Utc>>(1)?)),
        )
        .optional()
        .map_err(storage)?;

    let Some((state_json, updated_at)) = row else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare(
            "SELECT event FROM session_events
             WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3
             ORDER BY seq ASC",
        )
        .map_err(storage)?;
    let raw_events = stmt
        .query_map(params![key.app_name, key.user_id, key.session_id], |row| {
            row.get::<_, String>(0)
        })
        .map_err(storage)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage)?;

    let events = raw_events
        .iter()
        .map(|raw| serde_json::from_str::<AgentEvent>(raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Session {
        id: key.session_id.clone(),
        app_name: key.app_name.clone(),
        user_id: key.user_id.clone(),
        state: serde_json::from_str(&state_json)?,
        events,
        last_update_time: updated_at,
    }))
}

#[async_trait]
impl SessionService for SqliteSessionService {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        if key.session_id.is_empty() {
            tracing::warn!("get_session called without session_id");
            return Ok(None);
        }
        let key = key.clone();
        self.with_conn(move |conn| load_session(conn, &key)).await
    }

    async fn create_session(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let key = SessionKey {
            session_id: resolve_session_id(&key.session_id),
            ..key.clone()
        };
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT OR IGNORE INTO sessions (app_name, user_id, id, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '{}', ?4, ?4)",
                params![key.app_name, key.user_id, key.session_id, now],
            )
            .map_err(storage)?;
            load_session(conn, &key)?.ok_or_else(|| SessionError::NotFound(key.session_id.clone()))
        })
        .await
    }

    async fn append_event(&self, key: &SessionKey, event: &AgentEvent) -> Result<(), SessionError> {
        let key = key.clone();
        let raw = serde_json::to_string(event)?;
        self.with_conn(move |conn| {
            let now = Utc::now();
            let updated = conn
                .execute(
                    "UPDATE sessions SET updated_at = ?4 WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                    params![key.app_name, key.user_id, key.session_id, now],
                )
                .map_err(storage)?;
            if updated == 0 {
                return Err(SessionError::NotFound(key.session_id.clone()));
            }
            conn.execute(
                "INSERT INTO session_events (app_name, user_id, session_id, event, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![key.app_name, key.user_id, key.session_id, raw, now],
            )
            .map_err(storage)?;
            Ok(())
        })
        .await
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM session_events WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![key.app_name, key.user_id, key.session_id],
            )
            .map_err(storage)?;
            conn.execute(
                "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                params![key.app_name, key.user_id, key.session_id],
            )
            .map_err(storage)?;
            Ok(())
        })
        .await
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let app_name = app_name.to_string();
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, state, updated_at FROM sessions
                     WHERE app_name = ?1 AND user_id = ?2 ORDER BY id ASC",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(params![app_name, user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, DateTime<Utc>>(2)?,
                    ))
                })
                .map_err(storage)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(storage)?;

            rows.into_iter()
                .map(|(id, state, updated_at)| -> Result<Session, SessionError> {
                    Ok(Session {
                        id,
                        app_name: app_name.clone(),
                        user_id: user_id.clone(),
                        state: serde_json::from_str(&state)?,
                        events: Vec::new(),
                        last_update_time: updated_at,
                    })
                })
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Content;

    fn key(id: &str) -> SessionKey {
        SessionKey::new("finance-agent", "user", id)
    }

    #[tokio::test]
    async fn test_create_get_append() {
        let store = SqliteSessionService::open_in_memory().unwrap();
        assert!(store.get_session(&key("s1")).await.unwrap().is_none());

        let created = store.create_session(&key("s1")).await.unwrap();
        assert_eq!(created.id, "s1");
        assert!(created.events.is_empty());

        let ev = AgentEvent::new("inv", "user", Content::user_text("hi"));
        store.append_event(&key("s1"), &ev).await.unwrap();
        let reply = AgentEvent::new("inv", "financeExpert", Content::model_text("hello"));
        store.append_event(&key("s1"), &reply).await.unwrap();

        let loaded = store.get_session(&key("s1")).await.unwrap().unwrap();
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.events[1].response_text().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_append_unknown_session_is_not_found() {
        let store = SqliteSessionService::open_in_memory().unwrap();
        let ev = AgentEvent::new("inv", "user", Content::user_text("hi"));
        let err = store.append_event(&key("nope"), &ev).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        {
            let store = SqliteSessionService::open(&path).unwrap();
            store.create_session(&key("keep")).await.unwrap();
            let ev = AgentEvent::new("inv", "user", Content::user_text("remember me"));
            store.append_event(&key("keep"), &ev).await.unwrap();
        }
        let store = SqliteSessionService::open(&path).unwrap();
        let loaded = store.get_session(&key("keep")).await.unwrap().unwrap();
        assert_eq!(loaded.events.len(), 1);

        let listed = store.list_sessions("finance-agent", "user").await.unwrap();
        assert_eq!(listed.len(), 1);

        store.delete_session(&key("keep")).await.unwrap();
        assert!(store.get_session(&key("keep")).await.unwrap().is_none());
    }
}
