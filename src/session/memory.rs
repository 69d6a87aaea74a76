//! 内存会话存储：进程重启后丢失

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{resolve_session_id, Session, SessionError, SessionKey, SessionService};
use crate::runtime::AgentEvent;

/// (app_name, user_id, session_id) -> Session
#[derive(Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<(String, String, String), Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_key(key: &SessionKey) -> (String, String, String) {
        (
            key.app_name.clone(),
            key.user_id.clone(),
            key.session_id.clone(),
        )
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        if key.session_id.is_empty() {
            tracing::warn!("get_session called without session_id");
            return Ok(None);
        }
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&Self::map_key(key)).cloned())
    }

    async fn create_session(&self, key: &SessionKey) -> Result<Session, SessionError> {
        let id = resolve_session_id(&key.session_id);
        let map_key = (key.app_name.clone(), key.user_id.clone(), id.clone());
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(map_key)
            .or_insert_with(|| Session::new(&key.app_name, &key.user_id, &id));
        Ok(session.clone())
    }

    async fn append_event(&self, key: &SessionKey, event: &AgentEvent) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&Self::map_key(key))
            .ok_or_else(|| SessionError::NotFound(key.session_id.clone()))?;
        session.events.push(event.clone());
        session.last_update_time = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&Self::map_key(key));
        Ok(())
    }

    async fn list_sessions(
        &self,
        app_name: &str,
        user_id: &str,
    ) -> Result<Vec<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        let mut list: Vec<Session> = sessions
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .map(|s| Session {
                events: Vec::new(),
                ..s.clone()
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
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
    async fn test_create_honors_requested_id() {
        let store = InMemorySessionService::new();
        assert!(store.get_session(&key("s1")).await.unwrap().is_none());
        let created = store.create_session(&key("s1")).await.unwrap();
        assert_eq!(created.id, "s1");
        assert!(store.get_session(&key("s1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_empty_id_generates_uuid() {
        let store = InMemorySessionService::new();
        let created = store.create_session(&key("")).await.unwrap();
        assert!(!created.id.is_empty());
        assert!(store.get_session(&key(&created.id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_existing_keeps_events() {
        let store = InMemorySessionService::new();
        store.create_session(&key("s1")).await.unwrap();
        let ev = AgentEvent::new("inv", "user", Content::user_text("hi"));
        store.append_event(&key("s1"), &ev).await.unwrap();
        let again = store.create_session(&key("s1")).await.unwrap();
        assert_eq!(again.events.len(), 1);
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_fails() {
        let store = InMemorySessionService::new();
        let ev = AgentEvent::new("inv", "user", Content::user_text("hi"));
        let err = store.append_event(&key("missing"), &ev).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = InMemorySessionService::new();
        store.create_session(&key("b")).await.unwrap();
        store.create_session(&key("a")).await.unwrap();
        store
            .create_session(&SessionKey::new("finance-agent", "other", "c"))
            .await
            .unwrap();
        let ids: Vec<String> = store
            .list_sessions("finance-agent", "user")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        store.delete_session(&key("a")).await.unwrap();
        assert!(store.get_session(&key("a")).await.unwrap().is_none());
    }
}
