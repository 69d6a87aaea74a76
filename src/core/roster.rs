//! 模型回退列表
//!
//! ModelRoster 在启动时固定，顺序即回退顺序；FallbackCursor 只向前移动，
//! 可选地把位置写回进程级共享索引（FallbackScope::Process）。

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::AgentError;

/// 有序、非空的模型 ID 列表
#[derive(Debug, Clone)]
pub struct ModelRoster {
    models: Vec<String>,
}

impl ModelRoster {
    pub fn new(models: Vec<String>) -> Result<Self, AgentError> {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(AgentError::ConfigError(
                "model roster must contain at least one model".to_string(),
            ));
        }
        Ok(Self { models })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// 构造时保证非空，恒为 false
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// 越界时夹到最后一个模型，保证返回值合法
    pub fn get(&self, index: usize) -> &str {
        let idx = index.min(self.models.len() - 1);
        &self.models[idx]
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

/// 单个逻辑请求的回退位置
pub struct FallbackCursor<'a> {
    roster: &'a ModelRoster,
    index: usize,
    shared: Option<&'a AtomicUsize>,
}

impl<'a> FallbackCursor<'a> {
    /// 每个请求独立：从第一个模型开始
    pub fn per_request(roster: &'a ModelRoster) -> Self {
        Self {
            roster,
            index: 0,
            shared: None,
        }
    }

    /// 进程共享：从共享索引当前位置开始，前进时写回
    pub fn shared(roster: &'a ModelRoster, shared: &'a AtomicUsize) -> Self {
        let mut index = shared.load(Ordering::SeqCst);
        if index >= roster.len() {
            index = 0;
            shared.store(0, Ordering::SeqCst);
        }
        Self {
            roster,
            index,
            shared: Some(shared),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn model(&self) -> &'a str {
        self.roster.get(self.index)
    }

    pub fn has_next(&self) -> bool {
        self.next_index() < self.roster.len()
    }

    /// 前进到下一个模型；已是最后一个时返回 false 且不移动
    pub fn advance(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.index = self.next_index();
        if let Some(shared) = self.shared {
            shared.fetch_max(self.index, Ordering::SeqCst);
        }
        true
    }

    /// 共享模式下其他请求可能已推进了全局位置，取两者较大者再 +1
    fn next_index(&self) -> usize {
        let base = match self.shared {
            Some(shared) => self.index.max(shared.load(Ordering::SeqCst)),
            None => self.index,
        };
        base + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> ModelRoster {
        ModelRoster::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_empty_roster_is_config_error() {
        let err = ModelRoster::new(vec![" ".into()]).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn test_cursor_advances_forward_only() {
        let r = roster(&["m0", "m1", "m2"]);
        let mut cursor = FallbackCursor::per_request(&r);
        assert_eq!(cursor.model(), "m0");
        assert!(cursor.advance());
        assert_eq!(cursor.model(), "m1");
        assert!(cursor.advance());
        assert_eq!(cursor.model(), "m2");
        assert!(!cursor.advance());
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn test_single_model_has_no_next() {
        let r = roster(&["only"]);
        let mut cursor = FallbackCursor::per_request(&r);
        assert!(!cursor.has_next());
        assert!(!cursor.advance());
        assert_eq!(cursor.model(), "only");
    }

    #[test]
    fn test_shared_cursor_persists_position() {
        let r = roster(&["m0", "m1", "m2"]);
        let shared = AtomicUsize::new(0);
        {
            let mut first = FallbackCursor::shared(&r, &shared);
            assert!(first.advance());
        }
        let second = FallbackCursor::shared(&r, &shared);
        assert_eq!(second.model(), "m1");
    }

    #[test]
    fn test_shared_cursor_skips_past_concurrent_advance() {
        let r = roster(&["m0", "m1", "m2", "m3"]);
        let shared = AtomicUsize::new(0);
        let mut a = FallbackCursor::shared(&r, &shared);
        let mut b = FallbackCursor::shared(&r, &shared);
        assert!(a.advance());
        assert!(b.advance());
        assert_eq!(a.model(), "m1");
        assert_eq!(b.model(), "m2");
        assert_eq!(shared.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_cursor_resets_out_of_range_index() {
        let r = roster(&["m0", "m1"]);
        let shared = AtomicUsize::new(9);
        let cursor = FallbackCursor::shared(&r, &shared);
        assert_eq!(cursor.index(), 0);
    }
}
