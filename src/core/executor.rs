//! RequestExecutor：带模型回退的请求执行循环
//!
//! 每次尝试：确保会话存在（失败仅记录）→ 为当前模型构建运行时 → 提交消息 → 拉取事件流。
//! 流内错误事件、提交 / 消费时的异常、以及空回复都会推进到下一个模型重试；
//! 尝试次数以回退列表长度为上限，列表耗尽时返回带最后模型名的 Exhausted 错误。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use crate::config::FallbackScope;
use crate::core::normalize::{normalize, NormalizedResult};
use crate::core::roster::{FallbackCursor, ModelRoster};
use crate::core::AgentError;
use crate::runtime::{AgentFactory, AgentRuntime, Content};
use crate::session::{SessionKey, SessionService};

/// 所有模型都没有产出文本时返回给调用方的固定文本
pub const NO_RESPONSE_FALLBACK: &str = "I'm sorry, I couldn't generate a response at this time.";

/// 一次顶层请求的执行状态，终止时销毁
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
    pub session_id: String,
    pub prompt: String,
    /// 已完成的重试次数（首次尝试为 0）
    pub attempt: usize,
}

/// 单次尝试消费事件流后的结果
#[derive(Debug, PartialEq)]
enum AttemptOutcome {
    /// 最后一个带文本的事件的文本
    Text(String),
    Empty,
    Errored { code: String, message: String },
}

pub struct RequestExecutor {
    roster: ModelRoster,
    factory: Arc<dyn AgentFactory>,
    sessions: Arc<dyn SessionService>,
    app_name: String,
    user_id: String,
    scope: FallbackScope,
    shared_index: AtomicUsize,
}

impl RequestExecutor {
    pub fn new(
        roster: ModelRoster,
        factory: Arc<dyn AgentFactory>,
        sessions: Arc<dyn SessionService>,
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        scope: FallbackScope,
    ) -> Self {
        Self {
            roster,
            factory,
            sessions,
            app_name: app_name.into(),
            user_id: user_id.into(),
            scope,
            shared_index: AtomicUsize::new(0),
        }
    }

    /// Process 作用域下下一个请求将使用的模型
    pub fn current_model(&self) -> &str {
        match self.scope {
            FallbackScope::Request => self.roster.get(0),
            FallbackScope::Process => self.roster.get(self.shared_index.load(Ordering::SeqCst)),
        }
    }

    /// 将共享回退位置复位到第一个模型（仅 Process 作用域有意义）
    pub fn reset_fallback(&self) {
        self.shared_index.store(0, Ordering::SeqCst);
    }

    fn cursor(&self) -> FallbackCursor<'_> {
        match self.scope {
            FallbackScope::Request => FallbackCursor::per_request(&self.roster),
            FallbackScope::Process => FallbackCursor::shared(&self.roster, &self.shared_index),
        }
    }

    /// 执行一次逻辑请求；只有回退列表耗尽（或 Agent 被禁用）时返回错误
    pub async fn execute(
        &self,
        session_id: &str,
        prompt: &str,
    ) -> Result<NormalizedResult, AgentError> {
        let mut cursor = self.cursor();
        let mut state = ExecutionAttempt {
            session_id: session_id.to_string(),
            prompt: prompt.to_string(),
            attempt: 0,
        };

        loop {
            let model = cursor.model();
            tracing::info!(
                "Running agent | Session: {} | Model: {} | Attempt: {}",
                state.session_id,
                model,
                state.attempt + 1
            );

            let failure = match self.run_attempt(model, &state).await {
                Ok(AttemptOutcome::Text(text)) => return Ok(normalize(&text)),
                Ok(AttemptOutcome::Empty) => {
                    tracing::warn!("Agent execution completed but no text response was captured");
                    if state.attempt < self.roster.len() && cursor.advance() {
                        tracing::warn!(
                            "Empty response, switching to fallback model: {}",
                            cursor.model()
                        );
                        state.attempt += 1;
                        continue;
                    }
                    return Ok(NormalizedResult::Text(NO_RESPONSE_FALLBACK.to_string()));
                }
                Ok(AttemptOutcome::Errored { code, message }) => {
                    tracing::warn!("Encountered error code {} with model {}", code, model);
                    AgentError::StreamError {
                        model: model.to_string(),
                        code,
                        message,
                    }
                }
                Err(e) if !e.triggers_fallback() => return Err(e),
                Err(e) => {
                    tracing::error!("Error running agent with {}: {}", model, e);
                    e
                }
            };

            if cursor.advance() {
                tracing::warn!("Switching to fallback model: {}", cursor.model());
                state.attempt += 1;
                continue;
            }

            tracing::error!("All fallback models exhausted");
            return Err(AgentError::Exhausted {
                model: model.to_string(),
                cause: Box::new(failure),
            });
        }
    }

    async fn run_attempt(
        &self,
        model: &str,
        state: &ExecutionAttempt,
    ) -> Result<AttemptOutcome, AgentError> {
        let runtime = self.factory.build(model)?;
        self.ensure_session(&state.session_id).await;
        consume(runtime.as_ref(), &self.user_id, state).await
    }

    /// 会话存在性检查：不存在则创建；任何错误只记录，不影响执行
    async fn ensure_session(&self, session_id: &str) {
        let key = SessionKey::new(&self.app_name, &self.user_id, session_id);
        match self.sessions.get_session(&key).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!("Creating new session: {}", session_id);
                if let Err(e) = self.sessions.create_session(&key).await {
                    tracing::error!("Error managing session {}: {}", session_id, e);
                }
            }
            Err(e) => tracing::error!("Error managing session {}: {}", session_id, e),
        }
    }
}

/// 拉取事件流：遇到错误事件立即停止；文本以最后一个带文本事件为准（覆盖而非追加）
async fn consume(
    runtime: &dyn AgentRuntime,
    user_id: &str,
    state: &ExecutionAttempt,
) -> Result<AttemptOutcome, AgentError> {
    let mut events = runtime
        .run(user_id, &state.session_id, Content::user_text(&state.prompt))
        .await?;

    let mut last_text: Option<String> = None;
    while let Some(item) = events.next().await {
        let event = item?;
        tracing::debug!("Received event: {:?}", event);

        if event.is_error() {
            return Ok(AttemptOutcome::Errored {
                code: event.error_code.unwrap_or_default(),
                message: event.error_message.unwrap_or_default(),
            });
        }
        if let Some(text) = event.response_text() {
            last_text = Some(text);
        }
    }

    Ok(match last_text {
        Some(text) => AttemptOutcome::Text(text),
        None => AttemptOutcome::Empty,
    })
}
