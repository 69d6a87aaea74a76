//! Runner：单模型 Agent 运行时
//!
//! run() 立即返回事件流，后台任务依次：读取会话历史 → 写入用户事件 → 调用 LLM →
//! 若输出为 Tool Call 则执行工具并继续，否则输出模型回复。LLM 错误以流内错误事件返回。
//! 事件经容量为 1 的通道传递，消费方每拉取一个事件，运行时才继续产生下一个。
//! 一次调用的事件（用户消息、工具调用与结果、回复）只在以非空回复结束时整体写入会话，
//! 失败或空回复的调用不留痕迹，回退到下一个模型时看到的历史与首次尝试一致。

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream, Stream};
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::runtime::{AgentEvent, Content, Part};
use crate::session::{Session, SessionKey, SessionService};
use crate::tools::{parse_tool_call, tool_call_schema_json, ToolRegistry};

/// 运行时事件流：Err 表示传输 / 运行时异常
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

/// Agent 运行时接口：提交一条新消息，返回事件流
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// 运行时绑定的模型
    fn model(&self) -> &str;

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Content,
    ) -> Result<EventStream, AgentError>;
}

/// Runner 的静态参数
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app_name: String,
    pub agent_name: String,
    pub instruction: String,
    pub max_tool_steps: usize,
}

struct RunnerCore {
    config: RunnerConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionService>,
}

pub struct Runner {
    core: Arc<RunnerCore>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            core: Arc::new(RunnerCore {
                config,
                llm,
                tools,
                sessions,
            }),
        }
    }
}

#[async_trait]
impl AgentRuntime for Runner {
    fn model(&self) -> &str {
        self.core.llm.model()
    }

    async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Content,
    ) -> Result<EventStream, AgentError> {
        let key = SessionKey::new(&self.core.config.app_name, user_id, session_id);
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(self.core.clone().drive(key, new_message, tx));

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

type EventSender = mpsc::Sender<Result<AgentEvent, AgentError>>;

impl RunnerCore {
    async fn drive(self: Arc<Self>, key: SessionKey, new_message: Content, tx: EventSender) {
        let invocation_id = format!("e-{}", uuid::Uuid::new_v4());
        let agent = self.config.agent_name.as_str();

        let session = match self.sessions.get_session(&key).await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                tracing::warn!(
                    "Session {} not found, running without history",
                    key.session_id
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load session {}, running without history: {}",
                    key.session_id,
                    e
                );
                None
            }
        };
        let persist = session.is_some();

        let mut messages = self.build_messages(session.as_ref(), &new_message);
        let mut pending = vec![AgentEvent::new(&invocation_id, "user", new_message)];

        for _ in 0..self.config.max_tool_steps {
            let reply = match self.llm.complete(&messages).await {
                Ok(reply) => {
                    let (prompt, completion, total) = self.llm.token_usage();
                    tracing::debug!(
                        "Token usage for {}: prompt {} / completion {} / total {}",
                        self.llm.model(),
                        prompt,
                        completion,
                        total
                    );
                    reply
                }
                Err(e) => {
                    let event =
                        AgentEvent::error(&invocation_id, agent, e.error_code(), e.to_string());
                    let _ = tx.send(Ok(event)).await;
                    return;
                }
            };

            let Some(call) = parse_tool_call(&reply).filter(|c| self.tools.contains(&c.tool)) else {
                let event = AgentEvent::new(&invocation_id, agent, Content::model_text(reply));
                if persist && event.response_text().is_some() {
                    pending.push(event.clone());
                    self.commit(&key, pending).await;
                }
                let _ = tx.send(Ok(event)).await;
                return;
            };

            tracing::debug!("Tool call: {} {}", call.tool, call.args);
            let call_event = AgentEvent::new(
                &invocation_id,
                agent,
                Content {
                    role: "model".to_string(),
                    parts: vec![Part::FunctionCall {
                        name: call.tool.clone(),
                        args: call.args.clone(),
                    }],
                },
            );
            if !emit(&tx, &mut pending, call_event).await {
                return;
            }

            let response = match self.tools.execute(&call.tool, call.args.clone()).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Tool {} failed: {}", call.tool, e);
                    json!({ "error": e })
                }
            };
            let response_event = AgentEvent::new(
                &invocation_id,
                agent,
                Content {
                    role: "user".to_string(),
                    parts: vec![Part::FunctionResponse {
                        name: call.tool.clone(),
                        response: response.clone(),
                    }],
                },
            );
            if !emit(&tx, &mut pending, response_event).await {
                return;
            }

            messages.push(Message::assistant(reply));
            messages.push(Message::user(format!(
                "Tool result from {}: {}",
                call.tool, response
            )));
        }

        let event = AgentEvent::error(
            &invocation_id,
            agent,
            "MAX_TOOL_STEPS",
            format!(
                "tool loop exceeded {} steps without a final answer",
                self.config.max_tool_steps
            ),
        );
        let _ = tx.send(Ok(event)).await;
    }

    /// system（instruction + 工具清单 + 调用格式）+ 会话中的文本历史 + 新消息
    fn build_messages(&self, session: Option<&Session>, new_message: &Content) -> Vec<Message> {
        let mut system = self.config.instruction.clone();
        if !self.tools.is_empty() {
            system.push_str("\n\nAvailable tools:\n");
            system.push_str(&self.tools.to_schema_json());
            system.push_str(
                "\n\nTo call a tool, reply with ONLY one JSON object matching this schema:\n",
            );
            system.push_str(&tool_call_schema_json());
            system.push_str("\nOtherwise answer the user directly.");
        }

        let mut messages = vec![Message::system(system)];
        if let Some(session) = session {
            for event in session.events.iter().filter(|e| !e.is_error()) {
                let Some(text) = event.content.as_ref().and_then(Content::text) else {
                    continue;
                };
                if event.is_from_user() {
                    messages.push(Message::user(text));
                } else {
                    messages.push(Message::assistant(text));
                }
            }
        }
        if let Some(text) = new_message.text() {
            messages.push(Message::user(text));
        }
        messages
    }

    /// 按顺序写入本次调用的全部事件；写入失败只记录
    async fn commit(&self, key: &SessionKey, events: Vec<AgentEvent>) {
        for event in &events {
            if let Err(e) = self.sessions.append_event(key, event).await {
                tracing::warn!("Failed to append event to session {}: {}", key.session_id, e);
                return;
            }
        }
    }
}

/// 暂存事件并推送给消费方；消费方已停止拉取时返回 false
async fn emit(tx: &EventSender, pending: &mut Vec<AgentEvent>, event: AgentEvent) -> bool {
    pending.push(event.clone());
    tx.send(Ok(event)).await.is_ok()
}
