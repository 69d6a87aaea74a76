//! financeExpert Agent：DTO、Prompt、AgentService 与按配置组装
//!
//! build_agent_service 从 AppConfig 组装 会话存储 → 工具 → AgentFactory → RequestExecutor → AgentService，
//! 供 HTTP 入口与集成测试共用。

pub mod dto;
pub mod prompts;
pub mod service;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentError, ModelRoster, RequestExecutor};
use crate::runtime::{AgentFactory, LlmAgentFactory, RunnerConfig};
use crate::session::{create_session_service, SessionService};
use crate::tools::default_registry;

pub use dto::{
    AnalysisOutcome, AnalysisPeriod, AnalysisRequest, AnalysisResponse, ChatRequest, ChatResponse,
    FinancialContext, Forecast, Goal, Insight, InsightType, RiskProfile, Sentiment, Transaction,
    UserProfile,
};
pub use prompts::{analysis_prompt, chat_prompt, load_instruction, FINANCE_EXPERT_INSTRUCTION};
pub use service::AgentService;

/// 按配置组装默认 AgentService；回退列表为空、工具步数或请求超时为 0 时返回 ConfigError
pub fn build_agent_service(cfg: &AppConfig) -> Result<AgentService, AgentError> {
    validate(cfg)?;
    let sessions = create_session_service(&cfg.session);
    let runner = RunnerConfig {
        app_name: cfg.app.name.clone(),
        agent_name: cfg.agent.name.clone(),
        instruction: load_instruction(),
        max_tool_steps: cfg.agent.max_tool_steps,
    };
    let factory = LlmAgentFactory::new(
        cfg.llm.clone(),
        cfg.llm.api_key(),
        runner,
        Arc::new(default_registry(cfg.agent.enable_finance_tools)),
        sessions.clone(),
    );
    build_with_factory(cfg, Arc::new(factory), sessions)
}

/// 使用自定义 AgentFactory 组装（测试中替换 LLM）
pub fn build_with_factory(
    cfg: &AppConfig,
    factory: Arc<dyn AgentFactory>,
    sessions: Arc<dyn SessionService>,
) -> Result<AgentService, AgentError> {
    validate(cfg)?;
    let roster = ModelRoster::new(cfg.llm.models.clone())?;
    tracing::info!(
        "Model roster: {} (fallback scope: {:?})",
        roster.models().join(", "),
        cfg.agent.fallback_scope
    );

    let executor = RequestExecutor::new(
        roster,
        factory,
        sessions,
        cfg.app.name.clone(),
        cfg.app.user_id.clone(),
        cfg.agent.fallback_scope,
    );
    Ok(AgentService::new(Arc::new(executor)))
}

/// 为 0 时每次请求都必然失败，启动时拒绝
fn validate(cfg: &AppConfig) -> Result<(), AgentError> {
    if cfg.agent.max_tool_steps == 0 {
        return Err(AgentError::ConfigError(
            "agent.max_tool_steps must be at least 1".to_string(),
        ));
    }
    if cfg.llm.timeouts.request == 0 {
        return Err(AgentError::ConfigError(
            "llm.timeouts.request must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}
