//! AgentFactory：按模型名构建运行时（切换回退模型时重新初始化）

use std::sync::Arc;

use crate::config::LlmSection;
use crate::core::AgentError;
use crate::llm::{create_gemini_client, LlmClient, MockLlmClient};
use crate::runtime::{AgentRuntime, Runner, RunnerConfig};
use crate::session::SessionService;
use crate::tools::ToolRegistry;

pub trait AgentFactory: Send + Sync {
    fn build(&self, model: &str) -> Result<Arc<dyn AgentRuntime>, AgentError>;
}

/// 默认工厂：gemini 走 OpenAI 兼容客户端，mock 走本地回显；API Key 缺失时处于禁用状态
pub struct LlmAgentFactory {
    llm: LlmSection,
    api_key: Option<String>,
    runner: RunnerConfig,
    tools: Arc<ToolRegistry>,
    sessions: Arc<dyn SessionService>,
}

impl LlmAgentFactory {
    pub fn new(
        llm: LlmSection,
        api_key: Option<String>,
        runner: RunnerConfig,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionService>,
    ) -> Self {
        if api_key.is_none() && !llm.is_mock() {
            tracing::error!(
                "{} is missing! Agent functionality will be disabled.",
                llm.api_key_env
            );
        }
        Self {
            llm,
            api_key,
            runner,
            tools,
            sessions,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.api_key.is_none() && !self.llm.is_mock()
    }
}

impl AgentFactory for LlmAgentFactory {
    fn build(&self, model: &str) -> Result<Arc<dyn AgentRuntime>, AgentError> {
        let llm: Arc<dyn LlmClient> = if self.llm.is_mock() {
            Arc::new(MockLlmClient::new(model))
        } else {
            let Some(api_key) = self.api_key.as_deref() else {
                return Err(AgentError::Disabled(format!(
                    "{} is not set",
                    self.llm.api_key_env
                )));
            };
            Arc::new(create_gemini_client(&self.llm, model, api_key))
        };

        tracing::info!("Initializing agent with model: {}", model);
        Ok(Arc::new(Runner::new(
            self.runner.clone(),
            llm,
            self.tools.clone(),
            self.sessions.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionService;

    fn factory(provider: &str, api_key: Option<&str>) -> LlmAgentFactory {
        let llm = LlmSection {
            provider: provider.to_string(),
            ..LlmSection::default()
        };
        LlmAgentFactory::new(
            llm,
            api_key.map(String::from),
            RunnerConfig {
                app_name: "finance-agent".into(),
                agent_name: "financeExpert".into(),
                instruction: "test".into(),
                max_tool_steps: 3,
            },
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemorySessionService::new()),
        )
    }

    #[test]
    fn test_missing_key_disables_gemini() {
        let f = factory("gemini", None);
        assert!(f.is_disabled());
        assert!(matches!(f.build("gemini-2.5-flash"), Err(AgentError::Disabled(_))));
    }

    #[test]
    fn test_mock_needs_no_key() {
        let f = factory("mock", None);
        assert!(!f.is_disabled());
        let runtime = f.build("mock-model").unwrap();
        assert_eq!(runtime.model(), "mock-model");
    }

    #[test]
    fn test_gemini_with_key_binds_model() {
        let f = factory("gemini", Some("key"));
        let runtime = f.build("gemini-2.0-flash").unwrap();
        assert_eq!(runtime.model(), "gemini-2.0-flash");
    }
}
