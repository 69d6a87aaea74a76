//! AgentService：analyze / chat 两个用例，构造 Prompt 后交给 RequestExecutor

use std::sync::Arc;

use crate::agent::dto::{AnalysisOutcome, AnalysisRequest, AnalysisResponse, ChatRequest, ChatResponse};
use crate::agent::prompts::{analysis_prompt, chat_prompt};
use crate::core::{AgentError, NormalizedResult, RequestExecutor};

pub struct AgentService {
    executor: Arc<RequestExecutor>,
}

impl AgentService {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// 每次分析使用独立会话 `analysis-<unix millis>`
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AgentError> {
        let prompt = analysis_prompt(request).map_err(|e| AgentError::Runtime(e.to_string()))?;
        let session_id = format!("analysis-{}", chrono::Utc::now().timestamp_millis());

        let result = self.executor.execute(&session_id, &prompt).await?;
        Ok(into_analysis(result))
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let prompt = chat_prompt(&request.message, request.context_snapshot.as_ref())
            .map_err(|e| AgentError::Runtime(e.to_string()))?;

        let result = self.executor.execute(&request.session_id, &prompt).await?;
        Ok(ChatResponse {
            text: result.into_text(),
        })
    }
}

fn into_analysis(result: NormalizedResult) -> AnalysisOutcome {
    match result {
        NormalizedResult::Structured(value) => {
            match serde_json::from_value::<AnalysisResponse>(value.clone()) {
                Ok(typed) => AnalysisOutcome::Typed(typed),
                Err(e) => {
                    tracing::warn!("Analysis result does not match AnalysisResponse ({}), passing through", e);
                    AnalysisOutcome::Raw(value)
                }
            }
        }
        NormalizedResult::Text(text) => {
            tracing::warn!("Analysis result is plain text, passing through");
            AnalysisOutcome::Raw(serde_json::Value::String(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackScope;
    use crate::core::ModelRoster;
    use crate::llm::{LlmClient, Role, ScriptedLlmClient};
    use crate::runtime::{AgentFactory, AgentRuntime, Runner, RunnerConfig};
    use crate::session::{InMemorySessionService, SessionKey, SessionService};
    use crate::tools::ToolRegistry;
    use serde_json::json;

    /// 所有模型共享同一个脚本化 LLM
    struct ScriptedFactory {
        llm: Arc<ScriptedLlmClient>,
        sessions: Arc<dyn SessionService>,
    }

    impl AgentFactory for ScriptedFactory {
        fn build(&self, _model: &str) -> Result<Arc<dyn AgentRuntime>, AgentError> {
            Ok(Arc::new(Runner::new(
                RunnerConfig {
                    app_name: "finance-agent".into(),
                    agent_name: "financeExpert".into(),
                    instruction: "test".into(),
                    max_tool_steps: 3,
                },
                self.llm.clone() as Arc<dyn LlmClient>,
                Arc::new(ToolRegistry::new()),
                self.sessions.clone(),
            )))
        }
    }

    fn service(replies: Vec<&str>) -> (AgentService, Arc<ScriptedLlmClient>, Arc<InMemorySessionService>) {
        let llm = Arc::new(ScriptedLlmClient::new(
            "gemini-2.5-flash",
            replies.into_iter().map(|r| Ok(r.to_string())).collect(),
        ));
        let sessions = Arc::new(InMemorySessionService::new());
        let factory = Arc::new(ScriptedFactory {
            llm: llm.clone(),
            sessions: sessions.clone(),
        });
        let executor = RequestExecutor::new(
            ModelRoster::new(vec!["gemini-2.5-flash".into()]).unwrap(),
            factory,
            sessions.clone(),
            "finance-agent",
            "user",
            FallbackScope::Request,
        );
        (AgentService::new(Arc::new(executor)), llm, sessions)
    }

    fn analysis_request() -> AnalysisRequest {
        serde_json::from_value(json!({
            "period": "current_month",
            "userProfile": { "name": "Ana", "riskProfile": "aggressive" },
            "financialContext": { "transactions": [], "activeGoals": [], "monthlyIncome": 5000 }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_chat_returns_text_and_uses_session() {
        let (svc, llm, sessions) = service(vec!["You can save 200 this month."]);
        let req = ChatRequest {
            session_id: "chat-42".into(),
            message: "How much can I save?".into(),
            context_snapshot: json!({ "balance": 1500 }).as_object().cloned(),
        };
        let resp = svc.chat(&req).await.unwrap();
        assert_eq!(resp.text, "You can save 200 this month.");

        let last_user = llm
            .received()
            .into_iter()
            .last()
            .and_then(|msgs| msgs.into_iter().filter(|m| m.role == Role::User).last())
            .unwrap();
        assert_eq!(
            last_user.content,
            "Context Snapshot: {\"balance\":1500}\nUser: How much can I save?"
        );

        let key = SessionKey::new("finance-agent", "user", "chat-42");
        assert!(sessions.get_session(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_chat_reserializes_structured_reply() {
        let (svc, _, _) = service(vec!["```json\n{\"tip\": \"save\"}\n```"]);
        let req = ChatRequest {
            session_id: "s".into(),
            message: "tip?".into(),
            context_snapshot: None,
        };
        assert_eq!(svc.chat(&req).await.unwrap().text, r#"{"tip":"save"}"#);
    }

    #[tokio::test]
    async fn test_analyze_returns_typed_response() {
        let reply = r#"{"sentiment":"positive","summary":"On track","insights":[{"type":"goal_risk","message":"m","actionableStep":"a"}],"forecast":{"endOfMonthBalanceEstimate":1200}}"#;
        let (svc, _, sessions) = service(vec![reply]);
        match svc.analyze(&analysis_request()).await.unwrap() {
            AnalysisOutcome::Typed(resp) => {
                assert_eq!(resp.summary, "On track");
                assert_eq!(resp.forecast.end_of_month_balance_estimate, 1200.0);
            }
            other => panic!("expected typed response, got {other:?}"),
        }

        let listed = sessions.list_sessions("finance-agent", "user").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].id.starts_with("analysis-"));
    }

    #[tokio::test]
    async fn test_analyze_passes_through_off_schema_result() {
        let (svc, _, _) = service(vec![r#"{"verdict": "fine"}"#]);
        let outcome = svc.analyze(&analysis_request()).await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::Raw(json!({"verdict": "fine"})));

        let (svc, _, _) = service(vec!["Not JSON at all"]);
        let outcome = svc.analyze(&analysis_request()).await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::Raw(json!("Not JSON at all")));
    }
}
