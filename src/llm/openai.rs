//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini 的 OpenAI 兼容端点即走此实现。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名，complete 时转 Message 为 API 格式并取首条 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, request_timeout: Duration) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout,
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        messages
            .iter()
            .map(|m| {
                Ok(match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.clone())
                            .build()?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.clone())
                            .build()?,
                    ),
                    Role::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.clone())
                            .build()?,
                    ),
                })
            })
            .collect()
    }

    async fn send(&self, messages: &[Message]) -> Result<String, OpenAIError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(messages)?)
            .build()?;

        let response = self.client.chat().create(request).await?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        match tokio::time::timeout(self.request_timeout, self.send(messages)).await {
            Ok(result) => result.map_err(map_openai_error),
            Err(_) => Err(LlmError::Timeout),
        }
    }
}

/// 兼容端点的错误体格式不统一（Gemini 返回数组包裹的 error），这里按文本推断 HTTP 状态
fn map_openai_error(err: OpenAIError) -> LlmError {
    let message = match &err {
        OpenAIError::ApiError(api) => api.message.clone(),
        OpenAIError::InvalidArgument(msg) => return LlmError::InvalidRequest(msg.clone()),
        other => other.to_string(),
    };
    let lower = message.to_lowercase();
    if lower.contains("error sending request") || lower.contains("connection") {
        return LlmError::NetworkError(message);
    }
    LlmError::ApiError {
        status: infer_status(&lower),
        message,
    }
}

fn infer_status(lower: &str) -> u16 {
    if lower.contains("429") || lower.contains("resource_exhausted") || lower.contains("quota") {
        429
    } else if lower.contains("404") || lower.contains("not_found") || lower.contains("not found") {
        404
    } else if lower.contains("401") || lower.contains("403") || lower.contains("permission") {
        403
    } else if lower.contains("503") || lower.contains("unavailable") || lower.contains("overloaded")
    {
        503
    } else if lower.contains("400") || lower.contains("invalid_argument") {
        400
    } else {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_status_from_provider_text() {
        assert_eq!(infer_status("429 too many requests"), 429);
        assert_eq!(infer_status("status: resource_exhausted"), 429);
        assert_eq!(infer_status("models/gemini-9 is not found"), 404);
        assert_eq!(infer_status("the model is overloaded"), 503);
        assert_eq!(infer_status("something odd"), 500);
    }

    #[test]
    fn test_client_reports_model() {
        let client = OpenAiClient::new(
            Some("http://127.0.0.1:9/v1"),
            "gemini-2.0-flash",
            "sk-test",
            Duration::from_secs(1),
        );
        assert_eq!(client.model(), "gemini-2.0-flash");
        assert_eq!(client.token_usage(), (0, 0, 0));
    }

    #[test]
    fn test_token_usage_accumulates() {
        let client = OpenAiClient::new(None, "gemini-2.5-flash", "sk-test", Duration::from_secs(1));
        client.usage.add(120, 30);
        client.usage.add(80, 20);
        assert_eq!(client.token_usage(), (200, 50, 250));
    }
}
