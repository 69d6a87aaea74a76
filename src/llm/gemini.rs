//! Gemini API 客户端（OpenAI 兼容格式）
//!
//! Gemini 提供 OpenAI 兼容接口：
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 鉴权：API Key 作为 Bearer token

use std::time::Duration;

use crate::config::LlmSection;
use crate::llm::OpenAiClient;

pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// 为指定模型创建 Gemini 客户端；base_url 未配置时使用官方兼容端点
pub fn create_gemini_client(section: &LlmSection, model: &str, api_key: &str) -> OpenAiClient {
    let base_url = section
        .base_url
        .as_deref()
        .unwrap_or(GEMINI_OPENAI_BASE_URL);
    OpenAiClient::new(
        Some(base_url),
        model,
        api_key,
        Duration::from_secs(section.timeouts.request),
    )
}
