//! 工具调用 JSON Schema 生成（schemars）
//!
//! 用于将「合法 tool call」的 JSON 结构注入 system prompt，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

/// 工具调用格式：`{"tool": "...", "args": {...}}`，Runner 按此解析模型输出
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ToolCall {
    /// 工具名，如 calculator、getUserBalance
    pub tool: String,
    /// 工具参数对象，依工具不同而不同
    #[serde(default)]
    pub args: Value,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCall);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 解析模型输出中的工具调用：整段（可带 ```json 围栏）为含非空 tool 字段的 JSON 对象时返回 Some
pub fn parse_tool_call(output: &str) -> Option<ToolCall> {
    let trimmed = output.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if !(body.starts_with('{') && body.ends_with('}')) {
        return None;
    }
    let call: ToolCall = serde_json::from_str(body).ok()?;
    if call.tool.trim().is_empty() {
        return None;
    }
    Some(call)
}
