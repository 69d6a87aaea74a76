//! 模型最终文本的归一化：剥离 ```json 围栏，外层为 {…} / […] 时尝试解析为 JSON

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```json\s*").unwrap());
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// 归一化结果：结构化 JSON（对象 / 数组）或原始文本
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Structured(Value),
    Text(String),
}

impl NormalizedResult {
    /// 转为纯文本：结构化结果重新序列化为 JSON 字符串
    pub fn into_text(self) -> String {
        match self {
            NormalizedResult::Text(text) => text,
            NormalizedResult::Structured(value) => value.to_string(),
        }
    }}

/// 归一化模型输出；解析失败时返回去首尾空白后的原文，从不报错
pub fn normalize(raw: &str) -> NormalizedResult {
    let trimmed = raw.trim();
    let without_open = FENCE_OPEN.replace(trimmed, "");
    let clean = FENCE_CLOSE.replace(&without_open, "");

    if looks_like_json(&clean) {
        match serde_json::from_str::<Value>(&clean) {
            Ok(value) => return NormalizedResult::Structured(value),
            Err(e) => tracing::warn!("Failed to parse JSON response, returning raw text: {}", e),
        }
    }

    NormalizedResult::Text(trimmed.to_string())
}

fn looks_like_json(text: &str) -> bool {
    (text.starts_with('{') && text.ends_with('}')) || (text.starts_with('[') && text.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_json_object() {
        let result = normalize("```json\n{\"a\":1}\n```");
        assert_eq!(result, NormalizedResult::Structured(json!({"a": 1})));
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(normalize("hello"), NormalizedResult::Text("hello".into()));
    }

    #[test]
    fn test_unterminated_object_returns_raw_text() {
        assert_eq!(normalize("{broken"), NormalizedResult::Text("{broken".into()));
    }

    #[test]
    fn test_braced_but_invalid_returns_trimmed_text() {
        let result = normalize("  {not valid json}  \n");
        assert_eq!(result, NormalizedResult::Text("{not valid json}".into()));
    }

    #[test]
    fn test_bare_array_is_parsed() {
        let result = normalize(" [1, 2, 3] ");
        assert_eq!(result, NormalizedResult::Structured(json!([1, 2, 3])));
    }

    #[test]
    fn test_fence_marker_is_case_sensitive() {
        let raw = "```JSON\n{\"a\":1}\n```";
        assert_eq!(normalize(raw), NormalizedResult::Text(raw.into()));
    }

    #[test]
    fn test_fenced_non_json_keeps_fences() {
        let raw = "```json\nnot json\n```";
        assert_eq!(normalize(raw), NormalizedResult::Text(raw.into()));
    }

    #[test]
    fn test_into_text_serializes_structured() {
        let text = NormalizedResult::Structured(json!({"a": 1})).into_text();
        assert_eq!(text, r#"{"a":1}"#);
    }
}
