//! Prompt 模板：financeExpert 的系统指令与分析请求模板

use crate::agent::dto::AnalysisRequest;

pub const FINANCE_EXPERT_INSTRUCTION: &str = "You are a senior financial analyst and expert consultant for FinanceApp.
Your goal is to provide pragmatic, safe, and personalized financial advice.

PRINCIPLES:
1. DO NOT JUDGE: Be empathetic but firm about financial goals.
2. SAFETY FIRST: Never recommend high-risk investments without clear warnings.
3. GOAL ORIENTED: Always relate current spending to future goals.
4. ACCURACY: Use the calculator tool for ANY mathematical operation. Do not calculate mentally.

When analyzing data, look for patterns, spending spikes, and opportunities to save.
Structure your response in JSON format matching the AnalysisResponse schema when requested.";

const ANALYSIS_OUTPUT_SHAPE: &str = r#"{
  "sentiment": "positive" | "warning" | "critical",
  "summary": "string",
  "insights": [{ "type": "spending_spike" | "goal_risk" | "saving_opportunity", "message": "string", "actionableStep": "string" }],
  "forecast": { "endOfMonthBalanceEstimate": number }
}"#;

/// 系统指令：优先读取 config/prompts/finance_expert.txt，缺失时用内置版本
pub fn load_instruction() -> String {
    [
        "config/prompts/finance_expert.txt",
        "../config/prompts/finance_expert.txt",
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| FINANCE_EXPERT_INSTRUCTION.to_string())
}

/// 分析请求 Prompt：{userProfile, financialContext, period} 序列化为 JSON 内嵌
pub fn analysis_prompt(request: &AnalysisRequest) -> Result<String, serde_json::Error> {
    let context = serde_json::to_string(&serde_json::json!({
        "userProfile": request.user_profile,
        "financialContext": request.financial_context,
        "period": request.period,
    }))?;

    Ok(format!(
        "Perform a deep financial analysis for this user.\n\
         Context: {context}\n\n\
         Output strictly in valid JSON format matching this structure (do not include markdown code blocks):\n\
         {ANALYSIS_OUTPUT_SHAPE}"
    ))
}

/// 对话 Prompt：有快照时前置 `Context Snapshot: <json>`，之后换行接 `User: <message>`
pub fn chat_prompt(
    message: &str,
    snapshot: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<String, serde_json::Error> {
    let prefix = match snapshot {
        Some(snapshot) => format!("Context Snapshot: {}", serde_json::to_string(snapshot)?),
        None => String::new(),
    };
    Ok(format!("{prefix}\nUser: {message}"))
}
