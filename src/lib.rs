//! finance-agent - 理财分析与对话 Agent 后端
//!
//! 模块划分：
//! - **agent**: DTO、Prompt、AgentService（analyze / chat）与组装
//! - **api**: axum 路由与 HTTP 错误映射
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、模型回退列表、带回退的请求执行、回复归一化
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **observability**: tracing 日志初始化
//! - **runtime**: Agent 运行时（事件流、LLM + 工具循环、按模型构建）
//! - **session**: 会话存储（内存 / SQLite）
//! - **tools**: 工具箱（calculator、模拟理财工具）与注册表

pub mod agent;
pub mod api;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod runtime;
pub mod session;
pub mod tools;
