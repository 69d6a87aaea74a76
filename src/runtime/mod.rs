//! Agent 运行时：事件模型、Runner（LLM + 工具循环）、按模型构建运行时的工厂

pub mod events;
pub mod factory;
pub mod runner;

pub use events::{AgentEvent, Content, Part};
pub use factory::{AgentFactory, LlmAgentFactory};
pub use runner::{AgentRuntime, EventStream, Runner, RunnerConfig};
