//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FINANCE_AGENT__*` 覆盖（双下划线表示嵌套，如 `FINANCE_AGENT__SERVER__PORT=8080`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub session: SessionSection,
}

/// [app] 段：应用名（会话 app_name）与固定用户 ID
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub user_id: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "finance-agent".to_string(),
            user_id: "user".to_string(),
        }
    }
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerSection {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// [llm] 段：后端、端点、API Key 所在环境变量、模型回退列表
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / mock
    pub provider: String,
    pub base_url: Option<String>,
    /// 保存 API Key 的环境变量名
    pub api_key_env: String,
    /// 模型优先级列表，回退顺序即列表顺序
    pub models: Vec<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: Some(crate::llm::GEMINI_OPENAI_BASE_URL.to_string()),
            api_key_env: "GEMINI_API_KEY".to_string(),
            models: default_models(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_models() -> Vec<String> {
    [
        "gemini-2.5-flash",
        "gemini-2.0-flash",
        "gemini-2.0-flash-lite",
        "gemini-2.0-flash-001",
        "gemini-2.0-flash-lite-001",
        "gemini-2.5-pro",
        "gemini-1.5-flash",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl LlmSection {
    /// 从 api_key_env 指定的环境变量读取 API Key；空字符串视为缺失
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn is_mock(&self) -> bool {
        self.provider.eq_ignore_ascii_case("mock")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 LLM 请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// 回退位置的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackScope {
    /// 每个请求从第一个模型开始
    #[default]
    Request,
    /// 全进程共享当前模型位置：一个请求触发的回退会影响后续所有请求
    Process,
}

/// [agent] 段：Agent 名、工具循环步数上限、回退作用域、是否注册模拟理财工具
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub name: String,
    pub max_tool_steps: usize,
    pub fallback_scope: FallbackScope,
    pub enable_finance_tools: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "financeExpert".to_string(),
            max_tool_steps: 5,
            fallback_scope: FallbackScope::Request,
            enable_finance_tools: false,
        }
    }
}

/// 会话存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

/// [session] 段：存储后端与 SQLite 文件路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub backend: SessionBackend,
    pub path: PathBuf,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            path: PathBuf::from("data/sessions.db"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 FINANCE_AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FINANCE_AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FINANCE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_roster() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.models.len(), 7);
        assert_eq!(cfg.llm.models[0], "gemini-2.5-flash");
        assert_eq!(cfg.llm.models[6], "gemini-1.5-flash");
        assert_eq!(cfg.agent.fallback_scope, FallbackScope::Request);
        assert_eq!(cfg.session.backend, SessionBackend::Memory);
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_partial_toml_keeps_section_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [agent]
                fallback_scope = "process"

                [llm]
                models = ["m0", "m1"]
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.agent.fallback_scope, FallbackScope::Process);
        assert_eq!(cfg.agent.max_tool_steps, 5);
        assert_eq!(cfg.llm.models, vec!["m0".to_string(), "m1".to_string()]);
        assert_eq!(cfg.llm.api_key_env, "GEMINI_API_KEY");
        assert_eq!(cfg.llm.timeouts.request, 60);
    }

    #[test]
    fn test_api_key_reads_configured_env_var() {
        let mut section = LlmSection::default();
        section.api_key_env = "FINANCE_AGENT_TEST_KEY_UNSET_7f3a".to_string();
        assert!(section.api_key().is_none());
        assert!(!section.is_mock());
    }
}
