//! finance-agent HTTP 服务
//!
//! 入口：初始化日志、加载配置、组装 AgentService，并在配置的地址上提供 /agent/* 接口。
//! 可选参数：配置文件路径（默认查找 config/default.toml）。
//!
//! 环境变量:
//! - GEMINI_API_KEY: 模型提供方 API Key（变量名由 llm.api_key_env 决定；缺失时 Agent 接口返回 503）
//! - FINANCE_AGENT__SECTION__KEY: 覆盖任意配置项，如 FINANCE_AGENT__SERVER__PORT=8080
//! - RUST_LOG: 日志过滤

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use finance_agent::{agent::build_agent_service, api::create_router, config::load_config, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let service = build_agent_service(&cfg).context("Failed to build agent service")?;
    let app = create_router(Arc::new(service));

    let addr = cfg.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("finance-agent listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("finance-agent stopped");
    Ok(())
}

/// Ctrl-C 或 SIGTERM 触发优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
