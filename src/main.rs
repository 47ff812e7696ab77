use std::env;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use splunk_search_mcp::config::{ServerConfig, ServerMode};
use splunk_search_mcp::http::serve_http;
use splunk_search_mcp::mcp::run_stdio;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdio 模式下 stdout 专属 JSON-RPC 帧,日志一律走 stderr。
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => ServerConfig::load_from_path(std::path::Path::new(path))
            .with_context(|| format!("loading server config from {path}"))?,
        None => ServerConfig::default(),
    };

    tracing::info!(mode = ?config.mode, "splunk-search-mcp starting");

    match config.mode {
        ServerMode::Http => {
            serve_http(&config).await?;
        }
        ServerMode::Stdio => {
            run_stdio().await?;
        }
        ServerMode::Both => {
            let http_config = config.clone();
            let http_task = tokio::spawn(async move { serve_http(&http_config).await });
            let stdio_task = tokio::spawn(async move { run_stdio().await });
            http_task.await.expect("http task panicked")?;
            stdio_task.await.expect("stdio task panicked")?;
        }
    }

    Ok(())
}
