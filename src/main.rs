//! ragnav 入口：初始化日志、加载配置、创建决策服务与执行器，运行编排主循环

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ragnav::config::{load_config, AppConfig};
use ragnav::executors::Executors;
use ragnav::llm::create_llm_from_config;
use ragnav::observability;
use ragnav::orchestration::{OrchestrationLoop, StdioUser};

#[derive(Debug, Parser)]
#[command(name = "ragnav", about = "Multi-agent RAG navigator", version)]
struct Args {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, env = "RAGNAV_CONFIG")]
    config: Option<PathBuf>,

    /// chunk 与索引的落盘目录
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = Args::parse();

    let mut cfg = load_config(args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(dir) = args.data_dir {
        cfg.app.data_dir = dir;
    }
    std::fs::create_dir_all(&cfg.app.data_dir).with_context(|| {
        format!("Failed to create data directory {}", cfg.app.data_dir.display())
    })?;

    let llm = create_llm_from_config(&cfg);
    let executors = Executors::local(
        cfg.app.data_dir.clone(),
        cfg.llm.embedding_base_url().map(str::to_string),
        cfg.retrieval.hash_dimensions,
        cfg.retrieval.top_k,
    );

    let mut session = OrchestrationLoop::new(&cfg, llm, executors, StdioUser::new());
    session
        .run()
        .await
        .context("Conversation aborted: decision service failure")?;
    Ok(())
}
