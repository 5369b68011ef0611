//! Magpie - Rust 邮件智能体
//!
//! 入口：初始化日志、加载配置、创建 MailAgent；无任务参数进交互模式，
//! 带任务参数则拼成一个任务批处理执行后退出。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use magpie::agent::MailAgent;
use magpie::config::load_config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "magpie")]
#[command(about = "Gmail assistant driven by a local Ollama model")]
struct Cli {
    /// 追加的配置文件（覆盖 config/default.toml 的键）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 使用的模型名（覆盖配置；须已在 Ollama 安装）
    #[arg(long)]
    model: Option<String>,

    /// 任务文本（多个词拼成一个任务）；省略则进入交互模式
    #[arg(trailing_var_arg = true)]
    task: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config).context("Failed to load config")?;

    // 初始化失败（凭据缺失、无可用模型）在任何计划运行前退出，进程返回非零
    let mut agent = MailAgent::new(config, cli.model)
        .await
        .context("Failed to initialize agent")?;

    if cli.task.is_empty() {
        agent.repl().await?;
    } else {
        let task = cli.task.join(" ");
        agent.run_task(&task).await?;
    }

    Ok(())
}
