//! MailAgent：组件装配与交互入口
//!
//! 初始化顺序：验证凭据（缺 credentials.json 在这里就失败）-> 发现可用模型
//! （Ollama 没起来或没拉模型同样致命）-> 选定模型 -> 装配注册表与 Planner / Executor。
//! 切换模型不走可变全局量：用新模型名重建 LLM 相关组件（与重载配置后重建同一套路）。

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, OllamaClient};
use crate::mail::{GmailClient, TokenStore};
use crate::plan::{Executor, Planner};
use crate::tools::{AnalyzeEmailsTool, FetchUnreadTool, ReadEmailTool, SendEmailTool, ToolRegistry};

/// /api/tags 模型发现的超时（秒）
const DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// 邮件智能体：固定工具集 + 一次任务一份计划
pub struct MailAgent {
    config: AppConfig,
    gmail: Arc<GmailClient>,
    available_models: Vec<String>,
    selected_model: String,
    planner: Planner,
    executor: Executor,
}

impl MailAgent {
    /// 初始化；任何失败都发生在第一份计划运行之前
    pub async fn new(config: AppConfig, model_override: Option<String>) -> Result<Self, AgentError> {
        let store = TokenStore::new(
            config.gmail.credentials_path.clone(),
            config.gmail.token_path.clone(),
        );
        // 提前验证凭据：必要时触发首次授权/刷新，失败则初始化失败
        store.get_valid_token().await?;
        let gmail = Arc::new(GmailClient::new(store));

        let available_models =
            OllamaClient::list_models(&config.llm.base_url, DISCOVERY_TIMEOUT_SECS)
                .await
                .map_err(AgentError::LlmError)?;
        if available_models.is_empty() {
            return Err(AgentError::LlmError(
                "No Ollama models found. Please make sure Ollama is running and you have pulled a model (e.g. 'ollama pull llama3').".to_string(),
            ));
        }

        let requested = model_override.or_else(|| {
            config
                .llm
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
        });
        let selected_model = match requested {
            Some(name) => {
                if !available_models.iter().any(|m| m == &name) {
                    return Err(AgentError::ConfigError(format!(
                        "model '{}' is not installed (available: {})",
                        name,
                        available_models.join(", ")
                    )));
                }
                name
            }
            None => available_models[0].clone(),
        };

        let (planner, executor) = build_components(&config, gmail.clone(), &selected_model);
        tracing::info!(model = %selected_model, "agent initialized");

        Ok(Self {
            config,
            gmail,
            available_models,
            selected_model,
            planner,
            executor,
        })
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    /// 一次任务：规划 -> 执行 -> 打印最终结果。
    /// 规划失败时什么都不执行；执行失败时剩余步骤中止。调用方决定报告方式。
    pub async fn run_task(&self, task: &str) -> Result<(), AgentError> {
        let plan = self.planner.create_plan(task).await?;

        println!("Plan ({} steps):", plan.len());
        for (i, step) in plan.steps.iter().enumerate() {
            println!("  {}. {}", i + 1, step.function);
        }

        let final_result = self.executor.execute_plan(&plan).await?;
        if let Some(value) = final_result {
            match value {
                serde_json::Value::String(text) => println!("\nResult:\n{}", text),
                other => println!(
                    "\nResult:\n{}",
                    serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string())
                ),
            }
        }

        let (prompt_tokens, completion_tokens, total) = self.planner.token_usage();
        tracing::info!(prompt_tokens, completion_tokens, total, "token usage");
        Ok(())
    }

    pub fn list_models(&self) {
        println!("Available Ollama models:");
        for model in &self.available_models {
            println!("- {}", model);
        }
    }

    /// 切换模型：重建 LLM 相关组件（Planner、analyze_emails、Executor），不改全局状态
    pub fn set_model(&mut self, name: &str) {
        if !self.available_models.iter().any(|m| m == name) {
            println!("Model '{}' not found.", name);
            return;
        }
        self.selected_model = name.to_string();
        let (planner, executor) = build_components(&self.config, self.gmail.clone(), name);
        self.planner = planner;
        self.executor = executor;
        println!("Selected model: {}", self.selected_model);
    }

    /// 交互模式：每行一个任务；help / models / model <name> / quit 是控制命令
    pub async fn repl(&mut self) -> Result<(), AgentError> {
        println!("magpie started.");
        println!("Using Ollama model: {}", self.selected_model);
        print_help();

        let stdin = io::stdin();
        loop {
            print!("\nEnter a task: ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Could not read input: {}", e);
                    break;
                }
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (command, rest) = match line.split_once(char::is_whitespace) {
                Some((head, tail)) => (head.to_lowercase(), tail.trim()),
                None => (line.to_lowercase(), ""),
            };

            match command.as_str() {
                "quit" => break,
                "help" => print_help(),
                "models" => self.list_models(),
                "model" => {
                    if rest.is_empty() {
                        println!("Please provide a model name.");
                    } else {
                        self.set_model(rest);
                    }
                }
                // 其余输入整行作为一个任务；失败只报告，不退出
                _ => {
                    if let Err(e) = self.run_task(line).await {
                        eprintln!("Error: {}", e);
                    }
                }
            }
        }
        Ok(())
    }
}

/// 用给定模型名装配 LLM、工具注册表、Planner、Executor
fn build_components(
    config: &AppConfig,
    gmail: Arc<GmailClient>,
    model: &str,
) -> (Planner, Executor) {
    let llm: Arc<dyn LlmClient> = Arc::new(OllamaClient::new(
        &config.llm.base_url,
        model,
        config.llm.request_timeout_secs,
    ));

    let mut registry = ToolRegistry::new();
    registry.register(FetchUnreadTool::new(
        gmail.clone(),
        config.gmail.default_max_fetch,
    ));
    registry.register(ReadEmailTool::new(gmail.clone()));
    registry.register(AnalyzeEmailsTool::new(llm.clone()));
    registry.register(SendEmailTool::new(gmail));

    let planner = Planner::new(llm, registry.tool_descriptions());
    let executor = Executor::new(Arc::new(registry));
    (planner, executor)
}

fn print_help() {
    println!("\nType a task in plain language, e.g.:");
    println!("  summarize my unread email");
    println!("  read message 18c2a4f7 and draft a reply");
    println!("\nCommands:");
    println!("  models                 - List available Ollama models.");
    println!("  model <model_name>     - Select an Ollama model to use.");
    println!("  help                   - Show this help message.");
    println!("  quit                   - Exit the agent.");
}
