//! Agent 错误类型
//!
//! 错误分级：初始化失败（致命，进程退出）、规划失败（本次任务作废，可重新输入）、
//! 执行失败（当前计划中止，已记录的步骤结果保留）。所有错误只上报一次，不做自动重试。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（配置、授权、Gmail、LLM、计划解析、工具执行）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    /// 凭据缺失或刷新失败（初始化阶段致命）
    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Gmail API error: {0}")]
    GmailApi(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 模型输出无法解析/校验为计划（含「响应中无 JSON」与结构不合法）
    #[error("Plan parse error: {0}")]
    PlanParse(String),

    /// 计划引用了未注册的工具名，中止整个计划
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),
}
