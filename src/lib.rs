//! Magpie - Rust 邮件智能体
//!
//! 模块划分：
//! - **agent**: 组件装配、任务入口与交互模式
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 统一错误类型
//! - **llm**: LLM 客户端抽象与实现（Ollama / Mock）
//! - **mail**: 凭据存储、Gmail REST 客户端、报文解析
//! - **plan**: 计划数据模型、Planner、Executor
//! - **tools**: 工具注册表与四个邮件工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod mail;
pub mod plan;
pub mod tools;
