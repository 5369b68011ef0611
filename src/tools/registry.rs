//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找。
//! 注册表在构造时固定，一次运行内不可变；不是插件系统。execute 返回 JSON 值而非纯文本，
//! 步骤结果（可能是邮件列表）要原样流入后续步骤的参数。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述（原文进入规划提示词，供 LLM 理解）、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（计划 JSON 中的 "function" 字段）
    fn name(&self) -> &str;

    /// 工具描述（含参数说明，逐字嵌入规划提示词）
    fn description(&self) -> &str;

    /// 执行工具；Err 中的字符串会作为该步骤的失败原因报给用户
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / tool_names / tool_descriptions
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回按名称排序的 (name, description) 列表，用于生成提示词中的 Available tools 段落
    /// （排序保证同一套工具生成的提示词稳定）
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut described: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        described.sort_by(|a, b| a.0.cmp(&b.0));
        described
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase text. Args: text (string)."
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
            Ok(Value::String(text.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);

        assert!(registry.contains("upper"));
        assert!(!registry.contains("lower"));

        let tool = registry.get("upper").unwrap();
        let out = tool
            .execute(serde_json::json!({ "text": "abc" }))
            .await
            .unwrap();
        assert_eq!(out, Value::String("ABC".to_string()));
    }

    #[test]
    fn test_descriptions_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(UpperTool);
        let descs = registry.tool_descriptions();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].0, "upper");
    }
}
