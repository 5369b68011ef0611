//! Executor：顺序执行计划
//!
//! 逐步走一遍：解析引用 -> 查注册表 -> 调工具 -> 记结果。结果表 step{i}_result
//! 只增不改，仅本次执行可见。未注册的工具名或工具执行失败都中止剩余步骤
//! （无部分恢复、无回滚、无重试）；引用落空只警告并保留占位符字面量，继续执行。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::AgentError;
use crate::plan::types::{placeholder, result_key, ParamValue, Plan};
use crate::tools::ToolRegistry;

/// 结果日志预览的最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// Executor：只持有注册表；结果表归单次 execute_plan 调用所有，结束即丢弃
pub struct Executor {
    registry: Arc<ToolRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// 顺序执行整个计划，返回最后一步的结果（供入口打印）
    pub async fn execute_plan(&self, plan: &Plan) -> Result<Option<Value>, AgentError> {
        let mut results: HashMap<String, Value> = HashMap::new();
        let mut final_result = None;
        let total = plan.len();

        for (i, step) in plan.steps.iter().enumerate() {
            let index = i + 1;
            println!("\n[Step {}/{}] {}", index, total, step.function);

            let args = resolve_parameters(index, step.parameters.iter(), &results);

            let Some(tool) = self.registry.get(&step.function) else {
                return Err(AgentError::UnknownTool(format!(
                    "step {}: '{}' is not a registered tool, aborting plan",
                    index, step.function
                )));
            };

            let start = Instant::now();
            let result = tool.execute(Value::Object(args)).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let audit = serde_json::json!({
                "event": "tool_audit",
                "step": index,
                "tool": step.function,
                "ok": result.is_ok(),
                "duration_ms": duration_ms,
            });
            tracing::info!(audit = %audit.to_string(), "tool");

            let value = result.map_err(|e| {
                AgentError::ToolExecutionFailed(format!(
                    "step {} ({}): {}",
                    index, step.function, e
                ))
            })?;

            tracing::info!(
                step = index,
                result = %result_preview(&value),
                "step finished"
            );
            results.insert(result_key(index), value.clone());
            final_result = Some(value);
        }

        Ok(final_result)
    }
}

/// 替换参数里的引用：命中则代入任意类型的步骤结果；落空只警告并保留占位符字面量
fn resolve_parameters<'a>(
    step_index: usize,
    parameters: impl Iterator<Item = (&'a String, &'a ParamValue)>,
    results: &HashMap<String, Value>,
) -> serde_json::Map<String, Value> {
    let mut resolved = serde_json::Map::new();
    for (key, value) in parameters {
        let v = match value {
            ParamValue::Literal(v) => v.clone(),
            ParamValue::Reference(n) => match results.get(&result_key(*n)) {
                Some(stored) => stored.clone(),
                None => {
                    tracing::warn!(
                        step = step_index,
                        parameter = %key,
                        reference = %result_key(*n),
                        "placeholder refers to a result that does not exist yet, passing it through as text"
                    );
                    Value::String(placeholder(*n))
                }
            },
        };
        resolved.insert(key.clone(), v);
    }
    resolved
}

/// 结果预览：大列表只报条数，长文本截断，避免刷屏
fn result_preview(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("list of {} items", items.len()),
        other => {
            let s = match other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            };
            if s.chars().count() > RESULT_PREVIEW_CHARS {
                format!("{}...", s.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
            } else {
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// 记录每次收到的参数并返回固定结果（或固定失败）的测试工具
    struct ScriptedTool {
        name: String,
        calls: Arc<Mutex<Vec<Value>>>,
        result: Result<Value, String>,
    }

    impl ScriptedTool {
        fn new(name: &str, result: Result<Value, String>) -> (Self, Arc<Mutex<Vec<Value>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name: name.to_string(),
                    calls: calls.clone(),
                    result,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Tool for ScriptedTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "scripted test tool"
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            self.calls.lock().unwrap().push(args);
            self.result.clone()
        }
    }

    fn plan_from(text: &str) -> Plan {
        Plan::from_wire_json(text).unwrap()
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_reference_resolves() {
        let mut registry = ToolRegistry::new();
        let (produce, _) = ScriptedTool::new("produce", Ok(json!([{"subject": "a"}, {"subject": "b"}])));
        let (consume, consume_calls) = ScriptedTool::new("consume", Ok(json!("done")));
        registry.register(produce);
        registry.register(consume);

        let plan = plan_from(
            r#"{"plan": [
                {"function": "produce", "parameters": {}},
                {"function": "consume", "parameters": {
                    "emails": "{{step1_result}}",
                    "label": "prefix {{step1_result}} suffix"
                }}
            ]}"#,
        );

        let executor = Executor::new(Arc::new(registry));
        let last = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(last, Some(json!("done")));

        let calls = consume_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        // 整串占位符被代入列表；混排内容原样传递
        assert_eq!(calls[0]["emails"], json!([{"subject": "a"}, {"subject": "b"}]));
        assert_eq!(calls[0]["label"], json!("prefix {{step1_result}} suffix"));
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_before_later_steps() {
        let mut registry = ToolRegistry::new();
        let (known, known_calls) = ScriptedTool::new("known", Ok(json!("ok")));
        let (never, never_calls) = ScriptedTool::new("never", Ok(json!("unreached")));
        registry.register(known);
        registry.register(never);

        let plan = plan_from(
            r#"{"plan": [
                {"function": "known", "parameters": {}},
                {"function": "missing", "parameters": {}},
                {"function": "never", "parameters": {}}
            ]}"#,
        );

        let executor = Executor::new(Arc::new(registry));
        let err = executor.execute_plan(&plan).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(_)));
        assert!(err.to_string().contains("step 2"));

        assert_eq!(known_calls.lock().unwrap().len(), 1);
        assert_eq!(never_calls.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_failing_tool_aborts_remaining_steps() {
        let mut registry = ToolRegistry::new();
        let (bad, _) = ScriptedTool::new("bad", Err("upstream API error".to_string()));
        let (after, after_calls) = ScriptedTool::new("after", Ok(json!("unreached")));
        registry.register(bad);
        registry.register(after);

        let plan = plan_from(
            r#"{"plan": [
                {"function": "bad", "parameters": {}},
                {"function": "after", "parameters": {}}
            ]}"#,
        );

        let executor = Executor::new(Arc::new(registry));
        let err = executor.execute_plan(&plan).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(_)));
        assert!(err.to_string().contains("step 1 (bad)"));
        assert!(err.to_string().contains("upstream API error"));
        assert_eq!(after_calls.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_unresolved_reference_passes_placeholder_text_through() {
        let mut registry = ToolRegistry::new();
        let (tool, calls) = ScriptedTool::new("solo", Ok(json!("ok")));
        registry.register(tool);

        // 只有一步却引用第 5 步：替换落空，占位符按字面量传入，执行继续
        let plan = plan_from(
            r#"{"plan": [
                {"function": "solo", "parameters": {"emails": "{{step5_result}}"}}
            ]}"#,
        );

        let executor = Executor::new(Arc::new(registry));
        executor.execute_plan(&plan).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0]["emails"], json!("{{step5_result}}"));
    }

    #[tokio::test]
    async fn test_each_step_result_recorded_and_visible_forward() {
        let mut registry = ToolRegistry::new();
        let (one, _) = ScriptedTool::new("one", Ok(json!("r1")));
        let (two, _) = ScriptedTool::new("two", Ok(json!("r2")));
        let (three, three_calls) = ScriptedTool::new("three", Ok(json!("r3")));
        registry.register(one);
        registry.register(two);
        registry.register(three);

        let plan = plan_from(
            r#"{"plan": [
                {"function": "one", "parameters": {}},
                {"function": "two", "parameters": {}},
                {"function": "three", "parameters": {"a": "{{step1_result}}", "b": "{{step2_result}}"}}
            ]}"#,
        );

        let executor = Executor::new(Arc::new(registry));
        let last = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(last, Some(json!("r3")));

        let calls = three_calls.lock().unwrap();
        assert_eq!(calls[0]["a"], json!("r1"));
        assert_eq!(calls[0]["b"], json!("r2"));
    }

    #[test]
    fn test_result_preview_summarizes_lists_and_truncates() {
        assert_eq!(result_preview(&json!([1, 2, 3])), "list of 3 items");
        let long = "x".repeat(500);
        let preview = result_preview(&json!(long));
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= RESULT_PREVIEW_CHARS + 3);
    }
}
