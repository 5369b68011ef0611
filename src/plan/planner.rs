//! Planner：把用户任务变成计划
//!
//! 提示词嵌入工具清单（名称 + 描述原文）、用户任务、一个演示占位符语法的完整示例，
//! 以及「analyze_emails 的 user_request 必须绑定用户原话」的硬性要求。
//! 模型输出不可信：先做首个 `{` 到最后一个 `}` 的括号截取（对 JSON 前后的闲话宽容），
//! 再严格解析校验；解析失败大声报 PlanParse，不自动重试。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::plan::types::Plan;

/// Planner：持有 LLM 与工具清单；模型名在 LLM 客户端构造时确定，这里不再持有可变选中态
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    tool_descriptions: Vec<(String, String)>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, tool_descriptions: Vec<(String, String)>) -> Self {
        Self {
            llm,
            tool_descriptions,
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 规划：一次 LLM 调用 + 括号截取 + 严格解析
    pub async fn create_plan(&self, task: &str) -> Result<Plan, AgentError> {
        let prompt = self.build_prompt(task);
        let output = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(AgentError::LlmError)?;

        tracing::debug!(raw = %output, "planner raw output");

        let json = extract_json(&output)?;
        let plan = Plan::from_wire_json(json).map_err(AgentError::PlanParse)?;
        if plan.is_empty() {
            return Err(AgentError::PlanParse("model returned an empty plan".to_string()));
        }

        tracing::info!(steps = plan.len(), "plan created");
        Ok(plan)
    }

    fn build_prompt(&self, task: &str) -> String {
        let mut tools = String::new();
        for (name, description) in &self.tool_descriptions {
            tools.push_str(&format!("- {}: {}\n", name, description));
        }

        format!(
            "You are a planning assistant for an email agent. Break the user's task into a \
             sequence of tool calls, using only the tools listed below.\n\n\
             Available tools:\n{tools}\n\
             Respond with ONLY a JSON object of this exact form:\n\
             {{\"plan\": [{{\"function\": \"<tool name>\", \"parameters\": {{\"<name>\": <value>}}}}]}}\n\n\
             To pass the result of an earlier step as a parameter, use the placeholder string \
             \"{{{{stepN_result}}}}\", where N is the step number counting from 1.\n\n\
             Example, for the task \"summarize my unread email\":\n\
             {{\n\
             \x20 \"plan\": [\n\
             \x20   {{\"function\": \"fetch_unread_emails\", \"parameters\": {{\"max_count\": 20}}}},\n\
             \x20   {{\"function\": \"analyze_emails\", \"parameters\": {{\"emails\": \"{{{{step1_result}}}}\", \"user_request\": \"summarize my unread email\"}}}}\n\
             \x20 ]\n\
             }}\n\n\
             The \"user_request\" parameter of analyze_emails must always be the user's original \
             task text, verbatim.\n\n\
             Task: {task}"
        )
    }
}

/// 显式的恢复步骤：从可能夹带闲话的模型输出里截取首个 `{` 到最后一个 `}` 之间的文本。
/// 只是廉价的尽力而为，截取结果仍要过严格解析；没有成对花括号则直接报错。
pub fn extract_json(text: &str) -> Result<&str, AgentError> {
    let start = text
        .find('{')
        .ok_or_else(|| AgentError::PlanParse("model response contains no JSON object".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| AgentError::PlanParse("model response contains no JSON object".to_string()))?;
    Ok(&text[start..=end])
}
