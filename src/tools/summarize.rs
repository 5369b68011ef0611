//! analyze_emails 工具：按用户要求分析/总结一批邮件
//!
//! emails 参数既可能是邮件对象列表（通常来自 {{stepN_result}} 替换），也可能是
//! 上游透传的字符串（如 "No unread messages found."）。非列表输入原样返回，
//! 不调用模型、不强行按邮件格式化。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, Message};
use crate::tools::Tool;

/// 邮件分析工具：把邮件列表与用户原始请求拼成提示词，交给 LLM
pub struct AnalyzeEmailsTool {
    llm: Arc<dyn LlmClient>,
}

impl AnalyzeEmailsTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for AnalyzeEmailsTool {
    fn name(&self) -> &str {
        "analyze_emails"
    }

    fn description(&self) -> &str {
        "Analyze or summarize a list of emails according to the user's request (summarize, draft replies, extract action items, etc). Args: emails (list of email objects, usually \"{{stepN_result}}\"), user_request (string, the user's original request)."
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let emails = args.get("emails").cloned().unwrap_or(Value::Null);
        let user_request = args
            .get("user_request")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        // 上游已经给出文本结论（或根本没有邮件）：原样透传
        let Some(list) = emails.as_array() else {
            return Ok(emails);
        };

        let mut blocks = String::new();
        for email in list {
            let from = email.get("from").and_then(|v| v.as_str()).unwrap_or("Unknown Sender");
            let subject = email.get("subject").and_then(|v| v.as_str()).unwrap_or("No Subject");
            let body = email.get("body").and_then(|v| v.as_str()).unwrap_or("");
            blocks.push_str(&format!(
                "From: {}\nSubject: {}\nBody:\n{}\n---\n",
                from, subject, body
            ));
        }

        let prompt = format!(
            "You are an email assistant. The user asked: \"{}\"\n\n\
             Here are the emails:\n\n{}\nRespond to the user's request based on these emails.",
            user_request, blocks
        );

        let response = self.llm.complete(&[Message::user(prompt)]).await?;
        Ok(Value::String(response))
    }
}
