//! send_email 工具：发送纯文本邮件

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::mail::GmailClient;
use crate::tools::Tool;

/// 发送邮件；三个参数都必填，缺失时在发起请求前报错
pub struct SendEmailTool {
    gmail: Arc<GmailClient>,
}

impl SendEmailTool {
    pub fn new(gmail: Arc<GmailClient>) -> Self {
        Self { gmail }
    }
}

fn required<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("send_email: '{}' is required", key))
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send a plain-text email. Args: to (string, required), subject (string, required), body (string, required)."
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let to = required(&args, "to")?;
        let subject = required(&args, "subject")?;
        let body = required(&args, "body")?;

        let id = self
            .gmail
            .send(to, subject, body)
            .await
            .map_err(|e| e.to_string())?;

        println!("Message sent. Id: {}", id);
        Ok(Value::String(format!("Message sent (id: {})", id)))
    }
}
