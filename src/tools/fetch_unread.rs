//! fetch_unread_emails 工具：抓取收件箱未读邮件

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::mail::GmailClient;
use crate::tools::Tool;

/// 抓取未读邮件；没有未读时返回固定字符串（不是错误），由下游透传
pub struct FetchUnreadTool {
    gmail: Arc<GmailClient>,
    default_max: u32,
}

impl FetchUnreadTool {
    pub fn new(gmail: Arc<GmailClient>, default_max: u32) -> Self {
        Self { gmail, default_max }
    }
}

#[async_trait]
impl Tool for FetchUnreadTool {
    fn name(&self) -> &str {
        "fetch_unread_emails"
    }

    fn description(&self) -> &str {
        "Fetch unread emails from the inbox, with sender, subject and body. Args: max_count (integer, optional, default 20)."
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let max = args
            .get("max_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.default_max as u64) as u32;

        let emails = self.gmail.list_unread(max).await.map_err(|e| e.to_string())?;
        if emails.is_empty() {
            println!("No unread messages found.");
            return Ok(Value::String("No unread messages found.".to_string()));
        }

        println!("Found {} unread emails.", emails.len());
        for email in &emails {
            println!("- ID: {}, From: {}, Subject: {}", email.id, email.from, email.subject);
        }

        serde_json::to_value(&emails).map_err(|e| e.to_string())
    }
}
