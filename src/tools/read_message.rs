//! read_email 工具：按 id 读单封邮件

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::mail::GmailClient;
use crate::tools::Tool;

/// 读取并打印一封邮件，返回 {id, from, subject, body} 对象
pub struct ReadEmailTool {
    gmail: Arc<GmailClient>,
}

impl ReadEmailTool {
    pub fn new(gmail: Arc<GmailClient>) -> Self {
        Self { gmail }
    }
}

#[async_trait]
impl Tool for ReadEmailTool {
    fn name(&self) -> &str {
        "read_email"
    }

    fn description(&self) -> &str {
        "Read a single email by its id, returning sender, subject and body. Args: message_id (string, required)."
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let message_id = args
            .get("message_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "read_email: 'message_id' is required".to_string())?;

        let email = self
            .gmail
            .get_message(message_id.trim())
            .await
            .map_err(|e| e.to_string())?;

        println!("----------------------------------------------------");
        println!("From: {}", email.from);
        println!("Subject: {}", email.subject);
        println!("----------------------------------------------------");
        println!("{}", email.body);

        serde_json::to_value(&email).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::TokenStore;

    #[tokio::test]
    async fn test_missing_message_id_fails_before_any_request() {
        let store = TokenStore::new("credentials.json".into(), "token.json".into());
        let tool = ReadEmailTool::new(Arc::new(GmailClient::new(store)));

        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.contains("'message_id' is required"));
    }
}
