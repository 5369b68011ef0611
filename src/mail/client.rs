//! Gmail REST 客户端
//!
//! 覆盖三个操作：列未读、取单封（format=full）、发送（raw 报文 base64url）。
//! 每次请求前向凭据存储要一个有效 access token；HTTP 层不做重试，
//! 上游错误原样转为 GmailApi 报给用户。

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::core::AgentError;
use crate::mail::auth::TokenStore;
use crate::mail::message::{Email, GmailMessage};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// messages.list 响应（没有未读时 messages 字段整个缺失）
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// messages.send 响应
#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Gmail 客户端：HTTP 连接池 + 凭据存储
pub struct GmailClient {
    http: reqwest::Client,
    auth: TokenStore,
}

impl GmailClient {
    pub fn new(auth: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
        }
    }

    /// 列 INBOX 未读邮件并逐封取全文，最多 max 封；没有未读时返回空列表
    pub async fn list_unread(&self, max: u32) -> Result<Vec<Email>, AgentError> {
        let token = self.auth.get_valid_token().await?;
        let resp = self
            .http
            .get(format!("{}/messages", API_BASE))
            .bearer_auth(&token)
            .query(&[
                ("q", "is:unread"),
                ("labelIds", "INBOX"),
                ("maxResults", &max.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::GmailApi(e.to_string()))?;
        let listed: ListResponse = read_json(resp).await?;

        let mut emails = Vec::with_capacity(listed.messages.len());
        for msg_ref in listed.messages {
            emails.push(self.get_message(&msg_ref.id).await?);
        }
        Ok(emails)
    }

    /// 取单封邮件全文（头 + 提取出的纯文本正文）
    pub async fn get_message(&self, id: &str) -> Result<Email, AgentError> {
        let token = self.auth.get_valid_token().await?;
        let resp = self
            .http
            .get(format!("{}/messages/{}", API_BASE, id))
            .bearer_auth(&token)
            .query(&[("format", "full")])
            .send()
            .await
            .map_err(|e| AgentError::GmailApi(e.to_string()))?;
        let msg: GmailMessage = read_json(resp).await?;
        Ok(msg.to_email())
    }

    /// 发送纯文本邮件，返回新消息的 id
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, AgentError> {
        let token = self.auth.get_valid_token().await?;
        let raw = URL_SAFE_NO_PAD.encode(build_mime(to, subject, body));
        let resp = self
            .http
            .post(format!("{}/messages/send", API_BASE))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| AgentError::GmailApi(e.to_string()))?;
        let sent: SendResponse = read_json(resp).await?;
        Ok(sent.id)
    }
}

/// 非 2xx 时带状态码与响应体报错，2xx 时按 JSON 解析
async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, AgentError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AgentError::GmailApi(format!("{}: {}", status, body)));
    }
    resp.json().await.map_err(|e| AgentError::GmailApi(e.to_string()))
}

/// RFC 2822 纯文本报文（Gmail raw 字段要求整封报文再 base64url）
fn build_mime(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        to, subject, body
    )
}
