//! 邮件报文结构与正文提取
//!
//! Gmail API 返回的 payload 是嵌套的 MIME 树；extract_plain_text 深度优先找第一个
//! text/plain 部分并做 base64url 解码。找不到纯文本部分不是错误，返回空串，
//! 由下游工具/提示词自行处理。

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Gmail 消息（format=full / metadata 共用，metadata 时 body/parts 为空）
#[derive(Debug, Clone, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    pub payload: MessagePart,
}

/// MIME 树节点：叶子带 body.data，multipart 带 parts
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

/// 工具间传递的邮件对象（StepResult 中列表的元素）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl GmailMessage {
    /// 取头部 + 正文转为 Email；缺失的头用占位值
    pub fn to_email(&self) -> Email {
        Email {
            id: self.id.clone(),
            from: header_value(&self.payload.headers, "From")
                .unwrap_or("Unknown Sender")
                .to_string(),
            subject: header_value(&self.payload.headers, "Subject")
                .unwrap_or("No Subject")
                .to_string(),
            body: extract_plain_text(&self.payload),
        }
    }
}

/// 按名取头部值（Gmail 返回的头名大小写固定，这里仍按不区分大小写比较）
pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// 深度优先提取第一个 text/plain 部分；都没有时退回顶层 body；仍没有则返回空串
pub fn extract_plain_text(payload: &MessagePart) -> String {
    if let Some(parts) = &payload.parts {
        for part in parts {
            if part.mime_type == "text/plain" {
                if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                    return decode_body(data);
                }
            }
            // multipart/alternative 等嵌套结构继续向下找
            if part.parts.is_some() {
                let body = extract_plain_text(part);
                if !body.is_empty() {
                    return body;
                }
            }
        }
    }
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        return decode_body(data);
    }
    String::new()
}

/// base64url 解码（Gmail 的 data 可能带也可能不带 padding，统一去掉再解）
fn decode_body(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
