//! 邮件层：凭据存储、Gmail REST 客户端、报文解析

pub mod auth;
pub mod client;
pub mod message;

pub use auth::{StoredToken, TokenStore};
pub use client::GmailClient;
pub use message::{extract_plain_text, Email};
