//! 工具箱：注册表与四个邮件工具
//!
//! 固定集合：fetch_unread_emails / read_email / analyze_emails / send_email，
//! 分别包装 Gmail 客户端或 LLM 客户端的一个操作。

pub mod fetch_unread;
pub mod read_message;
pub mod registry;
pub mod send_message;
pub mod summarize;

pub use fetch_unread::FetchUnreadTool;
pub use read_message::ReadEmailTool;
pub use registry::{Tool, ToolRegistry};
pub use send_message::SendEmailTool;
pub use summarize::AnalyzeEmailsTool;
