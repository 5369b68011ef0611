//! LLM 层：客户端抽象与实现（Ollama / Mock）

pub mod mock;
pub mod ollama;
pub mod traits;

pub use mock::MockLlmClient;
pub use ollama::{OllamaClient, TokenUsage};
pub use traits::{LlmClient, Message, Role};
