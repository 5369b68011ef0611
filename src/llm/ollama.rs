//! Ollama 客户端
//!
//! 通过 async_openai 调用本地 Ollama 的 OpenAI 兼容端点（base_url + /v1）；
//! 模型列表走 Ollama 原生 /api/tags（兼容端点不暴露已安装模型的完整信息）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::{LlmClient, Message};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// /api/tags 响应
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Ollama 客户端：持有兼容端点 Client 与 model 名，complete 时转 Message 为 API 格式并取首条 content。
/// 模型名在构造时确定；切换模型由上层用新值重建客户端，不存在可变的全局选中态。
pub struct OllamaClient {
    client: Client<OpenAIConfig>,
    base_url: String,
    model: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OllamaClient {
    /// base_url 形如 http://localhost:11434（不带 /v1）
    pub fn new(base_url: &str, model: &str, request_timeout_secs: u64) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        // Ollama 不校验 API Key，但 async_openai 要求非空
        let config = OpenAIConfig::new()
            .with_api_base(format!("{}/v1", base_url))
            .with_api_key("ollama");

        Self {
            client: Client::with_config(config),
            base_url,
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 列出已安装的模型名（Ollama 原生 /api/tags）。
    /// 连接失败时返回 Err，由调用方决定是否视为初始化失败。
    pub async fn list_models(base_url: &str, timeout_secs: u64) -> Result<Vec<String>, String> {
        let base_url = base_url.trim_end_matches('/');
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| e.to_string())?;

        let resp = http
            .get(format!("{}/api/tags", base_url))
            .send()
            .await
            .map_err(|e| format!("could not connect to Ollama at {}: {}", base_url, e))?;
        if !resp.status().is_success() {
            return Err(format!("Ollama /api/tags returned {}", resp.status()));
        }

        let tags: TagsResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn to_api_messages(&self, messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                crate::llm::Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                crate::llm::Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                crate::llm::Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_api_messages(messages))
            .build()
            .map_err(|e| e.to_string())?;

        let response = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| format!("request to {} timed out", self.base_url))?
        .map_err(|e| e.to_string())?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}
