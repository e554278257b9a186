//! OpenAI 兼容 API 后端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{Generation, GenerationBackend, GenerationConfig, LlmError, Usage};

const SYSTEM_PROMPT: &str =
    "You turn automation requests into structured data. Answer with a single JSON document and nothing else.";

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

/// OpenAI 兼容后端：模型名以调用时的 GenerationConfig 为准，default_model 仅在其为空时使用
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    default_model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
    request_timeout: Option<Duration>,
}

impl OpenAiBackend {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            default_model: model.to_string(),
            usage: TokenUsage::new(),
            request_timeout: None,
        }
    }

    /// 单次请求超时；超时返回 LlmError::Timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.default_model
    }

    fn messages(prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| LlmError::ApiError(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| LlmError::ApiError(e.to_string()))?;
        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation, LlmError> {
        let model = if config.model.is_empty() {
            self.default_model.as_str()
        } else {
            config.model.as_str()
        };
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(Self::messages(prompt)?)
            .temperature(config.temperature)
            .max_tokens(config.max_tokens)
            .build()
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        let chat = self.client.chat();
        let call = chat.create(request);
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
        .map_err(|e| LlmError::ApiError(e.to_string()))?;

        // 提取 token 使用统计
        let usage = response.usage.as_ref().map(|u| {
            self.usage
                .add(u.prompt_tokens as u64, u.completion_tokens as u64);
            Usage {
                prompt_tokens: u.prompt_tokens as u64,
                completion_tokens: u.completion_tokens as u64,
                total_tokens: u.total_tokens as u64,
            }
        });

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(Generation { content, usage })
    }
}
