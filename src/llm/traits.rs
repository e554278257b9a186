//! 生成后端抽象
//!
//! 管线只依赖 GenerationBackend：给定 prompt 与生成参数，返回文本内容（期望但不保证是 JSON）与可选的 token 用量。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 后端调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Empty response from backend")]
    EmptyResponse,

    #[error("Request cancelled")]
    Cancelled,
}

/// 生成参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 2000,
        }
    }
}

/// Token 用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 一次生成的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub content: String,
    pub usage: Option<Usage>,
}

impl Generation {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// 生成后端 trait：单次非流式生成
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
