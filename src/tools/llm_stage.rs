//! 调用生成后端的公共部分
//!
//! 分类 / 抽取 / 生成三个工具共用：发 prompt、解析输出、按回退策略决定
//! 后端失败或返回非结构化内容时是改走启发式，还是以 llm_error 失败。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::llm::{BackendOutput, GenerationBackend, GenerationConfig};

/// 后端不可用时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// 退回关键词启发式 / 模板
    #[default]
    Heuristic,
    /// 直接失败
    Strict,
}

/// 一次后端调用的归宿
#[derive(Debug)]
pub enum Resolution<T> {
    /// 后端返回了可解析的结构化结果
    Structured { value: T, tokens: Option<u64> },
    /// 应改走启发式，附原因
    Heuristic(String),
    /// 应以 llm_error 失败
    Failed(String),
}

#[derive(Clone)]
pub struct LlmStage {
    backend: Arc<dyn GenerationBackend>,
    config: GenerationConfig,
    policy: FallbackPolicy,
}

impl LlmStage {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: GenerationConfig, policy: FallbackPolicy) -> Self {
        Self {
            backend,
            config,
            policy,
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub async fn resolve<T: DeserializeOwned>(&self, prompt: &str) -> Resolution<T> {
        let reason = match self.backend.generate(prompt, &self.config).await {
            Ok(generation) => {
                let tokens = generation.usage.map(|u| u.total_tokens);
                match BackendOutput::parse(&generation.content).into_typed::<T>() {
                    Ok(value) => return Resolution::Structured { value, tokens },
                    Err(_) => "backend returned unstructured content".to_string(),
                }
            }
            Err(e) => e.to_string(),
        };

        match self.policy {
            FallbackPolicy::Heuristic => {
                tracing::warn!(reason = %reason, "falling back to heuristics");
                Resolution::Heuristic(reason)
            }
            FallbackPolicy::Strict => Resolution::Failed(reason),
        }
    }
}
