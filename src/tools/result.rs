//! 工具结果信封
//!
//! 所有工具统一返回 ToolResult：预期内的失败（后端不可用、输入不合法等）编码在信封中，
//! 只有意外错误才以 ToolError 越界抛出。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ErrorKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// 置信度估计，范围 [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 失败时的分类提示，缺省按 tool_execution_failure 处理
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub metadata: ToolMetadata,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            metadata: ToolMetadata::default(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: None,
            metadata: ToolMetadata::default(),
        }
    }

    pub fn failure_with_kind(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            error_kind: Some(kind),
            ..Self::failure(error)
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u64>) -> Self {
        self.metadata.tokens_used = tokens;
        self
    }

    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.metadata.execution_time_ms = Some(ms);
        self
    }

    pub fn confidence(&self) -> Option<f64> {
        self.metadata.confidence
    }
}
