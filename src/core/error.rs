//! 管线错误类型与错误分类
//!
//! ToolError 是工具越界抛出的「意外」错误；PipelineError 是编排器内部错误，
//! 两者都会被归入封闭的 ErrorKind 分类，最终由编排器包装成 ErrorContext 交给调用方。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// 错误分类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 请求的工具未注册（配置错误）
    ToolRegistryMiss,
    /// 工具执行并报告失败，或抛出错误
    ToolExecutionFailure,
    /// 生成后端失败 / 超时 / 返回不可用内容
    LlmError,
    /// 生成的工作流未通过结构校验
    ValidationError,
    /// 缓存后端失败（非关键）
    CacheError,
    /// 未归类
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::ToolRegistryMiss,
        ErrorKind::ToolExecutionFailure,
        ErrorKind::LlmError,
        ErrorKind::ValidationError,
        ErrorKind::CacheError,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ToolRegistryMiss => "tool_registry_miss",
            ErrorKind::ToolExecutionFailure => "tool_execution_failure",
            ErrorKind::LlmError => "llm_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::CacheError => "cache_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 工具抛出的意外错误（预期内的失败应编码在 ToolResult 中）
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal tool error: {0}")]
    Internal(String),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

/// 编排器内部错误
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Tool not registered: {0}")]
    ToolNotFound(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed {
        tool: String,
        message: String,
        kind: ErrorKind,
    },

    #[error("Tool '{tool}' raised an error")]
    ToolRaised {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("Tool '{0}' was cancelled")]
    Cancelled(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ToolNotFound(_) => ErrorKind::ToolRegistryMiss,
            PipelineError::ToolFailed { kind, .. } => *kind,
            PipelineError::ToolRaised { source, .. } => match source {
                ToolError::Backend(_) => ErrorKind::LlmError,
                ToolError::Panicked(_) => ErrorKind::Unknown,
                _ => ErrorKind::ToolExecutionFailure,
            },
            PipelineError::Timeout { .. } | PipelineError::Cancelled(_) => ErrorKind::LlmError,
            PipelineError::Cache(_) => ErrorKind::CacheError,
        }
    }

    /// 渲染 source 链（写入 ErrorContext.stack_trace）
    pub fn source_chain(&self) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            lines.push(format!("caused by: {}", err));
            current = err.source();
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}
