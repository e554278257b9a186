//! 错误报告
//!
//! 无状态：把 ErrorContext 渲染成面向用户的摘要与面向支持的 JSON，
//! 并按 ErrorKind 给出是否可恢复与重试建议（静态查表）。

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::context::ErrorContext;
use crate::core::error::ErrorKind;

/// 重试建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecommendation {
    pub should_retry: bool,
    pub delay_ms: u64,
    pub reason: &'static str,
}

/// 可恢复的错误分类
const RECOVERABLE: &[ErrorKind] = &[
    ErrorKind::ToolExecutionFailure,
    ErrorKind::LlmError,
    ErrorKind::CacheError,
    ErrorKind::Unknown,
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    /// 面向用户的摘要：阶段、工具、时间、会话、编号建议、保留下来的部分结果
    pub fn format_for_user(&self, ctx: &ErrorContext) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Request failed during {}", ctx.stage());
        if let Some(tool) = ctx.tool_name() {
            let _ = writeln!(out, "Tool: {}", tool);
        }
        let _ = writeln!(out, "Error: {} ({})", ctx.message(), ctx.kind());
        let _ = writeln!(out, "Time: {}", ctx.timestamp().to_rfc3339());
        let _ = writeln!(out, "Session: {}", ctx.session_id());

        if !ctx.suggestions().is_empty() {
            let _ = writeln!(out, "\nSuggestions:");
            for (i, suggestion) in ctx.suggestions().iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
            }
        }

        if ctx.partial_results().is_empty() {
            let _ = writeln!(out, "\nNo partial results were produced.");
        } else {
            let kept: Vec<&str> = ctx.partial_results().keys().map(String::as_str).collect();
            let _ = writeln!(out, "\nPartial results available: {}", kept.join(", "));
        }

        out
    }

    /// 面向支持的完整 JSON
    pub fn format_for_support(&self, ctx: &ErrorContext) -> String {
        serde_json::to_string_pretty(ctx).unwrap_or_else(|e| {
            format!("{{\"error\": \"failed to serialize diagnostic: {}\"}}", e)
        })
    }

    pub fn is_recoverable(&self, kind: ErrorKind) -> bool {
        RECOVERABLE.contains(&kind)
    }

    pub fn retry_recommendation(&self, kind: ErrorKind) -> RetryRecommendation {
        let (should_retry, delay_ms, reason) = match kind {
            ErrorKind::ToolRegistryMiss => (false, 0, "System misconfiguration: a required tool is not registered"),
            ErrorKind::ToolExecutionFailure => (true, 1_000, "Tool failures are often transient"),
            ErrorKind::LlmError => (true, 2_000, "The generation backend may be temporarily unavailable"),
            ErrorKind::ValidationError => (false, 0, "The request or configuration needs correction"),
            ErrorKind::CacheError => (true, 0, "Cache failures are non-critical"),
            ErrorKind::Unknown => (true, 5_000, "Unclassified error; retry with back-off"),
        };
        RetryRecommendation {
            should_retry,
            delay_ms,
            reason,
        }
    }
}
