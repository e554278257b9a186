//! 工具执行器
//!
//! 持有 ToolRegistry 与阶段超时，execute(tool_name, params, cancel) 先做参数校验，
//! 再在超时与取消令牌的约束下调用工具；失败统一转为 PipelineError，
//! 每次调用输出结构化审计日志（JSON）。工具 panic 被捕获为 ToolError::Panicked。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{ErrorKind, PipelineError, ToolError};
use crate::tools::{Tool, ToolRegistry, ToolResult};

/// 工具执行器：对每次调用施加超时与取消，并将结果映射为 PipelineError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行指定工具。未注册 → ToolNotFound；参数不合法 / 信封失败 → ToolFailed；
    /// 工具抛错或 panic → ToolRaised；超时 → Timeout；令牌取消 → Cancelled
    pub async fn execute(
        &self,
        tool_name: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, PipelineError> {
        let start = Instant::now();
        let args_preview = args_preview(&params);

        let Some(tool) = self.registry.get(tool_name) else {
            audit(tool_name, "not_found", start, &args_preview);
            return Err(PipelineError::ToolNotFound(tool_name.to_string()));
        };

        let check = tool.validate(&params);
        for warning in &check.warnings {
            tracing::warn!(tool = %tool_name, "{}", warning);
        }
        if !check.is_valid {
            audit(tool_name, "invalid_params", start, &args_preview);
            return Err(PipelineError::ToolFailed {
                tool: tool_name.to_string(),
                message: check.errors.join("; "),
                kind: ErrorKind::ToolExecutionFailure,
            });
        }

        let call = AssertUnwindSafe(tool.execute(params))
            .catch_unwind()
            .map(|r| r.unwrap_or_else(|payload| Err(ToolError::Panicked(panic_message(payload.as_ref())))));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = timeout(self.timeout, call) => Some(r),
        };

        let outcome = match &result {
            None => "cancelled",
            Some(Err(_)) => "timeout",
            Some(Ok(Err(ToolError::Panicked(_)))) => "panicked",
            Some(Ok(Err(_))) => "error",
            Some(Ok(Ok(r))) if r.success => "ok",
            Some(Ok(Ok(_))) => "failed",
        };
        let elapsed_ms = audit(tool_name, outcome, start, &args_preview);

        match result {
            None => Err(PipelineError::Cancelled(tool_name.to_string())),
            Some(Err(_)) => Err(PipelineError::Timeout {
                tool: tool_name.to_string(),
                secs: self.timeout.as_secs(),
            }),
            Some(Ok(Err(source))) => Err(PipelineError::ToolRaised {
                tool: tool_name.to_string(),
                source,
            }),
            Some(Ok(Ok(r))) if !r.success => Err(PipelineError::ToolFailed {
                tool: tool_name.to_string(),
                message: r.error.unwrap_or_else(|| "tool reported failure".to_string()),
                kind: r.error_kind.unwrap_or(ErrorKind::ToolExecutionFailure),
            }),
            Some(Ok(Ok(r))) => {
                if r.metadata.execution_time_ms.is_some() {
                    Ok(r)
                } else {
                    Ok(r.with_execution_time(elapsed_ms))
                }
            }
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.list()
    }
}

fn audit(tool_name: &str, outcome: &str, start: Instant, args_preview: &str) -> u64 {
    let duration_ms = start.elapsed().as_millis() as u64;
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": tool_name,
        "ok": outcome == "ok",
        "outcome": outcome,
        "duration_ms": duration_ms,
        "args_preview": args_preview,
    });
    tracing::info!(audit = %audit.to_string(), "tool");
    duration_ms
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm::LlmError;
    use crate::tools::schema::{ParamType, ParameterSpec};

    enum Behaviour {
        Succeed,
        Report,
        Raise,
        Panic,
        Sleep(Duration),
    }

    struct Scripted(Behaviour);

    #[async_trait]
    impl Tool for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters(&self) -> Vec<ParameterSpec> {
            vec![ParameterSpec::required("userInput", ParamType::String, "text")]
        }

        async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
            match &self.0 {
                Behaviour::Succeed => Ok(ToolResult::ok(json!({"done": true}))),
                Behaviour::Report => Ok(ToolResult::failure_with_kind("bad input", ErrorKind::ValidationError)),
                Behaviour::Raise => Err(ToolError::Backend(LlmError::EmptyResponse)),
                Behaviour::Panic => {
                    let empty: Vec<u8> = Vec::new();
                    let i = empty.len() + 3;
                    Ok(ToolResult::ok(json!(empty[i])))
                }
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(ToolResult::ok(json!(null)))
                }
            }
        }
    }

    fn executor(behaviour: Behaviour, timeout: Duration) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Scripted(behaviour));
        ToolExecutor::new(registry, timeout)
    }

    fn params() -> Value {
        json!({"userInput": "hello"})
    }

    #[tokio::test]
    async fn test_success_records_elapsed_time() {
        let exec = executor(Behaviour::Succeed, Duration::from_secs(1));
        let result = exec.execute("scripted", params(), &CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert!(result.metadata.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let exec = executor(Behaviour::Succeed, Duration::from_secs(1));
        let err = exec.execute("nope", params(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolRegistryMiss);
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_execution() {
        let exec = executor(Behaviour::Succeed, Duration::from_secs(1));
        let err = exec.execute("scripted", json!({}), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolExecutionFailure);
        assert!(err.to_string().contains("userInput"));
    }

    #[tokio::test]
    async fn test_reported_failure_keeps_hint() {
        let exec = executor(Behaviour::Report, Duration::from_secs(1));
        let err = exec.execute("scripted", params(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_raised_backend_error_is_llm_error() {
        let exec = executor(Behaviour::Raise, Duration::from_secs(1));
        let err = exec.execute("scripted", params(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LlmError);
        assert!(err.source_chain().unwrap().contains("Empty response"));
    }

    #[tokio::test]
    async fn test_panic_becomes_unknown_error() {
        let exec = executor(Behaviour::Panic, Duration::from_secs(1));
        let err = exec.execute("scripted", params(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolRaised {
                source: ToolError::Panicked(_),
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.source_chain().unwrap().contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let exec = executor(Behaviour::Sleep(Duration::from_millis(200)), Duration::from_millis(20));
        let err = exec.execute("scripted", params(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::LlmError);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let exec = executor(Behaviour::Sleep(Duration::from_secs(5)), Duration::from_secs(10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = exec.execute("scripted", params(), &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(_)));
    }
}
