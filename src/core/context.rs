//! 诊断上下文
//!
//! 一次失败的管线运行恰好生成一个 ErrorContext：失败阶段、工具、当时的输入参数、
//! 之前所有阶段的部分结果快照、错误分类、时间戳、会话 ID、原始输入、可选的错误链，
//! 以及按分类与阶段生成的可操作建议。创建后不可变。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::core::error::{ErrorKind, PipelineError};
use crate::core::state::PipelineStage;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    stage: PipelineStage,
    tool_name: Option<String>,
    input_parameters: Value,
    partial_results: BTreeMap<String, Value>,
    kind: ErrorKind,
    message: String,
    timestamp: DateTime<Utc>,
    session_id: String,
    user_input: String,
    stack_trace: Option<String>,
    suggestions: Vec<String>,
}

impl ErrorContext {
    /// 由编排器在失败点构造；partial_results 是失败前已完成阶段的快照
    pub fn new(
        stage: PipelineStage,
        tool_name: Option<String>,
        input_parameters: Value,
        partial_results: BTreeMap<String, Value>,
        error: &PipelineError,
        session_id: impl Into<String>,
        user_input: impl Into<String>,
    ) -> Self {
        let kind = error.kind();
        Self {
            stage,
            tool_name,
            input_parameters,
            suggestions: suggestions_for(kind, stage, &partial_results),
            partial_results,
            kind,
            message: error.to_string(),
            timestamp: Utc::now(),
            session_id: session_id.into(),
            user_input: user_input.into(),
            stack_trace: error.source_chain(),
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn input_parameters(&self) -> &Value {
        &self.input_parameters
    }

    pub fn partial_results(&self) -> &BTreeMap<String, Value> {
        &self.partial_results
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }
}

fn suggestions_for(
    kind: ErrorKind,
    stage: PipelineStage,
    partial: &BTreeMap<String, Value>,
) -> Vec<String> {
    let mut out = Vec::new();

    match kind {
        ErrorKind::ToolRegistryMiss => {
            out.push(format!(
                "Register the '{}' tool before running the pipeline",
                stage.tool_name()
            ));
            out.push("Check the orchestrator wiring at application start-up".to_string());
        }
        ErrorKind::ToolExecutionFailure => {
            out.push("Retry the request; the failure may be transient".to_string());
            out.push("Check the tool input parameters for missing or malformed values".to_string());
        }
        ErrorKind::LlmError => {
            out.push("Check the generation backend's API key and connectivity".to_string());
            out.push("Retry in a few seconds or switch to a different model".to_string());
        }
        ErrorKind::ValidationError => {
            out.push("Rephrase the request with a clearer input and output".to_string());
            out.push("Review the generated workflow's node configuration".to_string());
        }
        ErrorKind::CacheError => {
            out.push("Clear the result cache; the pipeline can run without it".to_string());
        }
        ErrorKind::Unknown => {
            out.push("Retry the request".to_string());
            out.push("Contact support with the diagnostic report if the problem persists".to_string());
        }
    }

    match stage {
        PipelineStage::ClassifyIntent => {
            out.push("Describe what you want to automate in one or two sentences".to_string());
        }
        PipelineStage::ExtractEntities => {
            out.push("Mention concrete URLs, data types or output formats".to_string());
        }
        PipelineStage::GenerateWorkflow if partial.contains_key("intent") => {
            out.push(
                "Your intent was understood; try simplifying the request to get a workflow"
                    .to_string(),
            );
        }
        _ => {}
    }

    out
}
