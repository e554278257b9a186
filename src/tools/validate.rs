//! validate_workflow：对生成的工作流做结构检查，返回 ValidationReport

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{ErrorKind, ToolError};
use crate::intent::extract_entities;
use crate::tools::schema::{ParamType, ParameterSpec};
use crate::tools::{Tool, ToolResult};
use crate::workflow::{GraphValidator, NodeType, ValidationLimits, WorkflowStructure};

pub struct ValidateWorkflowTool {
    validator: GraphValidator,
}

impl ValidateWorkflowTool {
    pub fn new(limits: ValidationLimits) -> Self {
        Self {
            validator: GraphValidator::new(limits),
        }
    }
}

impl Default for ValidateWorkflowTool {
    fn default() -> Self {
        Self::new(ValidationLimits::default())
    }
}

/// 有效 → 1.0；否则每个问题扣 0.1，最低 0.3
fn report_confidence(issue_count: usize) -> f64 {
    if issue_count == 0 {
        1.0
    } else {
        (1.0 - 0.1 * issue_count as f64).max(0.3)
    }
}

/// 原始请求中出现、但没有任何抓取节点引用的 URL
fn unused_urls(workflow: &WorkflowStructure, user_input: &str) -> Vec<String> {
    let scraped: Vec<&str> = workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::WebScraping)
        .filter_map(|n| n.config_str("url"))
        .collect();
    extract_entities(user_input)
        .urls
        .into_iter()
        .filter(|url| !scraped.iter().any(|s| s == url))
        .collect()
}

#[async_trait]
impl Tool for ValidateWorkflowTool {
    fn name(&self) -> &str {
        "validate_workflow"
    }

    fn description(&self) -> &str {
        "Check a workflow for connectivity, cycles, missing node configuration and size limits"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("workflow", ParamType::Object, "Workflow structure to check"),
            ParameterSpec::optional("originalInput", ParamType::String, "Original request, used to spot unused URLs"),
        ]
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let workflow: WorkflowStructure = match params.get("workflow").cloned().map(serde_json::from_value) {
            Some(Ok(w)) => w,
            Some(Err(e)) => {
                return Ok(ToolResult::failure_with_kind(
                    format!("workflow is malformed: {}", e),
                    ErrorKind::ValidationError,
                ));
            }
            None => return Ok(ToolResult::failure("workflow parameter is required")),
        };

        let mut report = self.validator.validate(&workflow);
        if let Some(input) = params.get("originalInput").and_then(Value::as_str) {
            for url in unused_urls(&workflow, input) {
                report
                    .suggestions
                    .push(format!("The request mentions {} but no scraping node uses it", url));
            }
        }

        let confidence = report_confidence(report.issues.len());
        Ok(ToolResult::ok(serde_json::to_value(&report)?).with_confidence(confidence))
    }
}
