//! generate_workflow：根据意图与实体生成节点 + 边的工作流结构
//!
//! 后端生成优先；后端不可用或返回不可用内容时按意图模板组装（见 intent::templates）。
//! 无论来源，派生字段（复杂度、预估耗时）都在这里统一重算。

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{ErrorKind, ToolError};
use crate::intent::{template_workflow, EntityExtraction};
use crate::tools::llm_stage::{FallbackPolicy, LlmStage, Resolution};
use crate::tools::schema::{ParamType, ParameterSpec};
use crate::tools::{Tool, ToolResult};
use crate::workflow::{workflow_schema_json, NodeType, WorkflowStructure};

const STRUCTURED_CONFIDENCE: f64 = 0.8;
const TEMPLATE_CONFIDENCE: f64 = 0.7;

pub struct GenerateWorkflowTool {
    stage: LlmStage,
}

impl GenerateWorkflowTool {
    pub fn new(stage: LlmStage) -> Self {
        Self { stage }
    }

    fn prompt(user_input: &str, intent: &str, entities: &EntityExtraction) -> String {
        let entities_json = serde_json::to_string(entities).unwrap_or_else(|_| "{}".to_string());
        let node_types: Vec<&str> = NodeType::ALL.iter().map(|t| t.as_str()).collect();
        format!(
            "Task: generate_workflow\n\
             Design a workflow graph for the automation request.\n\
             Node types: {}\n\
             Every workflow starts at a dataInput node and ends at an output node.\n\
             Reply with JSON matching this schema:\n{}\n\n\
             Intent: {}\n\
             Entities: {}\n\
             Request: {}",
            node_types.join(", "),
            workflow_schema_json(),
            intent,
            entities_json,
            user_input
        )
    }
}

#[async_trait]
impl Tool for GenerateWorkflowTool {
    fn name(&self) -> &str {
        "generate_workflow"
    }

    fn description(&self) -> &str {
        "Generate a workflow graph of typed nodes and edges from an intent and its entities"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("userInput", ParamType::String, "Natural-language automation request"),
            ParameterSpec::required("intent", ParamType::String, "Intent label from classification"),
            ParameterSpec::optional("entities", ParamType::Object, "Entities from extraction"),
        ]
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let input = params
            .get("userInput")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if input.is_empty() {
            return Ok(ToolResult::failure("userInput must not be empty"));
        }
        let intent = params.get("intent").and_then(Value::as_str).unwrap_or_default();
        let entities: EntityExtraction = match params.get("entities") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
            _ => EntityExtraction::default(),
        };

        let prompt = Self::prompt(input, intent, &entities);
        let (mut workflow, confidence, tokens) =
            match self.stage.resolve::<WorkflowStructure>(&prompt).await {
                Resolution::Structured { value, tokens } if !value.nodes.is_empty() => {
                    (value, STRUCTURED_CONFIDENCE, tokens)
                }
                Resolution::Structured { .. } if self.stage.policy() == FallbackPolicy::Strict => {
                    return Ok(ToolResult::failure_with_kind(
                        "backend returned a workflow without nodes",
                        ErrorKind::LlmError,
                    ));
                }
                Resolution::Structured { .. } | Resolution::Heuristic(_) => {
                    (template_workflow(intent, &entities), TEMPLATE_CONFIDENCE, None)
                }
                Resolution::Failed(reason) => {
                    return Ok(ToolResult::failure_with_kind(reason, ErrorKind::LlmError));
                }
            };

        workflow.refresh_derived();
        Ok(ToolResult::ok(serde_json::to_value(&workflow)?)
            .with_confidence(confidence)
            .with_tokens(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::intent::labels;
    use crate::llm::{GenerationConfig, MockBackend};
    use crate::workflow::Complexity;

    fn tool(mock: MockBackend, policy: FallbackPolicy) -> GenerateWorkflowTool {
        GenerateWorkflowTool::new(LlmStage::new(Arc::new(mock), GenerationConfig::default(), policy))
    }

    #[tokio::test]
    async fn test_template_fallback() {
        let params = json!({
            "userInput": "Scrape https://example.com and summarize it",
            "intent": labels::WEB_SCRAPING,
            "entities": {"urls": ["https://example.com"], "aiTasks": ["summarization"]},
        });
        let result = tool(MockBackend::new(), FallbackPolicy::Heuristic)
            .execute(params)
            .await
            .unwrap();
        assert_eq!(result.confidence(), Some(TEMPLATE_CONFIDENCE));
        let workflow: WorkflowStructure = serde_json::from_value(result.data.unwrap()).unwrap();
        assert!(workflow.contains_type(NodeType::WebScraping));
        assert!(workflow.contains_type(NodeType::LlmTask));
        assert!(workflow.estimated_execution_time > 0);
    }

    #[tokio::test]
    async fn test_structured_workflow_gets_derived_fields() {
        let mock = MockBackend::new().respond_when(
            "Task: generate_workflow",
            r#"{"nodes": [
                {"id": "in", "type": "dataInput", "label": "Input"},
                {"id": "out", "type": "dataOutput", "label": "Output", "config": {"format": "json"}}
            ], "edges": [{"source": "in", "target": "out"}]}"#,
        );
        let result = tool(mock, FallbackPolicy::Heuristic)
            .execute(json!({"userInput": "pass data through", "intent": labels::GENERAL_AUTOMATION}))
            .await
            .unwrap();
        assert_eq!(result.confidence(), Some(STRUCTURED_CONFIDENCE));
        let workflow: WorkflowStructure = serde_json::from_value(result.data.unwrap()).unwrap();
        assert_eq!(workflow.complexity, Complexity::Simple);
        assert_eq!(workflow.estimated_execution_time, 300);
    }

    #[tokio::test]
    async fn test_strict_rejects_empty_workflow() {
        let mock = MockBackend::new().respond_when("Task: generate_workflow", r#"{"nodes": [], "edges": []}"#);
        let result = tool(mock, FallbackPolicy::Strict)
            .execute(json!({"userInput": "x", "intent": "A"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::LlmError));
    }

    #[test]
    fn test_prompt_embeds_schema() {
        let prompt = GenerateWorkflowTool::prompt("x", "A", &EntityExtraction::default());
        assert!(prompt.starts_with("Task: generate_workflow"));
        assert!(prompt.contains("webScraping"));
        assert!(prompt.contains("\"nodes\""));
    }
}
