//! generate_suggestions：基于工作流形状、实体与校验结果给出改进建议（纯规则，不调用后端）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{ErrorKind, ToolError};
use crate::intent::EntityExtraction;
use crate::tools::schema::{ParamType, ParameterSpec};
use crate::tools::{Tool, ToolResult};
use crate::workflow::{NodeType, TopologyKind, ValidationReport, WorkflowStructure};

const SUGGESTION_CONFIDENCE: f64 = 0.7;
/// 预估耗时超过该值时建议后台运行
const SLOW_WORKFLOW_MS: u64 = 30_000;
/// 最多转述的校验问题条数
const MAX_ISSUE_HINTS: usize = 3;

#[derive(Default)]
pub struct GenerateSuggestionsTool;

impl GenerateSuggestionsTool {
    pub fn new() -> Self {
        Self
    }
}

pub fn suggest(
    workflow: &WorkflowStructure,
    entities: &EntityExtraction,
    validation: Option<&ValidationReport>,
) -> Vec<String> {
    let mut out = Vec::new();

    let count = |t: NodeType| workflow.nodes.iter().filter(|n| n.node_type == t).count();

    if let Some(report) = validation {
        for issue in report.issues.iter().take(MAX_ISSUE_HINTS) {
            out.push(format!("Resolve: {}", issue));
        }
    }

    let scrapers = count(NodeType::WebScraping);
    if scrapers > 0 {
        out.push("Add retry and rate limiting to the scraping steps".to_string());
    }
    if scrapers > 1 && workflow.topology.kind == TopologyKind::ForkJoin && !workflow.topology.parallel_execution {
        out.push("Run the independent scraping branches in parallel".to_string());
    }
    if count(NodeType::LlmTask) > 1 {
        out.push("Combine consecutive LLM tasks into one prompt to cut latency".to_string());
    }
    if count(NodeType::EmbeddingGenerator) > 0 {
        out.push("Cache embeddings for content that does not change between runs".to_string());
    }
    if entities.output_formats.is_empty() {
        out.push("Specify an output format such as json, csv or markdown".to_string());
    }
    if workflow.estimated_execution_time > SLOW_WORKFLOW_MS {
        out.push("Schedule this workflow to run in the background".to_string());
    }

    if out.is_empty() {
        out.push("Add a notification step to hear about failed runs".to_string());
    }
    out
}

#[async_trait]
impl Tool for GenerateSuggestionsTool {
    fn name(&self) -> &str {
        "generate_suggestions"
    }

    fn description(&self) -> &str {
        "Suggest improvements for a generated workflow"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("workflow", ParamType::Object, "Generated workflow"),
            ParameterSpec::optional(
                "context",
                ParamType::Object,
                "Request context: intent, entities and the validation report when available",
            ),
        ]
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let workflow: WorkflowStructure = match params.get("workflow").cloned().map(serde_json::from_value) {
            Some(Ok(w)) => w,
            _ => {
                return Ok(ToolResult::failure_with_kind(
                    "workflow parameter is missing or malformed",
                    ErrorKind::ValidationError,
                ));
            }
        };
        let context = params.get("context").cloned().unwrap_or(Value::Null);
        let entities: EntityExtraction = match context.get("entities") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
            _ => EntityExtraction::default(),
        };
        let validation: Option<ValidationReport> = match context.get("validation") {
            Some(v) if !v.is_null() => Some(serde_json::from_value(v.clone())?),
            _ => None,
        };

        let suggestions = suggest(&workflow, &entities, validation.as_ref());
        Ok(ToolResult::ok(json!({ "suggestions": suggestions })).with_confidence(SUGGESTION_CONFIDENCE))
    }
}
