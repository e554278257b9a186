//! extract_entities：抽取 URL、数据类型、输出格式、AI 任务、处理步骤、目标站点与数据源

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{ErrorKind, ToolError};
use crate::intent::{extract_entities, extraction_confidence, labels, EntityExtraction};
use crate::tools::llm_stage::{FallbackPolicy, LlmStage, Resolution};
use crate::tools::schema::{param_or_default, ParamType, ParameterSpec};
use crate::tools::{Tool, ToolResult};

/// 后端给出结构化抽取时的固定置信度
const STRUCTURED_CONFIDENCE: f64 = 0.85;

pub struct ExtractEntitiesTool {
    stage: LlmStage,
}

impl ExtractEntitiesTool {
    pub fn new(stage: LlmStage) -> Self {
        Self { stage }
    }

    fn prompt(user_input: &str, intent: Option<&str>) -> String {
        format!(
            "Task: extract_entities\n\
             Extract entities from the automation request{}.\n\
             Reply with JSON only, every field a list of strings:\n\
             {{\"urls\": [], \"dataTypes\": [], \"outputFormats\": [], \"aiTasks\": [], \
             \"processingSteps\": [], \"targetSites\": [], \"dataSources\": []}}\n\n\
             Request: {}",
            intent.map(|i| format!(" (intent: {})", i)).unwrap_or_default(),
            user_input
        )
    }
}

#[async_trait]
impl Tool for ExtractEntitiesTool {
    fn name(&self) -> &str {
        "extract_entities"
    }

    fn description(&self) -> &str {
        "Extract URLs, data types, output formats, AI tasks and processing steps from a request"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("userInput", ParamType::String, "Natural-language automation request"),
            ParameterSpec::optional("intent", ParamType::String, "Intent label from classification")
                .with_default(json!(labels::GENERAL_AUTOMATION)),
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
        let specs = self.parameters();
        let intent = param_or_default(&specs, &params, "intent").and_then(Value::as_str);

        let (entities, confidence, tokens) =
            match self.stage.resolve::<EntityExtraction>(&Self::prompt(input, intent)).await {
                Resolution::Structured { value, tokens } if !value.is_empty() => {
                    (value, STRUCTURED_CONFIDENCE, tokens)
                }
                // 空对象或包装错位的回复会被 serde 默认值吞成空抽取，这里与启发式结果比对
                Resolution::Structured { value, tokens } => {
                    let fallback = extract_entities(input);
                    if fallback.is_empty() {
                        (value, STRUCTURED_CONFIDENCE, tokens)
                    } else if self.stage.policy() == FallbackPolicy::Strict {
                        return Ok(ToolResult::failure_with_kind(
                            "backend returned no entities although the request contains some",
                            ErrorKind::LlmError,
                        ));
                    } else {
                        tracing::warn!("backend extraction is empty, using heuristic extractor");
                        let confidence = extraction_confidence(&fallback);
                        (fallback, confidence, None)
                    }
                }
                Resolution::Heuristic(_) => {
                    let entities = extract_entities(input);
                    let confidence = extraction_confidence(&entities);
                    (entities, confidence, None)
                }
                Resolution::Failed(reason) => {
                    return Ok(ToolResult::failure_with_kind(reason, ErrorKind::LlmError));
                }
            };

        Ok(ToolResult::ok(serde_json::to_value(&entities)?)
            .with_confidence(confidence)
            .with_tokens(tokens))
    }
}
