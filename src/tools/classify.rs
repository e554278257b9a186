//! classify_intent：把自然语言请求归入一个意图标签并给出置信度

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{ErrorKind, ToolError};
use crate::intent::{classify_intent, labels, IntentClassification};
use crate::tools::llm_stage::{LlmStage, Resolution};
use crate::tools::schema::{ParamType, ParameterSpec};
use crate::tools::{Tool, ToolResult};

const KNOWN_LABELS: [&str; 9] = [
    labels::WEB_SCRAPING,
    labels::DATA_ANALYSIS,
    labels::CONTENT_GENERATION,
    labels::AI_PROCESSING,
    labels::SEMANTIC_SEARCH,
    labels::EMAIL_AUTOMATION,
    labels::NOTIFICATION,
    labels::DATA_STORAGE,
    labels::GENERAL_AUTOMATION,
];

pub struct ClassifyIntentTool {
    stage: LlmStage,
}

impl ClassifyIntentTool {
    pub fn new(stage: LlmStage) -> Self {
        Self { stage }
    }

    fn prompt(user_input: &str) -> String {
        format!(
            "Task: classify_intent\n\
             Classify the automation request into one intent label.\n\
             Known labels: {}\n\
             Reply with JSON only: {{\"intent\": \"LABEL\", \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}\n\n\
             Request: {}",
            KNOWN_LABELS.join(", "),
            user_input
        )
    }
}

#[async_trait]
impl Tool for ClassifyIntentTool {
    fn name(&self) -> &str {
        "classify_intent"
    }

    fn description(&self) -> &str {
        "Classify an automation request into an intent label with a confidence score"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "userInput",
            ParamType::String,
            "Natural-language automation request",
        )]
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

        let (mut classification, tokens) = match self.stage.resolve::<IntentClassification>(&Self::prompt(input)).await {
            Resolution::Structured { value, tokens } if !value.intent.trim().is_empty() => (value, tokens),
            Resolution::Structured { .. } => (classify_intent(input), None),
            Resolution::Heuristic(_) => (classify_intent(input), None),
            Resolution::Failed(reason) => {
                return Ok(ToolResult::failure_with_kind(reason, ErrorKind::LlmError));
            }
        };

        classification.confidence = classification.confidence.clamp(0.0, 1.0);
        let confidence = classification.confidence;
        Ok(ToolResult::ok(serde_json::to_value(&classification)?)
            .with_confidence(confidence)
            .with_tokens(tokens))
    }
}
