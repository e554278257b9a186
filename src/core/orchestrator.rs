//! 管线编排器
//!
//! process_request 按固定顺序驱动各阶段：缓存探测 → 意图分类 → 实体抽取 → 工作流生成
//! （结果写回缓存）→ 工作流校验 → 改进建议。前三个工具阶段失败即终止并返回带 ErrorContext 的失败结果，
//! 后两个阶段失败只记日志、跳过。process_request 从不返回 Err：所有失败都编码在 PipelineOutcome 中。
//!
//! 工具全部通过注册表查找，编排器不直接持有任何具体工具。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{normalize_key, CacheStats, ResultCache};
use crate::core::context::ErrorContext;
use crate::core::error::{ErrorKind, PipelineError};
use crate::core::plan::ExecutionPlan;
use crate::core::reporter::ErrorReporter;
use crate::core::state::PipelineStage;
use crate::intent::{labels, EntityExtraction, IntentClassification, ParsedIntent};
use crate::tools::{CacheLookupTool, ToolExecutor, ToolRegistry, ToolResult, CACHE_HIT_CONFIDENCE};
use crate::workflow::{ValidationReport, WorkflowStructure};

/// 无任何阶段报告置信度时的整体置信度
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 各阶段置信度的聚合权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "default_intent_weight")]
    pub intent: f64,
    #[serde(default = "default_entities_weight")]
    pub entities: f64,
    #[serde(default = "default_workflow_weight")]
    pub workflow: f64,
    #[serde(default = "default_validation_weight")]
    pub validation: f64,
}

fn default_intent_weight() -> f64 {
    0.3
}
fn default_entities_weight() -> f64 {
    0.2
}
fn default_workflow_weight() -> f64 {
    0.3
}
fn default_validation_weight() -> f64 {
    0.2
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            intent: default_intent_weight(),
            entities: default_entities_weight(),
            workflow: default_workflow_weight(),
            validation: default_validation_weight(),
        }
    }
}

impl ConfidenceWeights {
    fn weight(&self, stage: PipelineStage) -> Option<f64> {
        match stage {
            PipelineStage::ClassifyIntent => Some(self.intent),
            PipelineStage::ExtractEntities => Some(self.entities),
            PipelineStage::GenerateWorkflow => Some(self.workflow),
            PipelineStage::ValidateWorkflow => Some(self.validation),
            _ => None,
        }
    }

    /// 按权重对已报告的阶段置信度取加权平均；未报告的阶段不参与
    pub fn aggregate(&self, scores: &[(PipelineStage, f64)]) -> f64 {
        let (sum, total) = scores
            .iter()
            .filter_map(|(stage, score)| self.weight(*stage).map(|w| (w * score, w)))
            .fold((0.0, 0.0), |(s, t), (ws, w)| (s + ws, t + w));
        if total > 0.0 {
            (sum / total).clamp(0.0, 1.0)
        } else {
            DEFAULT_CONFIDENCE
        }
    }
}

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 每个工具调用的超时
    pub stage_timeout: Duration,
    /// run_plan 中同一波的工具是否并发执行
    pub parallel_execution: bool,
    pub weights: ConfidenceWeights,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(30),
            parallel_execution: false,
            weights: ConfidenceWeights::default(),
        }
    }
}

/// 成功运行的产物
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineData {
    pub parsed_intent: ParsedIntent,
    /// 缓存命中或校验阶段失败时为空
    pub validation: Option<ValidationReport>,
    pub suggestions: Vec<String>,
}

/// 一次请求的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PipelineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools_used: Vec<String>,
    pub execution_time_ms: u64,
    pub confidence: f64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_context: Option<ErrorContext>,
}

/// run_plan 的结果
#[derive(Debug, Default)]
pub struct PlanRun {
    pub outputs: BTreeMap<String, ToolResult>,
    pub failures: BTreeMap<String, String>,
    /// 因依赖失败而未执行的工具
    pub skipped: Vec<String>,
}

impl PlanRun {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// 单次运行的累积状态
struct Run<'a> {
    session_id: String,
    user_input: &'a str,
    started: Instant,
    tools_used: Vec<String>,
    scores: Vec<(PipelineStage, f64)>,
    /// 按工具名保存的阶段输出（构造后续阶段参数用）
    outputs: BTreeMap<String, Value>,
    /// 按结果名保存的部分结果快照（失败时写入 ErrorContext）
    partial: BTreeMap<String, Value>,
}

impl<'a> Run<'a> {
    fn new(user_input: &'a str) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_input,
            started: Instant::now(),
            tools_used: Vec::new(),
            scores: Vec::new(),
            outputs: BTreeMap::new(),
            partial: BTreeMap::new(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn record(&mut self, stage: PipelineStage, result: &ToolResult, data: Value) {
        self.tools_used.push(stage.tool_name().to_string());
        if let Some(confidence) = result.confidence() {
            self.scores.push((stage, confidence));
        }
        if let Some(key) = partial_key(stage) {
            self.partial.insert(key.to_string(), data.clone());
        }
        self.outputs.insert(stage.tool_name().to_string(), data);
    }
}

/// 阶段结果在部分结果快照中的名字
fn partial_key(stage: PipelineStage) -> Option<&'static str> {
    match stage {
        PipelineStage::ClassifyIntent => Some("intent"),
        PipelineStage::ExtractEntities => Some("entities"),
        PipelineStage::GenerateWorkflow => Some("workflow"),
        PipelineStage::ValidateWorkflow => Some("validation"),
        PipelineStage::GenerateSuggestions => Some("suggestions"),
        PipelineStage::CacheProbe => None,
    }
}

/// 根据已完成工具的输出构造某个工具的参数
pub fn stage_params(tool: &str, user_input: &str, outputs: &BTreeMap<String, Value>) -> Value {
    let output = |name: &str| outputs.get(name).cloned().unwrap_or(Value::Null);
    let intent = outputs
        .get("classify_intent")
        .and_then(|v| v.get("intent"))
        .cloned()
        .unwrap_or_else(|| json!(labels::GENERAL_AUTOMATION));

    let params = match tool {
        "extract_entities" => json!({ "userInput": user_input, "intent": intent }),
        "generate_workflow" => json!({
            "userInput": user_input,
            "intent": intent,
            "entities": output("extract_entities"),
        }),
        "validate_workflow" => json!({
            "workflow": output("generate_workflow"),
            "originalInput": user_input,
        }),
        "generate_suggestions" => json!({
            "workflow": output("generate_workflow"),
            "context": {
                "intent": intent,
                "entities": output("extract_entities"),
                "validation": output("validate_workflow"),
            },
        }),
        _ => json!({ "userInput": user_input }),
    };

    match params {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect::<Map<_, _>>()),
        other => other,
    }
}

pub struct Orchestrator {
    executor: ToolExecutor,
    cache: Arc<ResultCache<ParsedIntent>>,
    options: PipelineOptions,
    reporter: ErrorReporter,
    cancel_token: CancellationToken,
}

impl Orchestrator {
    /// 注册表中没有 cache_lookup 时，用给定缓存注册一个
    pub fn new(mut registry: ToolRegistry, cache: Arc<ResultCache<ParsedIntent>>, options: PipelineOptions) -> Self {
        if !registry.contains(PipelineStage::CacheProbe.tool_name()) {
            registry.register(CacheLookupTool::new(cache.clone()));
        }
        Self {
            executor: ToolExecutor::new(registry, options.stage_timeout),
            cache,
            options,
            reporter: ErrorReporter::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.stats().ok()
    }

    /// 清理过期缓存条目，返回清理数量
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cache purge failed");
            0
        })
    }

    /// 取消所有进行中的请求；之后的请求也会立即以取消失败
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 处理一次请求
    pub async fn process_request(&self, user_input: &str) -> PipelineOutcome {
        let mut run = Run::new(user_input);
        let cancel = self.cancel_token.child_token();
        let key = normalize_key(user_input);
        tracing::info!(session_id = %run.session_id, "pipeline started");

        if let Some(hit) = self.probe_cache(&key) {
            tracing::info!(session_id = %run.session_id, "served from cache");
            return PipelineOutcome {
                success: true,
                data: Some(PipelineData {
                    parsed_intent: hit,
                    validation: None,
                    suggestions: Vec::new(),
                }),
                error: None,
                tools_used: vec![PipelineStage::CacheProbe.tool_name().to_string()],
                execution_time_ms: run.elapsed_ms(),
                confidence: CACHE_HIT_CONFIDENCE,
                session_id: run.session_id,
                error_context: None,
            };
        }

        let classification: IntentClassification =
            match self.run_fatal(PipelineStage::ClassifyIntent, &mut run, &cancel).await {
                Ok(v) => v,
                Err(outcome) => return *outcome,
            };
        let entities: EntityExtraction =
            match self.run_fatal(PipelineStage::ExtractEntities, &mut run, &cancel).await {
                Ok(v) => v,
                Err(outcome) => return *outcome,
            };
        let workflow: WorkflowStructure =
            match self.run_fatal(PipelineStage::GenerateWorkflow, &mut run, &cancel).await {
                Ok(v) => v,
                Err(outcome) => return *outcome,
            };

        let parsed_intent = ParsedIntent {
            intent: classification.intent,
            confidence: classification.confidence,
            entities,
            workflow,
            reasoning: classification.reasoning,
        };
        self.remember(&key, &parsed_intent);

        let validation: Option<ValidationReport> =
            self.run_optional(PipelineStage::ValidateWorkflow, &mut run, &cancel).await;
        let suggestions = self
            .run_optional::<Value>(PipelineStage::GenerateSuggestions, &mut run, &cancel)
            .await
            .and_then(|v| v.get("suggestions").cloned())
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
            .unwrap_or_default();

        let confidence = self.options.weights.aggregate(&run.scores);
        tracing::info!(
            session_id = %run.session_id,
            confidence,
            tools = run.tools_used.len(),
            "pipeline finished"
        );
        PipelineOutcome {
            success: true,
            data: Some(PipelineData {
                parsed_intent,
                validation,
                suggestions,
            }),
            error: None,
            execution_time_ms: run.elapsed_ms(),
            confidence,
            session_id: run.session_id,
            tools_used: run.tools_used,
            error_context: None,
        }
    }

    /// 按执行计划运行工具：逐波执行，开启并行时同一波内并发；依赖失败的工具被跳过
    pub async fn run_plan(&self, plan: &ExecutionPlan, user_input: &str) -> PlanRun {
        let cancel = self.cancel_token.child_token();
        let mut run = PlanRun::default();
        let mut data: BTreeMap<String, Value> = BTreeMap::new();

        for wave in &plan.waves {
            let mut ready: Vec<(String, Value)> = Vec::new();
            for tool in wave {
                let blocked = plan
                    .step(tool)
                    .map(|s| s.depends_on.iter().any(|d| !run.outputs.contains_key(d)))
                    .unwrap_or(false);
                if blocked {
                    tracing::warn!(tool = %tool, "skipped: a dependency did not complete");
                    run.skipped.push(tool.clone());
                } else {
                    ready.push((tool.clone(), stage_params(tool, user_input, &data)));
                }
            }

            let results: Vec<(String, Result<ToolResult, PipelineError>)> = if self.options.parallel_execution {
                join_all(ready.into_iter().map(|(tool, params)| {
                    let cancel = &cancel;
                    async move {
                        let result = self.executor.execute(&tool, params, cancel).await;
                        (tool, result)
                    }
                }))
                .await
            } else {
                let mut results = Vec::new();
                for (tool, params) in ready {
                    let result = self.executor.execute(&tool, params, &cancel).await;
                    results.push((tool, result));
                }
                results
            };

            for (tool, result) in results {
                match result {
                    Ok(r) => {
                        data.insert(tool.clone(), r.data.clone().unwrap_or(Value::Null));
                        run.outputs.insert(tool, r);
                    }
                    Err(e) => {
                        tracing::warn!(tool = %tool, error = %e, "plan step failed");
                        run.failures.insert(tool, e.to_string());
                    }
                }
            }
        }

        run
    }

    fn probe_cache(&self, key: &str) -> Option<ParsedIntent> {
        let tool = self.executor.get_tool(PipelineStage::CacheProbe.tool_name())?;
        let cacheable = tool.as_cacheable()?;
        match cacheable.probe(key) {
            Ok(hit) => hit,
            Err(e) => {
                let err = PipelineError::Cache(e.to_string());
                tracing::warn!(error = %err, kind = %err.kind(), "cache probe failed, treating as miss");
                None
            }
        }
    }

    fn remember(&self, key: &str, parsed: &ParsedIntent) {
        let Some(tool) = self.executor.get_tool(PipelineStage::CacheProbe.tool_name()) else {
            return;
        };
        if let Some(cacheable) = tool.as_cacheable() {
            if let Err(e) = cacheable.remember(key, parsed.clone()) {
                let err = PipelineError::Cache(e.to_string());
                tracing::warn!(error = %err, kind = %err.kind(), "cache write failed");
            }
        }
    }

    /// 执行一个阶段并把输出反序列化为 T
    async fn run_stage<T: DeserializeOwned>(
        &self,
        stage: PipelineStage,
        params: &Value,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<T, PipelineError> {
        let tool = stage.tool_name();
        tracing::info!(session_id = %run.session_id, stage = %stage, "stage started");
        let result = self.executor.execute(tool, params.clone(), cancel).await?;
        let data = result.data.clone().unwrap_or(Value::Null);
        let typed = serde_json::from_value::<T>(data.clone()).map_err(|e| PipelineError::ToolFailed {
            tool: tool.to_string(),
            message: format!("returned malformed data: {}", e),
            kind: ErrorKind::ToolExecutionFailure,
        })?;
        run.record(stage, &result, data);
        tracing::info!(session_id = %run.session_id, stage = %stage, "stage finished");
        Ok(typed)
    }

    /// 致命阶段：失败时生成 ErrorContext 并返回失败结果
    async fn run_fatal<T: DeserializeOwned>(
        &self,
        stage: PipelineStage,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<T, Box<PipelineOutcome>> {
        let params = stage_params(stage.tool_name(), run.user_input, &run.outputs);
        match self.run_stage(stage, &params, run, cancel).await {
            Ok(v) => Ok(v),
            Err(e) => Err(Box::new(self.failure(stage, params, &e, run))),
        }
    }

    /// 非致命阶段：失败只记日志，不计入 tools_used
    async fn run_optional<T: DeserializeOwned>(
        &self,
        stage: PipelineStage,
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) -> Option<T> {
        let params = stage_params(stage.tool_name(), run.user_input, &run.outputs);
        match self.run_stage(stage, &params, run, cancel).await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(
                    session_id = %run.session_id,
                    stage = %stage,
                    kind = %e.kind(),
                    error = %e,
                    "non-fatal stage failed"
                );
                None
            }
        }
    }

    fn failure(&self, stage: PipelineStage, params: Value, error: &PipelineError, run: &Run<'_>) -> PipelineOutcome {
        let context = ErrorContext::new(
            stage,
            Some(stage.tool_name().to_string()),
            params,
            run.partial.clone(),
            error,
            run.session_id.clone(),
            run.user_input,
        );
        tracing::error!(
            session_id = %run.session_id,
            stage = %stage,
            kind = %context.kind(),
            error = %error,
            "pipeline failed"
        );
        tracing::debug!(report = %self.reporter.format_for_support(&context), "diagnostic");

        PipelineOutcome {
            success: false,
            data: None,
            error: Some(error.to_string()),
            tools_used: run.tools_used.clone(),
            execution_time_ms: run.elapsed_ms(),
            confidence: 0.0,
            session_id: run.session_id.clone(),
            error_context: Some(context),
        }
    }
}
