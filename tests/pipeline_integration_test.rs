//! 管线集成测试：通过公开 API 驱动完整请求（Mock 后端，无需 API Key）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use flowbee::agent::{create_orchestrator_with_backend, default_registry};
use flowbee::cache::{CacheError, ResultCache};
use flowbee::config::AppConfig;
use flowbee::core::{
    create_execution_plan, ErrorKind, Orchestrator, PipelineOptions, PipelineStage, ToolError,
};
use flowbee::intent::{labels, ParsedIntent};
use flowbee::llm::{GenerationBackend, LlmError, MockBackend};
use flowbee::tools::{
    Cacheable, ClassifyIntentTool, FallbackPolicy, GenerateWorkflowTool, LlmStage, Tool, ToolRegistry, ToolResult,
};

const REQUEST: &str = "Scrape https://example.com and summarize it";

fn mock_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".to_string();
    cfg
}

/// 总是抛出内部错误的工具，用来替换某个阶段
struct BrokenTool {
    name: &'static str,
    calls: AtomicUsize,
}

impl BrokenTool {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ToolError::Internal("boom".to_string()))
    }
}

/// 执行时越界索引的工具
struct PanickingTool(&'static str);

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        self.0
    }

    fn description(&self) -> &str {
        "indexes past the end of an empty list"
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
        let picks: Vec<Value> = Vec::new();
        let at = picks.len() + 3;
        Ok(ToolResult::ok(picks[at].clone()))
    }
}

/// 缓存后端不可用的 cache_lookup
struct UnavailableCache;

#[async_trait]
impl Tool for UnavailableCache {
    fn name(&self) -> &str {
        "cache_lookup"
    }

    fn description(&self) -> &str {
        "cache that is always down"
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(json!({ "hit": false })))
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        Some(self)
    }
}

impl Cacheable for UnavailableCache {
    fn probe(&self, _key: &str) -> Result<Option<ParsedIntent>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    fn remember(&self, _key: &str, _intent: ParsedIntent) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

fn orchestrator_with(cfg: &AppConfig, backend: Arc<dyn GenerationBackend>, patch: impl FnOnce(&mut ToolRegistry)) -> Orchestrator {
    let cache = Arc::new(ResultCache::new(cfg.cache.max_size, Duration::from_secs(cfg.cache.ttl_secs)));
    let mut registry = default_registry(cfg, backend, cache.clone());
    patch(&mut registry);
    Orchestrator::new(registry, cache, cfg.pipeline.options())
}

#[tokio::test]
async fn test_scrape_and_summarize_end_to_end() {
    let cfg = mock_config();
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(MockBackend::new()));

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(outcome.success, "error: {:?}", outcome.error);
    assert!(outcome.error_context.is_none());
    assert_eq!(
        outcome.tools_used,
        vec![
            "classify_intent",
            "extract_entities",
            "generate_workflow",
            "validate_workflow",
            "generate_suggestions",
        ]
    );

    let data = outcome.data.expect("data on success");
    assert_eq!(data.parsed_intent.intent, labels::WEB_SCRAPING);
    assert_eq!(data.parsed_intent.entities.urls, vec!["https://example.com"]);
    assert!(!data.parsed_intent.workflow.nodes.is_empty());
    let validation = data.validation.expect("validation ran");
    assert!(validation.is_valid, "issues: {:?}", validation.issues);
    assert!(!data.suggestions.is_empty());
    assert!(outcome.confidence > 0.0 && outcome.confidence <= 1.0);
    assert!(!outcome.session_id.is_empty());
}

#[tokio::test]
async fn test_structured_backend_output_is_used() {
    let cfg = mock_config();
    let mock = MockBackend::new().respond_when(
        "Task: classify_intent",
        r#"{"intent": "DATA_ANALYSIS", "confidence": 0.95, "reasoning": "asked for analysis"}"#,
    );
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(mock));

    let outcome = orchestrator.process_request("Analyze last month's sales figures").await;
    assert!(outcome.success);
    let data = outcome.data.unwrap();
    assert_eq!(data.parsed_intent.intent, labels::DATA_ANALYSIS);
    assert_eq!(data.parsed_intent.confidence, 0.95);
    assert_eq!(data.parsed_intent.reasoning, "asked for analysis");
}

#[tokio::test]
async fn test_repeated_request_is_served_from_cache() {
    let cfg = mock_config();
    let mock = Arc::new(MockBackend::new());
    let backend: Arc<dyn GenerationBackend> = mock.clone();
    let orchestrator = create_orchestrator_with_backend(&cfg, backend);

    let first = orchestrator.process_request(REQUEST).await;
    assert!(first.success);

    // 大小写与空白不同，归一化后是同一个键
    let second = orchestrator
        .process_request("  scrape   HTTPS://EXAMPLE.COM and Summarize it ")
        .await;
    assert!(second.success);
    assert_eq!(second.tools_used, vec!["cache_lookup"]);
    assert_eq!(second.confidence, 0.9);
    assert_ne!(first.session_id, second.session_id);

    let cached = second.data.unwrap();
    assert_eq!(cached.parsed_intent.intent, first.data.unwrap().parsed_intent.intent);
    assert!(cached.validation.is_none());
    assert!(cached.suggestions.is_empty());

    assert_eq!(mock.calls_matching("Task: generate_workflow"), 1);
    let stats = orchestrator.cache_stats().unwrap();
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_failure_keeps_partial_results() {
    let mut cfg = mock_config();
    cfg.llm.fallback = FallbackPolicy::Strict;
    let mock = MockBackend::new()
        .respond_when(
            "Task: classify_intent",
            r#"{"intent": "WEB_SCRAPING", "confidence": 0.9, "reasoning": "url present"}"#,
        )
        .respond_when("Task: extract_entities", r#"{"urls": ["https://example.com"]}"#)
        .fail_when("Task: generate_workflow", LlmError::ApiError("rate limited".to_string()));
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(mock));

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(!outcome.success);
    assert!(outcome.data.is_none());
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.tools_used, vec!["classify_intent", "extract_entities"]);

    let ctx = outcome.error_context.expect("error context on failure");
    assert_eq!(ctx.stage(), PipelineStage::GenerateWorkflow);
    assert_eq!(ctx.tool_name(), Some("generate_workflow"));
    assert_eq!(ctx.kind(), ErrorKind::LlmError);
    assert_eq!(ctx.user_input(), REQUEST);
    assert_eq!(ctx.session_id(), outcome.session_id);
    assert_eq!(ctx.input_parameters()["intent"], "WEB_SCRAPING");

    let partial = ctx.partial_results();
    assert_eq!(partial["intent"]["intent"], "WEB_SCRAPING");
    assert_eq!(partial["entities"]["urls"][0], "https://example.com");
    assert!(!partial.contains_key("workflow"));
    assert!(!ctx.suggestions().is_empty());

    let user_text = orchestrator.reporter().format_for_user(&ctx);
    assert!(!user_text.is_empty());
    assert!(orchestrator.reporter().retry_recommendation(ctx.kind()).should_retry);
}

#[tokio::test]
async fn test_failed_request_is_not_cached() {
    let mut cfg = mock_config();
    cfg.llm.fallback = FallbackPolicy::Strict;
    let mock = MockBackend::new().fail_when("Task: classify_intent", LlmError::EmptyResponse);
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(mock));

    assert!(!orchestrator.process_request(REQUEST).await.success);
    let again = orchestrator.process_request(REQUEST).await;
    assert!(!again.success);
    assert_ne!(again.tools_used, vec!["cache_lookup"]);
}

#[tokio::test]
async fn test_missing_tool_is_registry_miss() {
    let cfg = mock_config();
    let backend: Arc<dyn GenerationBackend> = Arc::new(MockBackend::new());
    let stage = LlmStage::new(backend, cfg.llm.generation_config(), cfg.llm.fallback);

    let mut registry = ToolRegistry::new();
    registry.register(ClassifyIntentTool::new(stage.clone()));
    registry.register(GenerateWorkflowTool::new(stage));
    let orchestrator = Orchestrator::new(registry, Arc::new(ResultCache::default()), PipelineOptions::default());

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(!outcome.success);
    let ctx = outcome.error_context.unwrap();
    assert_eq!(ctx.stage(), PipelineStage::ExtractEntities);
    assert_eq!(ctx.kind(), ErrorKind::ToolRegistryMiss);
    assert!(!orchestrator.reporter().retry_recommendation(ctx.kind()).should_retry);
    assert!(ctx.partial_results().contains_key("intent"));
}

#[tokio::test]
async fn test_empty_input_fails_at_classification() {
    let cfg = mock_config();
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(MockBackend::new()));

    let outcome = orchestrator.process_request("   ").await;
    assert!(!outcome.success);
    let ctx = outcome.error_context.unwrap();
    assert_eq!(ctx.stage(), PipelineStage::ClassifyIntent);
    assert_eq!(ctx.kind(), ErrorKind::ToolExecutionFailure);
    assert!(ctx.partial_results().is_empty());
}

#[tokio::test]
async fn test_validation_failure_is_not_fatal() {
    let cfg = mock_config();
    let orchestrator = orchestrator_with(&cfg, Arc::new(MockBackend::new()), |registry| {
        registry.register(BrokenTool::new("validate_workflow"));
    });

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(outcome.success);
    assert!(outcome.error_context.is_none());
    assert!(!outcome.tools_used.iter().any(|t| t == "validate_workflow"));
    assert!(outcome.tools_used.iter().any(|t| t == "generate_suggestions"));
    let data = outcome.data.unwrap();
    assert!(data.validation.is_none());
    assert!(!data.suggestions.is_empty());
}

#[tokio::test]
async fn test_suggestion_failure_is_not_fatal() {
    let cfg = mock_config();
    let orchestrator = orchestrator_with(&cfg, Arc::new(MockBackend::new()), |registry| {
        registry.register(BrokenTool::new("generate_suggestions"));
    });

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(outcome.success);
    assert_eq!(outcome.tools_used.len(), 4);
    let data = outcome.data.unwrap();
    assert!(data.validation.is_some());
    assert!(data.suggestions.is_empty());
}

#[tokio::test]
async fn test_cache_probe_failure_is_treated_as_miss() {
    let cfg = mock_config();
    let orchestrator = orchestrator_with(&cfg, Arc::new(MockBackend::new()), |registry| {
        registry.register(UnavailableCache);
    });

    let first = orchestrator.process_request(REQUEST).await;
    assert!(first.success);
    assert_eq!(first.tools_used.len(), 5);

    // 回写也失败，第二次仍然完整执行
    let second = orchestrator.process_request(REQUEST).await;
    assert!(second.success);
    assert_eq!(second.tools_used.len(), 5);
}

#[tokio::test]
async fn test_slow_backend_times_out_as_llm_error() {
    let cfg = mock_config();
    let backend: Arc<dyn GenerationBackend> = Arc::new(MockBackend::new().with_delay(Duration::from_millis(500)));
    let cache = Arc::new(ResultCache::default());
    let registry = default_registry(&cfg, backend, cache.clone());
    let options = PipelineOptions {
        stage_timeout: Duration::from_millis(50),
        ..PipelineOptions::default()
    };
    let orchestrator = Orchestrator::new(registry, cache, options);

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(!outcome.success);
    let ctx = outcome.error_context.unwrap();
    assert_eq!(ctx.stage(), PipelineStage::ClassifyIntent);
    assert_eq!(ctx.kind(), ErrorKind::LlmError);
}

#[tokio::test]
async fn test_cancelled_orchestrator_rejects_requests() {
    let cfg = mock_config();
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(MockBackend::new()));
    orchestrator.cancel();

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_context.unwrap().kind(), ErrorKind::LlmError);
}

#[tokio::test]
async fn test_confidence_uses_configured_weights() {
    let mut cfg = mock_config();
    cfg.pipeline.weights.intent = 1.0;
    cfg.pipeline.weights.entities = 0.0;
    cfg.pipeline.weights.workflow = 0.0;
    cfg.pipeline.weights.validation = 0.0;
    let mock = MockBackend::new().respond_when(
        "Task: classify_intent",
        r#"{"intent": "WEB_SCRAPING", "confidence": 0.42, "reasoning": "r"}"#,
    );
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(mock));

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(outcome.success);
    assert!((outcome.confidence - 0.42).abs() < 1e-9);
}

#[tokio::test]
async fn test_run_plan_in_parallel() {
    let mut cfg = mock_config();
    cfg.pipeline.parallel_execution = true;
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(MockBackend::new()));

    let plan = create_execution_plan(&[
        "classify_intent",
        "extract_entities",
        "generate_workflow",
        "validate_workflow",
        "generate_suggestions",
    ]);
    assert_eq!(plan.waves.last().map(|w| w.len()), Some(2));

    let run = orchestrator.run_plan(&plan, REQUEST).await;
    assert!(run.succeeded(), "failures: {:?}", run.failures);
    assert_eq!(run.outputs.len(), 5);
    let report = run.outputs["validate_workflow"].data.as_ref().unwrap();
    assert_eq!(report["isValid"], true);
}

#[tokio::test]
async fn test_run_plan_skips_after_failure() {
    let cfg = mock_config();
    let broken = Arc::new(BrokenTool::new("extract_entities"));
    let orchestrator = orchestrator_with(&cfg, Arc::new(MockBackend::new()), |registry| {
        registry.register_arc(broken.clone());
    });

    let plan = create_execution_plan(&["classify_intent", "extract_entities", "generate_workflow"]);
    let run = orchestrator.run_plan(&plan, REQUEST).await;
    assert!(run.outputs.contains_key("classify_intent"));
    assert!(run.failures.contains_key("extract_entities"));
    assert_eq!(run.skipped, vec!["generate_workflow".to_string()]);
    assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_tool_yields_diagnostic() {
    let cfg = mock_config();
    let orchestrator = orchestrator_with(&cfg, Arc::new(MockBackend::new()), |registry| {
        registry.register(PanickingTool("classify_intent"));
    });

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(!outcome.success);
    assert!(outcome.data.is_none());
    let ctx = outcome.error_context.expect("error context on panic");
    assert_eq!(ctx.stage(), PipelineStage::ClassifyIntent);
    assert_eq!(ctx.kind(), ErrorKind::Unknown);
    assert!(ctx.stack_trace().unwrap_or_default().contains("index out of bounds"));

    // 编排器在 panic 之后仍可继续处理请求
    let again = orchestrator.process_request(REQUEST).await;
    assert!(!again.success);
}

#[tokio::test]
async fn test_wrapped_entity_reply_keeps_user_urls() {
    let cfg = mock_config();
    let mock = MockBackend::new().respond_when(
        "Task: extract_entities",
        r#"{"entities": {"urls": ["https://example.com"]}}"#,
    );
    let orchestrator = create_orchestrator_with_backend(&cfg, Arc::new(mock));

    let outcome = orchestrator.process_request(REQUEST).await;
    assert!(outcome.success, "error: {:?}", outcome.error);
    let parsed = outcome.data.unwrap().parsed_intent;
    assert_eq!(parsed.entities.urls, vec!["https://example.com"]);
    let scrape_urls: Vec<_> = parsed
        .workflow
        .nodes
        .iter()
        .filter_map(|n| n.config.get("url"))
        .collect();
    assert_eq!(scrape_urls, vec![&json!("https://example.com")]);
}
