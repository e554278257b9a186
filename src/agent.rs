//! 组装根
//!
//! 唯一知道具体实现的地方：按配置选择生成后端，注册六个管线工具，
//! 创建结果缓存并交给 Orchestrator。其它模块只依赖 trait 与注册表。

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::core::Orchestrator;
use crate::intent::ParsedIntent;
use crate::llm::{create_deepseek_backend, GenerationBackend, MockBackend, OpenAiBackend};
use crate::tools::{
    CacheLookupTool, ClassifyIntentTool, ExtractEntitiesTool, GenerateSuggestionsTool, GenerateWorkflowTool,
    LlmStage, ToolRegistry, ValidateWorkflowTool,
};

/// 根据配置与环境变量选择生成后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_backend_from_config(cfg: &AppConfig) -> Arc<dyn GenerationBackend> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let has_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai = std::env::var("OPENAI_API_KEY").is_ok();

    match provider.as_str() {
        "mock" => {
            tracing::info!("Using mock backend (heuristic stages)");
            Arc::new(MockBackend::new())
        }
        "deepseek" if has_deepseek || has_openai => {
            tracing::info!("Using DeepSeek backend ({})", cfg.llm.model);
            Arc::new(create_deepseek_backend(Some(cfg.llm.model.as_str())).with_request_timeout(timeout))
        }
        _ if has_openai => {
            tracing::info!("Using OpenAI-compatible backend ({})", cfg.llm.model);
            Arc::new(
                OpenAiBackend::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, None)
                    .with_request_timeout(timeout),
            )
        }
        _ => {
            tracing::warn!("No API key set or provider unknown, using mock backend");
            Arc::new(MockBackend::new())
        }
    }
}

/// 默认工具集：缓存探测 + 五个管线阶段
pub fn default_registry(
    cfg: &AppConfig,
    backend: Arc<dyn GenerationBackend>,
    cache: Arc<ResultCache<ParsedIntent>>,
) -> ToolRegistry {
    let stage = LlmStage::new(backend, cfg.llm.generation_config(), cfg.llm.fallback);

    let mut registry = ToolRegistry::new();
    registry.register(CacheLookupTool::new(cache).with_ttl(Duration::from_secs(cfg.cache.ttl_secs)));
    registry.register(ClassifyIntentTool::new(stage.clone()));
    registry.register(ExtractEntitiesTool::new(stage.clone()));
    registry.register(GenerateWorkflowTool::new(stage));
    registry.register(ValidateWorkflowTool::new(cfg.validation.limits()));
    registry.register(GenerateSuggestionsTool::new());
    registry
}

/// 用指定后端组装编排器（测试与嵌入场景注入 MockBackend）
pub fn create_orchestrator_with_backend(cfg: &AppConfig, backend: Arc<dyn GenerationBackend>) -> Orchestrator {
    let cache = Arc::new(ResultCache::new(
        cfg.cache.max_size,
        Duration::from_secs(cfg.cache.ttl_secs),
    ));
    let registry = default_registry(cfg, backend, cache.clone());
    Orchestrator::new(registry, cache, cfg.pipeline.options())
}

/// 按配置组装编排器
pub fn create_orchestrator(cfg: &AppConfig) -> Orchestrator {
    create_orchestrator_with_backend(cfg, create_backend_from_config(cfg))
}
