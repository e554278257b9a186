//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FLOWBEE__*` 覆盖
//! （双下划线表示嵌套，如 `FLOWBEE__LLM__PROVIDER=openai`、`FLOWBEE__CACHE__MAX_SIZE=500`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{ConfidenceWeights, PipelineOptions};
use crate::llm::GenerationConfig;
use crate::tools::FallbackPolicy;
use crate::workflow::ValidationLimits;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub pipeline: PipelineSection,
    pub cache: CacheSection,
    pub validation: ValidationSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、生成参数与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；实际选择还取决于 API Key 是否存在
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 后端不可用或输出无法解析时的处理：heuristic / strict
    #[serde(default)]
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            fallback: FallbackPolicy::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次后端请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

/// [pipeline] 段：阶段超时、计划并行、置信度权重
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// 单个阶段（工具调用）超时（秒）
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    #[serde(default)]
    pub parallel_execution: bool,
    #[serde(default)]
    pub weights: ConfidenceWeights,
}

fn default_stage_timeout_secs() -> u64 {
    30
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            parallel_execution: false,
            weights: ConfidenceWeights::default(),
        }
    }
}

impl PipelineSection {
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
            parallel_execution: self.parallel_execution,
            weights: self.weights,
        }
    }
}

/// [cache] 段
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_max_size() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// [validation] 段：全局策略阈值
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSection {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_max_execution_time_ms")]
    pub max_execution_time_ms: u64,
}

fn default_max_nodes() -> usize {
    10
}

fn default_max_execution_time_ms() -> u64 {
    60_000
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            max_execution_time_ms: default_max_execution_time_ms(),
        }
    }
}

impl ValidationSection {
    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_nodes: self.max_nodes,
            max_execution_time_ms: self.max_execution_time_ms,
        }
    }
}

/// 从 config 目录加载配置，环境变量 FLOWBEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FLOWBEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FLOWBEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
