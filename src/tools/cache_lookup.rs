//! cache_lookup：包装 ResultCache，既可作为普通工具按键查询，也为编排器提供 Cacheable 能力

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::cache::{normalize_key, CacheError, ResultCache};
use crate::core::{ErrorKind, ToolError};
use crate::intent::ParsedIntent;
use crate::tools::schema::{ParamType, ParameterSpec};
use crate::tools::{Cacheable, Tool, ToolResult};

/// 缓存命中时报告的置信度
pub const CACHE_HIT_CONFIDENCE: f64 = 0.9;

pub struct CacheLookupTool {
    cache: Arc<ResultCache<ParsedIntent>>,
    ttl: Duration,
}

impl CacheLookupTool {
    pub fn new(cache: Arc<ResultCache<ParsedIntent>>) -> Self {
        let ttl = cache.default_ttl();
        Self { cache, ttl }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache<ParsedIntent>> {
        &self.cache
    }
}

impl Cacheable for CacheLookupTool {
    fn probe(&self, key: &str) -> Result<Option<ParsedIntent>, CacheError> {
        self.cache.lookup(key)
    }

    fn remember(&self, key: &str, intent: ParsedIntent) -> Result<(), CacheError> {
        self.cache.store(key, intent, self.ttl)
    }
}

#[async_trait]
impl Tool for CacheLookupTool {
    fn name(&self) -> &str {
        "cache_lookup"
    }

    fn description(&self) -> &str {
        "Look up a previously parsed request in the result cache"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required("userInput", ParamType::String, "Request text; normalized before lookup")]
    }

    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError> {
        let input = params.get("userInput").and_then(Value::as_str).unwrap_or_default();
        match self.cache.lookup(&normalize_key(input)) {
            Ok(Some(hit)) => Ok(ToolResult::ok(json!({ "hit": true, "parsedIntent": hit }))
                .with_confidence(CACHE_HIT_CONFIDENCE)),
            Ok(None) => Ok(ToolResult::ok(json!({ "hit": false }))),
            Err(e) => Ok(ToolResult::failure_with_kind(e.to_string(), ErrorKind::CacheError)),
        }
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        Some(self)
    }
}
