//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters / validate / execute），
//! 由 ToolRegistry 按名注册与查找，ToolExecutor 在调用时加超时并统一转 PipelineError。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::CacheError;
use crate::core::ToolError;
use crate::intent::ParsedIntent;
use crate::tools::result::ToolResult;
use crate::tools::schema::{validate_params, ParamValidation, ParameterSpec};

/// 工具 trait：名称、描述、参数声明、参数校验（默认只查必填与类型）、异步执行（params 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（注册表中的唯一键）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数声明，默认无参数
    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// 参数校验；工具可覆盖以做更细的检查
    fn validate(&self, params: &Value) -> ParamValidation {
        validate_params(&self.parameters(), params)
    }

    /// 执行工具；预期内的失败返回 Ok(ToolResult { success: false, .. })
    async fn execute(&self, params: Value) -> Result<ToolResult, ToolError>;

    /// 具备缓存能力的工具返回自身，编排器据此做缓存探测与回写
    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }
}

/// 缓存能力：按归一化键读写解析结果
pub trait Cacheable: Send + Sync {
    fn probe(&self, key: &str) -> Result<Option<ParsedIntent>, CacheError>;

    fn remember(&self, key: &str, intent: ParsedIntent) -> Result<(), CacheError>;
}

/// 工具注册表：保留注册顺序；同名重复注册覆盖旧实现但保留原位置
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => {
                tracing::debug!(tool = %name, "replacing registered tool");
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| self.tools[slot].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序列出工具名
    pub fn list(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// 移除工具，返回是否存在过
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(slot) = self.index.remove(name) else {
            return false;
        };
        self.tools.remove(slot);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.tools.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 已注册工具及其参数声明的 JSON
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
