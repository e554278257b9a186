//! 管线阶段定义
//!
//! 六个阶段严格按序执行；除缓存探测外每个阶段对应一个已注册工具。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 固定顺序的管线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    CacheProbe,
    ClassifyIntent,
    ExtractEntities,
    GenerateWorkflow,
    ValidateWorkflow,
    GenerateSuggestions,
}

impl PipelineStage {
    pub const ORDER: [PipelineStage; 6] = [
        PipelineStage::CacheProbe,
        PipelineStage::ClassifyIntent,
        PipelineStage::ExtractEntities,
        PipelineStage::GenerateWorkflow,
        PipelineStage::ValidateWorkflow,
        PipelineStage::GenerateSuggestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::CacheProbe => "cache_probe",
            PipelineStage::ClassifyIntent => "intent_classification",
            PipelineStage::ExtractEntities => "entity_extraction",
            PipelineStage::GenerateWorkflow => "workflow_generation",
            PipelineStage::ValidateWorkflow => "workflow_validation",
            PipelineStage::GenerateSuggestions => "suggestion_generation",
        }
    }

    /// 阶段调用的工具名
    pub fn tool_name(&self) -> &'static str {
        match self {
            PipelineStage::CacheProbe => "cache_lookup",
            PipelineStage::ClassifyIntent => "classify_intent",
            PipelineStage::ExtractEntities => "extract_entities",
            PipelineStage::GenerateWorkflow => "generate_workflow",
            PipelineStage::ValidateWorkflow => "validate_workflow",
            PipelineStage::GenerateSuggestions => "generate_suggestions",
        }
    }

    /// 失败是否终止本次运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineStage::ClassifyIntent
                | PipelineStage::ExtractEntities
                | PipelineStage::GenerateWorkflow
        )
    }

    /// 按工具名反查阶段
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|s| s.tool_name() == name)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
