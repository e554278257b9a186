//! 意图与实体类型定义

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowStructure;

/// 常用意图标签（意图本身是开放字符串，后端可返回任意标签）
pub mod labels {
    pub const WEB_SCRAPING: &str = "WEB_SCRAPING";
    pub const DATA_ANALYSIS: &str = "DATA_ANALYSIS";
    pub const CONTENT_GENERATION: &str = "CONTENT_GENERATION";
    pub const AI_PROCESSING: &str = "AI_PROCESSING";
    pub const SEMANTIC_SEARCH: &str = "SEMANTIC_SEARCH";
    pub const EMAIL_AUTOMATION: &str = "EMAIL_AUTOMATION";
    pub const NOTIFICATION: &str = "NOTIFICATION";
    pub const DATA_STORAGE: &str = "DATA_STORAGE";
    pub const GENERAL_AUTOMATION: &str = "GENERAL_AUTOMATION";
}

/// 意图分类结果（classify_intent 工具的输出）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentClassification {
    pub intent: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// 实体抽取结果；各列表保持出现顺序，允许重复
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityExtraction {
    pub urls: Vec<String>,
    pub data_types: Vec<String>,
    pub output_formats: Vec<String>,
    pub ai_tasks: Vec<String>,
    pub processing_steps: Vec<String>,
    pub target_sites: Vec<String>,
    pub data_sources: Vec<String>,
}

impl EntityExtraction {
    /// 抽取到的实体总数
    pub fn total(&self) -> usize {
        self.urls.len()
            + self.data_types.len()
            + self.output_formats.len()
            + self.ai_tasks.len()
            + self.processing_steps.len()
            + self.target_sites.len()
            + self.data_sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// 一次请求的完整解析结果；创建后不再修改，按归一化输入缓存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIntent {
    pub intent: String,
    pub confidence: f64,
    pub entities: EntityExtraction,
    pub workflow: WorkflowStructure,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_deserialize_partial() {
        let entities: EntityExtraction =
            serde_json::from_str(r#"{"urls": ["https://a.com"], "aiTasks": ["summarization"]}"#)
                .unwrap();
        assert_eq!(entities.urls, vec!["https://a.com"]);
        assert_eq!(entities.ai_tasks, vec!["summarization"]);
        assert!(entities.data_sources.is_empty());
        assert_eq!(entities.total(), 2);
    }
}
