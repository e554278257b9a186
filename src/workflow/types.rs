//! 工作流结构类型定义
//!
//! 管线产出的有向图：节点（类型、标签、配置、布局坐标）+ 边 + 拓扑描述 + 派生字段。
//! 图不保证无环；环与悬空边由 GraphValidator 报告，不在此处修复。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type NodeId = String;

/// 节点类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    /// 数据输入（入口）
    DataInput,
    /// 网页抓取
    WebScraping,
    /// LLM 任务（摘要、分类、生成等）
    LlmTask,
    /// 结构化输出
    StructuredOutput,
    /// 向量化
    EmbeddingGenerator,
    /// 相似度检索
    SimilaritySearch,
    /// 数据输出（出口）
    DataOutput,
    /// 数据库读写
    Database,
    /// 邮件集成
    Gmail,
    /// 消息集成
    Discord,
    /// 向量库集成
    Pinecone,
}

impl NodeType {
    pub const ALL: [NodeType; 11] = [
        NodeType::DataInput,
        NodeType::WebScraping,
        NodeType::LlmTask,
        NodeType::StructuredOutput,
        NodeType::EmbeddingGenerator,
        NodeType::SimilaritySearch,
        NodeType::DataOutput,
        NodeType::Database,
        NodeType::Gmail,
        NodeType::Discord,
        NodeType::Pinecone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::DataInput => "dataInput",
            NodeType::WebScraping => "webScraping",
            NodeType::LlmTask => "llmTask",
            NodeType::StructuredOutput => "structuredOutput",
            NodeType::EmbeddingGenerator => "embeddingGenerator",
            NodeType::SimilaritySearch => "similaritySearch",
            NodeType::DataOutput => "dataOutput",
            NodeType::Database => "database",
            NodeType::Gmail => "gmail",
            NodeType::Discord => "discord",
            NodeType::Pinecone => "pinecone",
        }
    }

    /// 可作为工作流入口的类型
    pub fn is_entry(&self) -> bool {
        matches!(self, NodeType::DataInput)
    }

    /// 可作为工作流出口的类型（输出节点与外发集成）
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            NodeType::DataOutput | NodeType::Gmail | NodeType::Discord | NodeType::Database
        )
    }

    /// 单节点预估执行耗时（毫秒）
    pub fn estimated_duration_ms(&self) -> u64 {
        match self {
            NodeType::DataInput => 100,
            NodeType::WebScraping => 5_000,
            NodeType::LlmTask => 8_000,
            NodeType::StructuredOutput => 3_000,
            NodeType::EmbeddingGenerator => 2_000,
            NodeType::SimilaritySearch => 1_000,
            NodeType::DataOutput => 200,
            NodeType::Database => 500,
            NodeType::Gmail => 1_500,
            NodeType::Discord => 1_000,
            NodeType::Pinecone => 1_000,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 画布坐标（可选）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// 工作流节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    /// 自由配置（url、prompt、format 等）
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            config: Map::new(),
            position: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    /// 读取字符串配置，空白视为缺失
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 有向边（不去重，允许自环）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// 拓扑形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyKind {
    #[default]
    Linear,
    ForkJoin,
    Branching,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(rename = "type", default)]
    pub kind: TopologyKind,
    /// 是否期望并行执行（执行引擎消费，管线本身始终按序运行阶段）
    #[serde(default)]
    pub parallel_execution: bool,
}

/// 复杂度分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn from_node_count(count: usize) -> Self {
        match count {
            0..=3 => Complexity::Simple,
            4..=6 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }
}

/// 工作流结构（管线最终产物）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStructure {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub complexity: Complexity,
    /// 预估总耗时（毫秒）
    #[serde(default)]
    pub estimated_execution_time: u64,
    /// 校验规则发现的问题
    #[serde(default)]
    pub validation_rules: Vec<String>,
}

impl WorkflowStructure {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_type(&self, node_type: NodeType) -> bool {
        self.nodes.iter().any(|n| n.node_type == node_type)
    }

    /// 按节点类型耗时表累加的预估执行时间
    pub fn estimate_execution_time(&self) -> u64 {
        self.nodes
            .iter()
            .map(|n| n.node_type.estimated_duration_ms())
            .sum()
    }

    /// 重新计算 complexity / estimated_execution_time
    pub fn refresh_derived(&mut self) {
        self.complexity = Complexity::from_node_count(self.nodes.len());
        self.estimated_execution_time = self.estimate_execution_time();
    }
}

/// 返回 WorkflowStructure 的 JSON Schema，拼入生成 prompt 以约束后端输出格式
pub fn workflow_schema_json() -> String {
    let schema = schemars::schema_for!(WorkflowStructure);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
