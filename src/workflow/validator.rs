//! 工作流结构校验
//!
//! GraphValidator 对 WorkflowStructure 做只读检查：连通性、悬空边、环、按节点类型的必填配置、
//! 全局策略（入口/出口、节点数上限、预估耗时上限），返回问题列表与对应修复建议。

use serde::{Deserialize, Serialize};

use crate::workflow::graph::WorkflowGraph;
use crate::workflow::types::*;

/// 校验结果；is_valid 当且仅当 issues 为空
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub complexity: Complexity,
    pub estimated_execution_time: u64,
}

/// 全局策略阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// 超过该节点数视为过度复杂
    pub max_nodes: usize,
    /// 预估耗时上限（毫秒）
    pub max_execution_time_ms: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_nodes: 10,
            max_execution_time_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphValidator {
    limits: ValidationLimits,
}

impl GraphValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn validate(&self, workflow: &WorkflowStructure) -> ValidationReport {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();
        let graph = WorkflowGraph::new(workflow);

        if workflow.nodes.is_empty() {
            issues.push("Workflow contains no nodes".to_string());
            suggestions.push("Add at least an input and an output node".to_string());
        }

        // 连通性：单节点图豁免
        if graph.node_count() > 1 {
            for id in graph.unconnected_nodes() {
                issues.push(format!("Node '{}' is not connected to any other node", id));
                suggestions.push(format!("Connect node '{}' to the workflow or remove it", id));
            }
        }

        for edge in graph.dangling_edges() {
            issues.push(format!(
                "Edge {} -> {} references a node that does not exist",
                edge.source, edge.target
            ));
            suggestions.push(format!(
                "Remove the edge {} -> {} or add the missing node",
                edge.source, edge.target
            ));
        }

        for cycle in graph.find_cycles() {
            issues.push(format!("Cycle detected: {}", cycle.join(" -> ")));
            suggestions.push(format!(
                "Break the cycle by removing one of the edges between {}",
                cycle.join(", ")
            ));
        }

        for node in &workflow.nodes {
            check_node_config(node, &mut issues, &mut suggestions);
        }

        if !workflow.nodes.is_empty() {
            if !workflow.nodes.iter().any(|n| n.node_type.is_entry()) {
                issues.push("Workflow has no input node".to_string());
                suggestions.push("Add a dataInput node as the workflow entry point".to_string());
            }
            if !workflow.nodes.iter().any(|n| n.node_type.is_exit()) {
                issues.push("Workflow has no output node".to_string());
                suggestions.push("Add a dataOutput node to deliver the results".to_string());
            }
        }

        if workflow.nodes.len() > self.limits.max_nodes {
            issues.push(format!(
                "Workflow has {} nodes and is likely too complex (limit {})",
                workflow.nodes.len(),
                self.limits.max_nodes
            ));
            suggestions.push("Split the workflow into smaller sub-workflows".to_string());
        }

        let estimated_execution_time = workflow.estimate_execution_time();
        if estimated_execution_time > self.limits.max_execution_time_ms {
            issues.push(format!(
                "Estimated execution time {}ms exceeds {}ms",
                estimated_execution_time, self.limits.max_execution_time_ms
            ));
            suggestions.push(
                "Consider running independent branches in parallel or caching intermediate results"
                    .to_string(),
            );
        }

        ValidationReport {
            is_valid: issues.is_empty(),
            issues,
            suggestions,
            complexity: Complexity::from_node_count(workflow.nodes.len()),
            estimated_execution_time,
        }
    }
}

/// `{{variable}}` 形式的占位符
fn is_placeholder(value: &str) -> bool {
    value.starts_with("{{") && value.ends_with("}}") && value.len() > 4
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn check_node_config(node: &Node, issues: &mut Vec<String>, suggestions: &mut Vec<String>) {
    let mut require = |ok: bool, issue: &str, suggestion: &str| {
        if !ok {
            issues.push(format!("Node '{}' ({}): {}", node.id, node.node_type, issue));
            suggestions.push(format!("Node '{}': {}", node.id, suggestion));
        }
    };

    match node.node_type {
        NodeType::WebScraping => {
            let url_ok = node
                .config_str("url")
                .map(|u| is_url(u) || is_placeholder(u))
                .unwrap_or(false);
            require(
                url_ok,
                "missing a valid url",
                "set config.url to an http(s) URL or a {{variable}} placeholder",
            );
        }
        NodeType::LlmTask => require(
            node.config_str("prompt").is_some(),
            "missing prompt",
            "provide a non-empty config.prompt",
        ),
        NodeType::DataOutput => require(
            node.config_str("format").is_some(),
            "missing output format",
            "declare config.format (json, csv, markdown, ...)",
        ),
        NodeType::StructuredOutput => require(
            node.config.contains_key("schema"),
            "missing output schema",
            "define config.schema describing the expected fields",
        ),
        NodeType::SimilaritySearch => require(
            node.config.contains_key("topK") || node.config_str("query").is_some(),
            "missing topK or query",
            "set config.topK or config.query",
        ),
        NodeType::Database => require(
            node.config_str("table").is_some() || node.config_str("query").is_some(),
            "missing table or query",
            "set config.table or config.query",
        ),
        NodeType::Gmail => require(
            node.config_str("to").is_some(),
            "missing recipient",
            "set config.to to the destination address",
        ),
        NodeType::Discord => require(
            node.config_str("channel").is_some(),
            "missing channel",
            "set config.channel to the destination channel",
        ),
        NodeType::DataInput | NodeType::EmbeddingGenerator | NodeType::Pinecone => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str) -> Node {
        Node::new(id, NodeType::DataInput, "Input")
    }

    fn llm(id: &str) -> Node {
        Node::new(id, NodeType::LlmTask, "LLM").with_config("prompt", "Summarize {{input}}")
    }

    fn output(id: &str) -> Node {
        Node::new(id, NodeType::DataOutput, "Output").with_config("format", "json")
    }

    fn wf(nodes: Vec<Node>, edges: &[(&str, &str)]) -> WorkflowStructure {
        WorkflowStructure {
            nodes,
            edges: edges.iter().map(|(s, t)| Edge::new(*s, *t)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cycle_makes_workflow_invalid() {
        let workflow = wf(
            vec![input("A"), llm("B"), output("C")],
            &[("A", "B"), ("B", "C"), ("C", "A")],
        );
        let report = GraphValidator::default().validate(&workflow);
        assert!(!report.is_valid);
        let cycle = report
            .issues
            .iter()
            .find(|i| i.starts_with("Cycle detected"))
            .expect("cycle issue");
        assert!(cycle.contains('A') && cycle.contains('B') && cycle.contains('C'));
    }

    #[test]
    fn test_same_graph_without_back_edge_is_valid() {
        let workflow = wf(
            vec![input("A"), llm("B"), output("C")],
            &[("A", "B"), ("B", "C")],
        );
        let report = GraphValidator::default().validate(&workflow);
        assert!(report.is_valid, "issues: {:?}", report.issues);
        assert_eq!(report.complexity, Complexity::Simple);
    }

    #[test]
    fn test_reports_single_unconnected_node() {
        let workflow = wf(vec![input("n1"), llm("n2"), output("n3")], &[("n1", "n3")]);
        let report = GraphValidator::default().validate(&workflow);
        let unconnected: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.contains("not connected"))
            .collect();
        assert_eq!(unconnected.len(), 1);
        assert!(unconnected[0].contains("n2"));
    }

    #[test]
    fn test_dangling_edge_reported_once() {
        let workflow = wf(
            vec![input("a"), llm("b"), output("c")],
            &[("a", "b"), ("b", "c"), ("c", "ghost")],
        );
        let report = GraphValidator::default().validate(&workflow);
        assert!(!report.issues.iter().any(|i| i.contains("not connected")));
        assert_eq!(report.issues.len(), 1, "issues: {:?}", report.issues);
        assert!(report.issues[0].contains("c -> ghost"));
    }

    #[test]
    fn test_single_node_is_exempt_from_connectivity() {
        let workflow = wf(vec![input("only")], &[]);
        let report = GraphValidator::default().validate(&workflow);
        assert!(!report.issues.iter().any(|i| i.contains("not connected")));
    }

    #[test]
    fn test_missing_config_yields_issue_and_suggestion() {
        let scraper = Node::new("s", NodeType::WebScraping, "Scrape");
        let bare_llm = Node::new("l", NodeType::LlmTask, "LLM");
        let workflow = wf(
            vec![input("i"), scraper, bare_llm, output("o")],
            &[("i", "s"), ("s", "l"), ("l", "o")],
        );
        let report = GraphValidator::default().validate(&workflow);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.suggestions.len(), 2);
        assert!(report.issues[0].contains("url"));
        assert!(report.issues[1].contains("prompt"));
    }

    #[test]
    fn test_placeholder_url_is_accepted() {
        let scraper =
            Node::new("s", NodeType::WebScraping, "Scrape").with_config("url", "{{targetUrl}}");
        let workflow = wf(
            vec![input("i"), scraper, output("o")],
            &[("i", "s"), ("s", "o")],
        );
        assert!(GraphValidator::default().validate(&workflow).is_valid);
    }

    #[test]
    fn test_requires_entry_and_exit() {
        let workflow = wf(vec![llm("a"), llm("b")], &[("a", "b")]);
        let report = GraphValidator::default().validate(&workflow);
        assert!(report.issues.iter().any(|i| i.contains("no input node")));
        assert!(report.issues.iter().any(|i| i.contains("no output node")));
    }

    #[test]
    fn test_flags_large_and_slow_workflows() {
        let mut nodes = vec![input("in")];
        let mut edges = Vec::new();
        let mut prev = "in".to_string();
        for i in 0..10 {
            let id = format!("llm{}", i);
            nodes.push(llm(&id));
            edges.push(Edge::new(prev.clone(), id.clone()));
            prev = id;
        }
        nodes.push(output("out"));
        edges.push(Edge::new(prev, "out"));
        let workflow = WorkflowStructure {
            nodes,
            edges,
            ..Default::default()
        };
        let report = GraphValidator::default().validate(&workflow);
        assert!(report.issues.iter().any(|i| i.contains("too complex")));
        assert!(report.issues.iter().any(|i| i.contains("Estimated execution time")));
        assert_eq!(report.complexity, Complexity::Complex);
    }

    #[test]
    fn test_dangling_edge_reported() {
        let workflow = wf(vec![input("a"), output("b")], &[("a", "b"), ("b", "zzz")]);
        let report = GraphValidator::default().validate(&workflow);
        assert!(report.issues.iter().any(|i| i.contains("zzz")));
    }

    #[test]
    fn test_does_not_mutate_input() {
        let workflow = wf(vec![input("a"), output("b")], &[("a", "b")]);
        let before = workflow.clone();
        let _ = GraphValidator::default().validate(&workflow);
        assert_eq!(before, workflow);
    }
}
