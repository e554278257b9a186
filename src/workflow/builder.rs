//! 工作流构建器
//!
//! 提供流畅的API来构建 WorkflowStructure：按顺序添加节点、连边、自动从左到右布局。

use serde_json::Value;

use crate::workflow::types::*;

/// 自动布局的水平 / 垂直间距
const X_SPACING: f64 = 250.0;
const Y_SPACING: f64 = 150.0;

/// 工作流构建器
pub struct WorkflowBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    topology: Topology,
    /// 最近添加的节点，用于 then() 串联
    last: Option<NodeId>,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            topology: Topology::default(),
            last: None,
        }
    }

    /// 添加节点（不连边）
    pub fn node(mut self, node: Node) -> Self {
        self.last = Some(node.id.clone());
        self.nodes.push(node);
        self
    }

    /// 添加节点并从上一个节点连一条边
    pub fn then(mut self, node: Node) -> Self {
        if let Some(prev) = self.last.take() {
            self.edges.push(Edge::new(prev, node.id.clone()));
        }
        self.node(node)
    }

    /// 显式连边
    pub fn edge(mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }

    /// 设置最近添加节点的一项配置
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.config.insert(key.into(), value.into());
        }
        self
    }

    pub fn topology(mut self, kind: TopologyKind, parallel_execution: bool) -> Self {
        self.topology = Topology {
            kind,
            parallel_execution,
        };
        self
    }

    /// 构建工作流：为缺少坐标的节点按拓扑层级布局，并计算派生字段
    pub fn build(self) -> WorkflowStructure {
        let mut workflow = WorkflowStructure {
            nodes: self.nodes,
            edges: self.edges,
            topology: self.topology,
            ..Default::default()
        };
        layout(&mut workflow);
        workflow.refresh_derived();
        workflow
    }
}

/// 按最长路径层级布局：层级决定 x，同层序号决定 y；环上的节点按出现顺序兜底
fn layout(workflow: &mut WorkflowStructure) {
    let count = workflow.nodes.len();
    let mut level = vec![0usize; count];
    let index_of = |id: &str, nodes: &[Node]| nodes.iter().position(|n| n.id == id);

    // 至多 count 轮松弛，环不会导致死循环
    for _ in 0..count {
        let mut changed = false;
        for edge in &workflow.edges {
            let (Some(s), Some(t)) = (
                index_of(&edge.source, &workflow.nodes),
                index_of(&edge.target, &workflow.nodes),
            ) else {
                continue;
            };
            if s != t && level[t] < level[s] + 1 && level[s] + 1 < count {
                level[t] = level[s] + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut rows = vec![0usize; count.max(1)];
    for (i, node) in workflow.nodes.iter_mut().enumerate() {
        let row = rows[level[i]];
        rows[level[i]] += 1;
        if node.position.is_none() {
            node.position = Some(Position {
                x: level[i] as f64 * X_SPACING,
                y: row as f64 * Y_SPACING,
            });
        }
    }
}
