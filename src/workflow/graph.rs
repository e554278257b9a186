//! 工作流有向图分析
//!
//! 以邻接表表示节点 → 出边目标；提供连通性检查、悬空边检测与三色标记环检测（O(V+E)）。

use std::collections::{HashMap, HashSet};

use crate::workflow::types::*;

/// DFS 三色标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// 未访问
    White,
    /// 在当前递归栈上
    Gray,
    /// 子树已完成
    Black,
}

/// 工作流有向图（只读视图，不修改原结构）
pub struct WorkflowGraph<'a> {
    /// 节点 ID，保持原有顺序
    order: Vec<&'a str>,
    /// 邻接表：节点 ID -> 出边目标（仅包含已存在的节点）
    pub adjacency: HashMap<&'a str, Vec<&'a str>>,
    /// 每个节点关联的边数（入 + 出）
    pub degree: HashMap<&'a str, usize>,
    /// 引用了不存在节点的边
    dangling: Vec<&'a Edge>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn new(workflow: &'a WorkflowStructure) -> Self {
        let mut order = Vec::with_capacity(workflow.nodes.len());
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut degree: HashMap<&str, usize> = HashMap::new();

        for node in &workflow.nodes {
            if !adjacency.contains_key(node.id.as_str()) {
                order.push(node.id.as_str());
            }
            adjacency.entry(node.id.as_str()).or_default();
            degree.entry(node.id.as_str()).or_insert(0);
        }

        let mut dangling = Vec::new();
        for edge in &workflow.edges {
            let source = edge.source.as_str();
            let target = edge.target.as_str();
            if !adjacency.contains_key(source) || !adjacency.contains_key(target) {
                // 悬空边另行报告，但已存在的一端仍算作出现在边上
                for end in [source, target] {
                    if let Some(d) = degree.get_mut(end) {
                        *d += 1;
                    }
                }
                dangling.push(edge);
                continue;
            }
            adjacency.entry(source).or_default().push(target);
            *degree.entry(source).or_insert(0) += 1;
            if source != target {
                *degree.entry(target).or_insert(0) += 1;
            }
        }

        Self {
            order,
            adjacency,
            degree,
            dangling,
        }
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// 未出现在任何边上的节点（按原顺序）
    pub fn unconnected_nodes(&self) -> Vec<&'a str> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.degree.get(id).copied().unwrap_or(0) == 0)
            .collect()
    }

    /// 引用未知节点的边
    pub fn dangling_edges(&self) -> &[&'a Edge] {
        &self.dangling
    }

    /// 三色 DFS 环检测：从每个未访问节点重新出发；每棵 DFS 树最多报告一个环。
    /// 返回的路径从环入口开始，以重访的入口节点结束（如 A → B → C → A）。
    pub fn find_cycles(&self) -> Vec<Vec<&'a str>> {
        let mut color: HashMap<&str, Color> =
            self.order.iter().map(|id| (*id, Color::White)).collect();
        let mut cycles = Vec::new();

        for &root in &self.order {
            if color.get(root) != Some(&Color::White) {
                continue;
            }
            if let Some(cycle) = self.visit_tree(root, &mut color) {
                cycles.push(cycle);
            }
        }

        cycles
    }

    /// 迭代式 DFS，共享一个路径栈；找到第一个环后仍把树剩余部分标黑，避免重复报告
    fn visit_tree(&self, root: &'a str, color: &mut HashMap<&'a str, Color>) -> Option<Vec<&'a str>> {
        let mut found: Option<Vec<&'a str>> = None;
        // (节点, 下一个待检查的出边下标)
        let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
        color.insert(root, Color::Gray);

        while let Some((node, next)) = stack.last().copied() {
            let neighbors = self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next < neighbors.len() {
                let target = neighbors[next];
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match color.get(target).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(target, Color::Gray);
                        stack.push((target, 0));
                    }
                    Color::Gray => {
                        if found.is_none() {
                            let start = stack
                                .iter()
                                .position(|(id, _)| *id == target)
                                .unwrap_or(0);
                            let mut path: Vec<&str> =
                                stack[start..].iter().map(|(id, _)| *id).collect();
                            path.push(target);
                            found = Some(path);
                        }
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }

        found
    }

    pub fn has_cycle(&self) -> bool {
        !self.find_cycles().is_empty()
    }
}
