//! 执行计划
//!
//! 按静态依赖表把一组工具排成若干「波」：同一波内的工具彼此独立，可并发执行；
//! 后一波只依赖前面各波。依赖只在所请求的工具集合内生效。

use serde::Serialize;

/// 每个步骤的粗略耗时估计（毫秒）
pub const STEP_ESTIMATE_MS: u64 = 2_000;

/// 工具间的静态依赖
pub fn static_dependencies(tool: &str) -> &'static [&'static str] {
    match tool {
        "extract_entities" => &["classify_intent"],
        "generate_workflow" => &["classify_intent", "extract_entities"],
        "validate_workflow" => &["generate_workflow"],
        "generate_suggestions" => &["generate_workflow"],
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub tool: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
    /// 拓扑分层后的执行波次
    pub waves: Vec<Vec<String>>,
    pub estimated_duration_ms: u64,
}

impl ExecutionPlan {
    pub fn step(&self, tool: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.tool == tool)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 为给定工具生成执行计划；重复的工具名只保留首次出现
pub fn create_execution_plan(tools: &[&str]) -> ExecutionPlan {
    let mut requested: Vec<&str> = Vec::new();
    for tool in tools {
        if !requested.contains(tool) {
            requested.push(*tool);
        }
    }

    let steps: Vec<PlanStep> = requested
        .iter()
        .map(|tool| PlanStep {
            tool: tool.to_string(),
            depends_on: static_dependencies(tool)
                .iter()
                .filter(|dep| requested.contains(*dep))
                .map(|dep| dep.to_string())
                .collect(),
        })
        .collect();

    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut placed: Vec<&str> = Vec::new();
    while placed.len() < steps.len() {
        let wave: Vec<String> = steps
            .iter()
            .filter(|s| !placed.contains(&s.tool.as_str()))
            .filter(|s| s.depends_on.iter().all(|d| placed.contains(&d.as_str())))
            .map(|s| s.tool.clone())
            .collect();
        if wave.is_empty() {
            break;
        }
        for tool in &wave {
            if let Some(step) = steps.iter().find(|s| &s.tool == tool) {
                placed.push(step.tool.as_str());
            }
        }
        waves.push(wave);
    }

    ExecutionPlan {
        estimated_duration_ms: STEP_ESTIMATE_MS * steps.len() as u64,
        steps,
        waves,
    }
}
