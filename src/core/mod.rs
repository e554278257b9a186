//! 核心编排层：错误分类与诊断上下文、阶段定义、执行计划、编排器、错误报告

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod reporter;
pub mod state;

pub use context::ErrorContext;
pub use error::{ErrorKind, PipelineError, ToolError};
pub use orchestrator::{
    stage_params, ConfidenceWeights, Orchestrator, PipelineData, PipelineOptions, PipelineOutcome, PlanRun,
};
pub use plan::{create_execution_plan, static_dependencies, ExecutionPlan, PlanStep};
pub use reporter::{ErrorReporter, RetryRecommendation};
pub use state::PipelineStage;
