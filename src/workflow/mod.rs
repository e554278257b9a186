//! 工作流结构：类型、图分析、校验、构建器

pub mod builder;
pub mod graph;
pub mod types;
pub mod validator;

pub use builder::WorkflowBuilder;
pub use graph::WorkflowGraph;
pub use types::*;
pub use validator::{GraphValidator, ValidationLimits, ValidationReport};
