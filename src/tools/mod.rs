//! 工具层：Tool trait、注册表、执行器，以及管线各阶段的工具实现

pub mod cache_lookup;
pub mod classify;
pub mod executor;
pub mod extract;
pub mod generate;
pub mod llm_stage;
pub mod registry;
pub mod result;
pub mod schema;
pub mod suggest;
pub mod validate;

pub use cache_lookup::{CacheLookupTool, CACHE_HIT_CONFIDENCE};
pub use classify::ClassifyIntentTool;
pub use executor::ToolExecutor;
pub use extract::ExtractEntitiesTool;
pub use generate::GenerateWorkflowTool;
pub use llm_stage::{FallbackPolicy, LlmStage, Resolution};
pub use registry::{Cacheable, Tool, ToolRegistry};
pub use result::{ToolMetadata, ToolResult};
pub use schema::{validate_params, ParamType, ParamValidation, ParameterSpec};
pub use suggest::GenerateSuggestionsTool;
pub use validate::ValidateWorkflowTool;
