//! 意图层：解析结果类型、启发式分类/抽取、模板工作流

pub mod heuristics;
pub mod templates;
pub mod types;

pub use heuristics::{classify_intent, extract_entities, extraction_confidence};
pub use templates::template_workflow;
pub use types::{labels, EntityExtraction, IntentClassification, ParsedIntent};
