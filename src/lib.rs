//! Flowbee - 自然语言到工作流的编排管线
//!
//! 模块划分：
//! - **agent**: 组装根（后端选择、默认工具集、编排器创建）
//! - **cache**: 有界 LRU + TTL 结果缓存
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、诊断上下文、阶段、执行计划、编排器、错误报告
//! - **intent**: 意图 / 实体类型，关键词启发式与工作流模板
//! - **llm**: 生成后端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: tracing 初始化
//! - **tools**: Tool trait、注册表、执行器与各阶段工具
//! - **workflow**: 工作流图类型、构建器、图算法与结构校验

pub mod agent;
pub mod cache;
pub mod config;
pub mod core;
pub mod intent;
pub mod llm;
pub mod observability;
pub mod tools;
pub mod workflow;

pub use agent::{create_orchestrator, create_orchestrator_with_backend};
pub use core::{ErrorReporter, Orchestrator, PipelineOutcome};
