//! 生成后端层：抽象、输出解析与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod output;
pub mod traits;

pub use deepseek::{create_deepseek_backend, DEEPSEEK_CHAT};
pub use mock::MockBackend;
pub use openai::{OpenAiBackend, TokenUsage};
pub use output::BackendOutput;
pub use traits::{GenerationBackend, Generation, GenerationConfig, LlmError, Usage};
