//! Mock 生成后端（用于测试与离线运行，无需 API）
//!
//! 按规则匹配 prompt 返回预设内容或错误；无规则命中时返回非结构化文本，
//! 管线随之走启发式分类 / 抽取 / 模板生成。记录每次收到的 prompt 供测试断言调用次数。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{Generation, GenerationBackend, GenerationConfig, LlmError};

enum Reply {
    Content(String),
    Fail(LlmError),
}

struct Rule {
    needle: String,
    reply: Reply,
}

/// Mock 后端：规则按添加顺序匹配（prompt 包含 needle 即命中）
#[derive(Default)]
pub struct MockBackend {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// prompt 包含 needle 时返回 content
    pub fn respond_when(mut self, needle: impl Into<String>, content: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Content(content.into()),
        });
        self
    }

    /// prompt 包含 needle 时返回错误
    pub fn fail_when(mut self, needle: impl Into<String>, error: LlmError) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Fail(error),
        });
        self
    }

    /// 每次调用前等待（用于超时测试）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// prompt 包含 needle 的调用次数
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .map(|p| p.iter().filter(|prompt| prompt.contains(needle)).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<Generation, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.rules.iter().find(|r| prompt.contains(&r.needle)) {
            Some(Rule {
                reply: Reply::Content(content),
                ..
            }) => Ok(Generation::text(content.clone())),
            Some(Rule {
                reply: Reply::Fail(err),
                ..
            }) => Err(err.clone()),
            None => Ok(Generation::text(
                "Mock backend has no structured answer for this prompt.",
            )),
        }
    }
}
