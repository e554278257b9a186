//! 后端输出解析
//!
//! 把后端返回的文本解析为 Structured(JSON) 或 Unstructured(原文)；
//! 调用方按分支显式选择「使用结构化结果」或「走启发式阶段」，不依赖解析异常决定流程。

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutput {
    /// 内容中包含可解析的 JSON 对象或数组
    Structured(Value),
    /// 非 JSON 或 JSON 不完整
    Unstructured(String),
}

impl BackendOutput {
    /// 提取 JSON 块（```json ... ``` 或首个 '{' 到末个 '}'），解析成功即为 Structured
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        let candidate = if let Some(start) = trimmed.find("```json") {
            let rest = &trimmed[start + 7..];
            rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
        } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                &trimmed[start..=end]
            } else {
                trimmed
            }
        } else {
            trimmed
        };

        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => BackendOutput::Structured(value),
            _ => BackendOutput::Unstructured(trimmed.to_string()),
        }
    }

    /// 结构化内容按目标类型反序列化；类型不匹配时退化为 Unstructured
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, BackendOutput> {
        match self {
            BackendOutput::Structured(value) => {
                let raw = value.to_string();
                serde_json::from_value(value).map_err(|_| BackendOutput::Unstructured(raw))
            }
            other => Err(other),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, BackendOutput::Structured(_))
    }
}
