//! 工具参数声明与默认校验
//!
//! 每个工具声明参数列表（名称、类型、描述、是否必填、默认值）；
//! 默认校验只检查必填项与类型，未声明的参数给出 warning。

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ParameterSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default_value: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// 参数校验结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// 默认校验：params 必须是对象；必填项存在且非 null；已提供的值类型匹配
pub fn validate_params(specs: &[ParameterSpec], params: &Value) -> ParamValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(map) = params.as_object() else {
        return ParamValidation {
            is_valid: false,
            errors: vec!["Parameters must be a JSON object".to_string()],
            warnings,
        };
    };

    for spec in specs {
        match map.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    errors.push(format!("Missing required parameter '{}'", spec.name));
                }
            }
            Some(value) if !spec.param_type.matches(value) => {
                errors.push(format!(
                    "Parameter '{}' must be of type {}",
                    spec.name,
                    spec.param_type.as_str()
                ));
            }
            Some(_) => {}
        }
    }

    for key in map.keys() {
        if !specs.iter().any(|s| &s.name == key) {
            warnings.push(format!("Unknown parameter '{}' will be ignored", key));
        }
    }

    ParamValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// 读取参数，缺失时回落到声明的默认值
pub fn param_or_default<'a>(specs: &'a [ParameterSpec], params: &'a Value, name: &str) -> Option<&'a Value> {
    params
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| {
            specs
                .iter()
                .find(|s| s.name == name)
                .and_then(|s| s.default_value.as_ref())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("userInput", ParamType::String, "text"),
            ParameterSpec::optional("limit", ParamType::Number, "max").with_default(json!(3)),
        ]
    }

    #[test]
    fn test_valid_params() {
        let result = validate_params(&specs(), &json!({"userInput": "hi"}));
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let result = validate_params(&specs(), &json!({"limit": "three"}));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_unknown_param_is_warning() {
        let result = validate_params(&specs(), &json!({"userInput": "hi", "extra": 1}));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_non_object_params() {
        assert!(!validate_params(&specs(), &json!("hi")).is_valid);
    }

    #[test]
    fn test_default_value_lookup() {
        let specs = specs();
        let params = json!({"userInput": "hi"});
        assert_eq!(param_or_default(&specs, &params, "limit"), Some(&json!(3)));
    }
}
