// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;
use std::fmt;

/// 待提取的文档
///
/// 在流水线入口处判定一次类型，之后不再重复判断
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// HTML/XML 标记或普通文本
    Html(String),
    /// 已解析的 JSON 对象或数组
    Json(Value),
}

impl Document {
    /// 判定文档类型
    ///
    /// 只有能解析为 JSON 对象或数组的文本才视为 JSON 文档，
    /// 裸的 JSON 标量（如 `"abc"`、`12`）仍按文本处理
    pub fn detect(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                if value.is_object() || value.is_array() {
                    return Document::Json(value);
                }
            }
        }
        Document::Html(raw.to_string())
    }

    /// 从 JSON 值创建文档，标量值转为文本
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Document::Json(value),
            Value::String(s) => Document::detect(&s),
            Value::Null => Document::Html(String::new()),
            other => Document::Html(other.to_string()),
        }
    }

    /// 是否为 JSON 文档
    pub fn is_json(&self) -> bool {
        matches!(self, Document::Json(_))
    }

    /// 文档是否具有标记结构
    pub fn is_markup(&self) -> bool {
        match self {
            Document::Html(text) => text.contains('<') && text.contains('>'),
            Document::Json(_) => false,
        }
    }

    /// 文档的文本形式，JSON 文档序列化输出
    pub fn as_text(&self) -> String {
        match self {
            Document::Html(text) => text.clone(),
            Document::Json(value) => value.to_string(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Document::Html(text) => f.write_str(text),
            Document::Json(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_json_object_and_array() {
        assert!(Document::detect(r#"{"a":1}"#).is_json());
        assert!(Document::detect("  [1, 2]").is_json());
    }

    #[test]
    fn test_detect_markup_and_scalars() {
        assert_eq!(
            Document::detect("<div>x</div>"),
            Document::Html("<div>x</div>".to_string())
        );
        assert!(!Document::detect("12").is_json());
        assert!(!Document::detect(r#""abc""#).is_json());
        assert!(!Document::detect("{broken").is_json());
    }

    #[test]
    fn test_from_value() {
        assert!(Document::from_value(json!({"a": 1})).is_json());
        assert!(Document::from_value(json!(r#"{"a": 1}"#)).is_json());
        assert_eq!(Document::from_value(json!(5)).as_text(), "5");
        assert_eq!(Document::from_value(Value::Null).as_text(), "");
    }

    #[test]
    fn test_is_markup() {
        assert!(Document::detect("<p>a</p>").is_markup());
        assert!(!Document::detect("plain text").is_markup());
        assert!(!Document::detect("[]").is_markup());
    }
}
