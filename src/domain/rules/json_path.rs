// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 点路径 JSON 取值
//!
//! 支持 `$.a.b`、`$.a[0]`、`a.0`、`$.list[*].name` 这类简单路径。
//! 需要过滤表达式、递归下降等完整语法时使用 `@json:` 前缀走严格查询。

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// 裸写的点路径，如 `data.list` 或 `items[0].name`
static BARE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][\w-]*(?:\.(?:[\w-]+|\*)|\[(?:-?\d+|\*)\])*$")
        .expect("Failed to compile bare path regex")
});

/// 路径片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// 对象键
    Key(String),
    /// 数组下标，负数从末尾计
    Index(i64),
    /// 所有子元素
    Wildcard,
}

/// 是否为点路径写法
pub fn is_dot_path(rule: &str) -> bool {
    let rule = rule.trim();
    rule == "$" || rule.starts_with("$.") || rule.starts_with("$[") || BARE_PATH.is_match(rule)
}

/// 解析点路径
pub fn parse_path(path: &str) -> Vec<PathToken> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut tokens = Vec::new();

    for segment in path.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, mut brackets) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        push_name(&mut tokens, name);

        while let Some(rest) = brackets.strip_prefix('[') {
            let Some(end) = rest.find(']') else { break };
            let inner = rest[..end].trim().trim_matches(|c| c == '\'' || c == '"');
            push_name(&mut tokens, inner);
            brackets = &rest[end + 1..];
        }
    }
    tokens
}

fn push_name(tokens: &mut Vec<PathToken>, name: &str) {
    if name.is_empty() {
        return;
    }
    if name == "*" {
        tokens.push(PathToken::Wildcard);
    } else if let Ok(index) = name.parse::<i64>() {
        tokens.push(PathToken::Index(index));
    } else {
        tokens.push(PathToken::Key(name.to_string()));
    }
}

/// 按路径选出所有匹配值
///
/// 对数组取键时逐个元素取值
pub fn select<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for token in parse_path(path) {
        let mut next = Vec::new();
        for value in current {
            step(value, &token, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn step<'a>(value: &'a Value, token: &PathToken, out: &mut Vec<&'a Value>) {
    match (token, value) {
        (PathToken::Key(key), Value::Object(map)) => out.extend(map.get(key)),
        (PathToken::Key(_), Value::Array(items)) => {
            for item in items {
                step(item, token, out);
            }
        }
        (PathToken::Index(index), Value::Array(items)) => {
            let len = items.len() as i64;
            let i = if *index < 0 { len + index } else { *index };
            if (0..len).contains(&i) {
                out.extend(items.get(i as usize));
            }
        }
        (PathToken::Index(index), Value::Object(map)) => out.extend(map.get(&index.to_string())),
        (PathToken::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        (PathToken::Wildcard, Value::Object(map)) => out.extend(map.values()),
        _ => {}
    }
}

/// JSON 值转为字符串，字符串不带引号，null 为空
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 标量取值，多个结果以换行连接
pub fn resolve_string(document: &Value, path: &str) -> String {
    select(document, path)
        .into_iter()
        .map(value_to_string)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 列表取值
///
/// 唯一结果是数组时展开为元素
pub fn resolve_list(document: &Value, path: &str) -> Vec<Value> {
    let selected = select(document, path);
    match selected.as_slice() {
        [Value::Array(items)] => items.clone(),
        _ => selected
            .into_iter()
            .filter(|v| !v.is_null())
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "code": 0,
            "data": {
                "title": "Book",
                "list": [
                    {"name": "A", "id": 1},
                    {"name": "B", "id": 2, "extra": null}
                ]
            }
        })
    }

    #[test]
    fn test_is_dot_path() {
        assert!(is_dot_path("$.data.title"));
        assert!(is_dot_path("$"));
        assert!(is_dot_path("data.list[0].name"));
        assert!(is_dot_path("data.list.0"));
        assert!(!is_dot_path("class.book@text"));
        assert!(!is_dot_path("div > a"));
        assert!(!is_dot_path("@json:$..name"));
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("$.data.list[0]['name']"),
            vec![
                PathToken::Key("data".into()),
                PathToken::Key("list".into()),
                PathToken::Index(0),
                PathToken::Key("name".into()),
            ]
        );
        assert_eq!(parse_path("$."), Vec::<PathToken>::new());
        assert_eq!(parse_path("a.*"), vec![PathToken::Key("a".into()), PathToken::Wildcard]);
    }

    #[test]
    fn test_resolve_string() {
        let doc = sample();
        assert_eq!(resolve_string(&doc, "$.data.title"), "Book");
        assert_eq!(resolve_string(&doc, "data.list.1.name"), "B");
        assert_eq!(resolve_string(&doc, "$.data.list[-1].id"), "2");
        assert_eq!(resolve_string(&doc, "$.data.list[*].name"), "A\nB");
        assert_eq!(resolve_string(&doc, "$.data.list.name"), "A\nB");
        assert_eq!(resolve_string(&doc, "$.data.list[1].extra"), "");
        assert_eq!(resolve_string(&doc, "$.missing.path"), "");
        assert_eq!(resolve_string(&doc, "$.code"), "0");
    }

    #[test]
    fn test_resolve_object_is_serialized() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(resolve_string(&doc, "$.a"), r#"{"b":1}"#);
    }

    #[test]
    fn test_resolve_list() {
        let doc = sample();
        let items = resolve_list(&doc, "$.data.list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "A");

        let names = resolve_list(&doc, "$.data.list[*].name");
        assert_eq!(names, vec![json!("A"), json!("B")]);

        assert!(resolve_list(&doc, "$.nothing").is_empty());
        assert_eq!(resolve_list(&json!([1, 2, 3]), "$").len(), 3);
    }
}
