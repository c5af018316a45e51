// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 默认的严格 JSONPath 实现
//!
//! 支持 `$`、`.key`、`['key']`、`['a','b']`、`[n]`、`[-n]`、`[*]`、`.*`、
//! `..key` 递归下降，以及 `[?(@.k)]`、`[?(@.k == 'v')]` 形式的简单过滤。
//! 路径末尾可用 `<js>...</js>` 或 `@js:` 附带后处理脚本。

use crate::domain::rules::grammar::{JS_CLOSE, JS_INLINE, JS_OPEN};
use crate::domain::rules::json_path;
use crate::domain::rules::strict_json::{StrictJsonOutcome, StrictJsonPath};
use crate::utils::errors::RuleError;
use serde_json::Value;
use std::cmp::Ordering;

/// 路径片段
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Union(Vec<String>),
    Index(i64),
    Wildcard,
    Descendant(Box<Segment>),
    Filter(Filter),
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: String,
    comparison: Option<(CompareOp, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// 基础 JSONPath 查询器
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicJsonPath;

impl BasicJsonPath {
    /// 创建查询器
    pub fn new() -> Self {
        Self
    }
}

impl StrictJsonPath for BasicJsonPath {
    fn query(&self, document: &Value, path: &str) -> Result<StrictJsonOutcome, RuleError> {
        let (path, script) = split_post_script(path);
        let segments = parse(path)?;

        let mut current = vec![document];
        for segment in &segments {
            let mut next = Vec::new();
            for value in current {
                apply(segment, value, &mut next);
            }
            current = next;
        }

        let value = match current.as_slice() {
            [] => Value::Null,
            [single] if !has_multi_segment(&segments) => (*single).clone(),
            many => Value::Array(many.iter().map(|v| (*v).clone()).collect()),
        };
        Ok(StrictJsonOutcome {
            value,
            post_process_script: script,
        })
    }
}

fn has_multi_segment(segments: &[Segment]) -> bool {
    segments.iter().any(|s| {
        matches!(
            s,
            Segment::Wildcard | Segment::Descendant(_) | Segment::Filter(_) | Segment::Union(_)
        )
    })
}

fn split_post_script(path: &str) -> (&str, Option<String>) {
    if let Some(pos) = path.find(JS_OPEN) {
        let script = &path[pos + JS_OPEN.len()..];
        let script = script.strip_suffix(JS_CLOSE).unwrap_or(script);
        return (path[..pos].trim(), Some(script.to_string()));
    }
    if let Some(pos) = path.to_ascii_lowercase().find(JS_INLINE) {
        return (
            path[..pos].trim(),
            Some(path[pos + JS_INLINE.len()..].to_string()),
        );
    }
    (path.trim(), None)
}

fn parse(path: &str) -> Result<Vec<Segment>, RuleError> {
    let path = path.trim();
    let rest = match path.strip_prefix('$') {
        Some(rest) => rest,
        None if path.starts_with('.') || path.starts_with('[') => path,
        None => return parse(&format!("$.{}", path)),
    };

    let mut segments = Vec::new();
    let mut rest = rest;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("..") {
            let (segment, remaining) = parse_selector(after)?;
            segments.push(Segment::Descendant(Box::new(segment)));
            rest = remaining;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (segment, remaining) = parse_selector(after)?;
            segments.push(segment);
            rest = remaining;
        } else if rest.starts_with('[') {
            let (segment, remaining) = parse_bracket(rest)?;
            segments.push(segment);
            rest = remaining;
        } else {
            return Err(RuleError::JsonQuery(format!("unexpected token at '{}'", rest)));
        }
    }
    Ok(segments)
}

/// 解析 `.` 或 `..` 之后的名称或方括号
fn parse_selector(input: &str) -> Result<(Segment, &str), RuleError> {
    if input.starts_with('[') {
        return parse_bracket(input);
    }
    let end = input.find(['.', '[']).unwrap_or(input.len());
    let name = input[..end].trim();
    if name.is_empty() {
        return Err(RuleError::JsonQuery("empty member name".to_string()));
    }
    let segment = if name == "*" {
        Segment::Wildcard
    } else {
        Segment::Child(name.to_string())
    };
    Ok((segment, &input[end..]))
}

fn parse_bracket(input: &str) -> Result<(Segment, &str), RuleError> {
    let close = find_closing_bracket(input)
        .ok_or_else(|| RuleError::JsonQuery(format!("unclosed bracket in '{}'", input)))?;
    let inner = input[1..close].trim();
    let remaining = &input[close + 1..];

    if inner == "*" {
        return Ok((Segment::Wildcard, remaining));
    }
    if let Some(filter) = inner.strip_prefix('?') {
        return Ok((Segment::Filter(parse_filter(filter)?), remaining));
    }
    if inner.starts_with('\'') || inner.starts_with('"') {
        let names: Vec<String> = inner
            .split(',')
            .map(|n| n.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .collect();
        let segment = match names.as_slice() {
            [single] => Segment::Child(single.clone()),
            _ => Segment::Union(names),
        };
        return Ok((segment, remaining));
    }
    inner
        .parse::<i64>()
        .map(|index| (Segment::Index(index), remaining))
        .map_err(|_| RuleError::JsonQuery(format!("unsupported bracket expression '[{}]'", inner)))
}

fn find_closing_bracket(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_filter(expr: &str) -> Result<Filter, RuleError> {
    let expr = expr.trim();
    let body = expr
        .strip_prefix('(')
        .and_then(|e| e.strip_suffix(')'))
        .ok_or_else(|| RuleError::JsonQuery(format!("malformed filter '{}'", expr)))?
        .trim();

    const OPERATORS: [(&str, CompareOp); 6] = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    for (token, op) in OPERATORS {
        if let Some(pos) = body.find(token) {
            let left = body[..pos].trim();
            let right = body[pos + token.len()..].trim();
            return Ok(Filter {
                path: relative_path(left)?,
                comparison: Some((op, parse_literal(right))),
            });
        }
    }
    Ok(Filter {
        path: relative_path(body)?,
        comparison: None,
    })
}

fn relative_path(expr: &str) -> Result<String, RuleError> {
    expr.strip_prefix('@')
        .map(|rest| format!("${}", rest))
        .ok_or_else(|| RuleError::JsonQuery(format!("filter must start with '@': '{}'", expr)))
}

fn parse_literal(raw: &str) -> Value {
    if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return Value::String(inner.to_string());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn apply<'a>(segment: &Segment, value: &'a Value, out: &mut Vec<&'a Value>) {
    match segment {
        Segment::Child(key) => {
            if let Value::Object(map) = value {
                out.extend(map.get(key));
            }
        }
        Segment::Union(keys) => {
            if let Value::Object(map) = value {
                out.extend(keys.iter().filter_map(|k| map.get(k)));
            }
        }
        Segment::Index(index) => {
            if let Value::Array(items) = value {
                let len = items.len() as i64;
                let i = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&i) {
                    out.extend(items.get(i as usize));
                }
            }
        }
        Segment::Wildcard => children(value, out),
        Segment::Descendant(inner) => {
            let mut nodes = Vec::new();
            descendants(value, &mut nodes);
            for node in nodes {
                apply(inner, node, out);
            }
        }
        Segment::Filter(filter) => {
            let mut candidates = Vec::new();
            children(value, &mut candidates);
            out.extend(candidates.into_iter().filter(|c| filter.matches(c)));
        }
    }
}

fn children<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => out.extend(items.iter()),
        Value::Object(map) => out.extend(map.values()),
        _ => {}
    }
}

fn descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Array(items) => items.iter().for_each(|v| descendants(v, out)),
        Value::Object(map) => map.values().for_each(|v| descendants(v, out)),
        _ => {}
    }
}

impl Filter {
    fn matches(&self, candidate: &Value) -> bool {
        let selected = json_path::select(candidate, &self.path);
        match &self.comparison {
            None => selected.iter().any(|v| !v.is_null()),
            Some((op, literal)) => selected.iter().any(|v| compare(v, *op, literal)),
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match op {
        CompareOp::Eq => left == right || ordering == Some(Ordering::Equal),
        CompareOp::Ne => !(left == right || ordering == Some(Ordering::Equal)),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Value {
        json!({
            "store": {
                "book": [
                    {"title": "A", "price": 8, "isbn": "1"},
                    {"title": "B", "price": 12},
                    {"title": "C", "price": 20, "isbn": "3"}
                ],
                "bicycle": {"color": "red", "price": 99}
            }
        })
    }

    fn query(path: &str) -> Value {
        BasicJsonPath::new().query(&store(), path).unwrap().value
    }

    #[test]
    fn test_child_and_index() {
        assert_eq!(query("$.store.bicycle.color"), json!("red"));
        assert_eq!(query("$['store']['bicycle']['price']"), json!(99));
        assert_eq!(query("$.store.book[0].title"), json!("A"));
        assert_eq!(query("$.store.book[-1].title"), json!("C"));
        assert_eq!(query("store.book[1].price"), json!(12));
        assert_eq!(query("$.store.missing"), Value::Null);
    }

    #[test]
    fn test_wildcards_and_recursive_descent() {
        assert_eq!(query("$.store.book[*].title"), json!(["A", "B", "C"]));
        assert_eq!(query("$..title"), json!(["A", "B", "C"]));
        assert_eq!(query("$..price"), json!([8, 12, 20, 99]));
        assert_eq!(query("$.store.bicycle.*"), json!(["red", 99]));
        assert_eq!(query("$.store.bicycle['color','price']"), json!(["red", 99]));
    }

    #[test]
    fn test_filters() {
        assert_eq!(query("$.store.book[?(@.isbn)].title"), json!(["A", "C"]));
        assert_eq!(query("$.store.book[?(@.price < 10)].title"), json!(["A"]));
        assert_eq!(query("$.store.book[?(@.title == 'B')].price"), json!([12]));
    }

    #[test]
    fn test_post_process_script_is_split_off() {
        let outcome = BasicJsonPath::new()
            .query(&store(), "$.store.bicycle.color<js>result.toUpperCase()</js>")
            .unwrap();
        assert_eq!(outcome.value, json!("red"));
        assert_eq!(outcome.post_process_script.as_deref(), Some("result.toUpperCase()"));

        let inline = BasicJsonPath::new()
            .query(&store(), "$.store.bicycle.price@js:result * 2")
            .unwrap();
        assert_eq!(inline.post_process_script.as_deref(), Some("result * 2"));
    }

    #[test]
    fn test_malformed_paths_are_errors() {
        let path = BasicJsonPath::new();
        assert!(path.query(&store(), "$.store[").is_err());
        assert!(path.query(&store(), "$.store[abc]").is_err());
        assert!(path.query(&store(), "$.store.book[?(price)]").is_err());
    }
}
