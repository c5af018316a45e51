// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 规则文本的词法切分
//!
//! 规则中的 `||`、`&&`、`@` 等分隔符只在最外层生效，
//! `[...]`、`(...)`、`{{...}}` 和 `<js>...</js>` 内部的同名字符保持原样。

/// 脚本块起始标记
pub const JS_OPEN: &str = "<js>";
/// 脚本块结束标记
pub const JS_CLOSE: &str = "</js>";
/// 行内脚本前缀，之后直到规则末尾都是脚本
pub const JS_INLINE: &str = "@js:";

/// 规则流水线中的一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStep {
    /// 普通规则
    Rule(String),
    /// 脚本片段
    Script(String),
}

/// 在最外层按分隔符切分规则
pub fn split_top_level<'a>(rule: &'a str, delimiter: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    if delimiter.is_empty() {
        parts.push(rule);
        return parts;
    }

    let bytes = rule.as_bytes();
    let mut square = 0usize;
    let mut paren = 0usize;
    let mut braces = 0usize;
    let mut in_script = false;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &rule[i..];
        if in_script {
            if rest.starts_with(JS_CLOSE) {
                in_script = false;
                i += JS_CLOSE.len();
            } else {
                i += next_char_len(rest);
            }
            continue;
        }
        if rest.starts_with(JS_OPEN) {
            in_script = true;
            i += JS_OPEN.len();
            continue;
        }
        if rest.starts_with("{{") {
            braces += 1;
            i += 2;
            continue;
        }
        if braces > 0 && rest.starts_with("}}") {
            braces -= 1;
            i += 2;
            continue;
        }
        if square == 0 && paren == 0 && braces == 0 && rest.starts_with(delimiter) {
            parts.push(&rule[start..i]);
            i += delimiter.len();
            start = i;
            continue;
        }
        match bytes[i] {
            b'[' => square += 1,
            b']' => square = square.saturating_sub(1),
            b'(' => paren += 1,
            b')' => paren = paren.saturating_sub(1),
            _ => {}
        }
        i += next_char_len(rest);
    }
    parts.push(&rule[start..]);
    parts
}

fn next_char_len(rest: &str) -> usize {
    rest.chars().next().map(char::len_utf8).unwrap_or(1)
}

/// 拆分正则后处理部分
///
/// 返回 `(选择器表达式, 正则, 替换文本)`
pub fn split_regex(rule: &str) -> (&str, Option<&str>, Option<&str>) {
    let mut parts = rule.splitn(3, "##");
    let selector = parts.next().unwrap_or("");
    let regex = parts.next().filter(|r| !r.is_empty());
    let replacement = parts.next();
    (selector, regex, replacement)
}

/// 规则中是否包含脚本片段
pub fn contains_script(rule: &str) -> bool {
    rule.contains(JS_OPEN) || find_inline_script(rule).is_some()
}

fn find_inline_script(rule: &str) -> Option<usize> {
    rule.to_ascii_lowercase().find(JS_INLINE)
}

/// 把规则拆成普通规则和脚本交替的流水线
///
/// `<js>` 未闭合时其后全部视为脚本；`@js:` 之后直到末尾都是脚本
pub fn parse_steps(rule: &str) -> Vec<RuleStep> {
    let mut steps = Vec::new();
    let mut rest = rule;

    while !rest.is_empty() {
        let block = rest.find(JS_OPEN);
        let inline = find_inline_script(rest);

        match (block, inline) {
            (Some(b), i) if i.map_or(true, |i| b < i) => {
                push_rule(&mut steps, &rest[..b]);
                let after = &rest[b + JS_OPEN.len()..];
                match after.find(JS_CLOSE) {
                    Some(end) => {
                        steps.push(RuleStep::Script(after[..end].to_string()));
                        rest = &after[end + JS_CLOSE.len()..];
                    }
                    None => {
                        steps.push(RuleStep::Script(after.to_string()));
                        rest = "";
                    }
                }
            }
            (_, Some(i)) => {
                push_rule(&mut steps, &rest[..i]);
                steps.push(RuleStep::Script(rest[i + JS_INLINE.len()..].to_string()));
                rest = "";
            }
            _ => {
                push_rule(&mut steps, rest);
                rest = "";
            }
        }
    }
    steps
}

fn push_rule(steps: &mut Vec<RuleStep>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        steps.push(RuleStep::Rule(trimmed.to_string()));
    }
}

/// 取出所有 `{{...}}` 占位符，返回 `(起始, 结束, 表达式)`
pub fn find_placeholders(template: &str) -> Vec<(usize, usize, &str)> {
    let mut found = Vec::new();
    let mut offset = 0usize;
    while let Some(open) = template[offset..].find("{{") {
        let start = offset + open;
        let body_start = start + 2;
        match template[body_start..].find("}}") {
            Some(close) => {
                let end = body_start + close + 2;
                found.push((start, end, &template[body_start..body_start + close]));
                offset = end;
            }
            None => break,
        }
    }
    found
}

/// 用替换函数逐个替换占位符
pub fn replace_placeholders<F>(template: &str, mut replace: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut output = String::with_capacity(template.len());
    let mut last = 0usize;
    for (start, end, expr) in find_placeholders(template) {
        output.push_str(&template[last..start]);
        output.push_str(&replace(expr));
        last = end;
    }
    output.push_str(&template[last..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_alternatives() {
        assert_eq!(split_top_level("a||b||c", "||"), vec!["a", "b", "c"]);
        assert_eq!(split_top_level("a", "||"), vec!["a"]);
    }

    #[test]
    fn test_split_respects_brackets_templates_and_scripts() {
        assert_eq!(
            split_top_level("a[title=x@y]@href", "@"),
            vec!["a[title=x@y]", "href"]
        );
        assert_eq!(
            split_top_level("{{a || b}}||c", "||"),
            vec!["{{a || b}}", "c"]
        );
        assert_eq!(
            split_top_level("x<js>a && b</js>&&y", "&&"),
            vec!["x<js>a && b</js>", "y"]
        );
    }

    #[test]
    fn test_split_keeps_empty_segments() {
        assert_eq!(split_top_level("a@@b", "@"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_split_regex() {
        assert_eq!(split_regex(".price##\\d+"), (".price", Some("\\d+"), None));
        assert_eq!(split_regex("a##b##c"), ("a", Some("b"), Some("c")));
        assert_eq!(split_regex("a"), ("a", None, None));
    }

    #[test]
    fn test_parse_steps() {
        assert_eq!(
            parse_steps("$.list<js>result.reverse()</js>$.name"),
            vec![
                RuleStep::Rule("$.list".into()),
                RuleStep::Script("result.reverse()".into()),
                RuleStep::Rule("$.name".into()),
            ]
        );
        assert_eq!(
            parse_steps("class.title@text@js:result.trim()"),
            vec![
                RuleStep::Rule("class.title@text".into()),
                RuleStep::Script("result.trim()".into()),
            ]
        );
        assert_eq!(
            parse_steps("<js>1 + 1"),
            vec![RuleStep::Script("1 + 1".into())]
        );
        assert!(contains_script("a@JS:b"));
        assert!(!contains_script("class.a@text"));
    }

    #[test]
    fn test_replace_placeholders() {
        let out = replace_placeholders("/s?q={{key}}&p={{page}}", |e| e.to_uppercase());
        assert_eq!(out, "/s?q=KEY&p=PAGE");
        assert_eq!(
            find_placeholders("a{{b}}c{{d"),
            vec![(1, 6, "b")]
        );
    }
}
