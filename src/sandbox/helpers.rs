// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")
        .expect("Failed to compile script/style regex")
});
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*br\s*/?\s*>|<\s*/?\s*(p|div|h[1-6]|li)(\s[^>]*)?>")
        .expect("Failed to compile paragraph regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("Failed to compile tag regex"));

/// 规则脚本常用、书源脚本库可能缺失的辅助函数
///
/// 缺失时安装默认实现：`decrypt` 原样返回，`cleanHtml` 去标签保留段落，`getComments` 原样返回
pub const DEFAULT_HELPERS: [(&str, &str); 3] = [
    ("decrypt", "function (value) { return value; }"),
    (
        "cleanHtml",
        "function (value) { return __cap_cleanHtml(__cap_str(value)); }",
    ),
    ("getComments", "function (value) { return value; }"),
];

/// 生成安装默认辅助函数的脚本
pub fn default_helpers_script() -> String {
    DEFAULT_HELPERS
        .iter()
        .map(|(name, body)| {
            format!(
                "if (typeof globalThis.{name} !== 'function') {{ globalThis.{name} = {body}; }}\n"
            )
        })
        .collect()
}

/// 去除标签，每个段落一行
pub fn clean_html(html: &str) -> String {
    let without_scripts = SCRIPT_STYLE.replace_all(html, "");
    let with_breaks = PARAGRAPH_BREAK.replace_all(&without_scripts, "\n");
    let text = TAG.replace_all(&with_breaks, "");
    let decoded = html_escape::decode_html_entities(&text);

    decoded
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\u{3000}'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_keeps_paragraphs() {
        let html = "<div id=\"content\"><p>第一段&nbsp;</p><p>  第二段 <b>加粗</b></p>第三段<br/>第四段<script>var x = 1;</script></div>";
        assert_eq!(clean_html(html), "第一段\n第二段 加粗\n第三段\n第四段");
    }

    #[test]
    fn test_clean_html_plain_text() {
        assert_eq!(clean_html("just text"), "just text");
        assert_eq!(clean_html("a &amp; b"), "a & b");
    }

    #[test]
    fn test_default_helpers_script_guards_existing_definitions() {
        let script = default_helpers_script();
        for (name, _) in DEFAULT_HELPERS {
            assert!(script.contains(&format!("typeof globalThis.{} !== 'function'", name)));
        }
    }
}
