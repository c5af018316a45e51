// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 选择器简写编译与求值
//!
//! 规则形如 `class.book@tag.a@href##\d+`：
//! - `@` 分隔逐级下钻的选择步骤，最后一段若是属性名则作为取值方式
//! - `id.`、`class.`、`tag.` 前缀展开为 CSS 选择器，`.N` 后缀取第N个，`!N:M` 排除指定下标
//! - `||` 分隔备选路径，第一个有结果的生效
//! - `##` 之后是正则，再跟一段 `##` 时改为全量替换
//! - `@css:` 前缀表示直接使用原始 CSS 选择器

use crate::domain::rules::grammar::{split_regex, split_top_level};
use crate::utils::errors::RuleError;
use crate::utils::url_utils::normalize_attribute_url;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// 原始 CSS 前缀
const RAW_CSS_PREFIX: &str = "@css:";

/// 取值关键字
const VALUE_KEYWORDS: [&str; 7] = [
    "text",
    "ownText",
    "textNodes",
    "html",
    "innerHtml",
    "outerHtml",
    "all",
];

/// 常见属性名，出现在末尾时总是按属性处理
const KNOWN_ATTRIBUTES: [&str; 14] = [
    "href", "src", "url", "title", "alt", "value", "content", "name", "rel", "type", "style",
    "id", "class", "target",
];

/// HTML 元素名，裸写时按选择器处理
///
/// 与 `KNOWN_ATTRIBUTES` 重名的（`title`、`style`）按属性处理，选择这类元素需写 `tag.title`
const HTML_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "audio", "b", "base",
    "bdi", "bdo", "big", "blockquote", "body", "br", "button", "canvas", "caption", "center",
    "cite", "code", "col", "colgroup", "data", "datalist", "dd", "del", "details", "dfn",
    "dialog", "dir", "div", "dl", "dt", "em", "embed", "fieldset", "figcaption", "figure",
    "font", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hgroup", "hr", "html", "i", "iframe", "img", "input", "ins", "kbd", "label",
    "legend", "li", "link", "main", "map", "mark", "marquee", "menu", "meta", "meter", "nav",
    "nobr", "noscript", "object", "ol", "optgroup", "option", "output", "p", "param",
    "picture", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "search",
    "section", "select", "slot", "small", "source", "span", "strike", "strong", "style",
    "sub", "summary", "sup", "svg", "table", "tbody", "td", "template", "textarea", "tfoot",
    "th", "thead", "time", "title", "tr", "track", "tt", "u", "ul", "var", "video", "wbr",
];

/// 已解析的标记文档
///
/// 完整页面按文档解析，列表项等片段按片段解析
pub struct MarkupDocument {
    html: Html,
    fragment: bool,
}

impl MarkupDocument {
    /// 解析标记文本
    pub fn parse(markup: &str) -> Self {
        let head: String = markup
            .trim_start()
            .chars()
            .take(16)
            .collect::<String>()
            .to_ascii_lowercase();
        if head.starts_with("<!doctype") || head.starts_with("<html") {
            Self {
                html: Html::parse_document(markup),
                fragment: false,
            }
        } else {
            Self {
                html: Html::parse_fragment(markup),
                fragment: true,
            }
        }
    }

    /// 没有选择步骤时的取值根节点
    fn roots(&self) -> Vec<ElementRef<'_>> {
        let root = self.html.root_element();
        if !self.fragment {
            return vec![root];
        }
        let children: Vec<ElementRef<'_>> = root.children().filter_map(ElementRef::wrap).collect();
        if children.is_empty() {
            vec![root]
        } else {
            children
        }
    }
}

/// 下标过滤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFilter {
    /// 保留全部
    All,
    /// 只保留第N个，负数从末尾计
    Eq(i64),
    /// 排除指定下标
    Exclude(Vec<i64>),
}

impl IndexFilter {
    fn apply<'a>(&self, elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
        let len = elements.len();
        match self {
            IndexFilter::All => elements,
            IndexFilter::Eq(n) => resolve_index(*n, len)
                .and_then(|i| elements.get(i).copied())
                .into_iter()
                .collect(),
            IndexFilter::Exclude(indexes) => {
                let excluded: HashSet<usize> = indexes
                    .iter()
                    .filter_map(|n| resolve_index(*n, len))
                    .collect();
                elements
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| !excluded.contains(i))
                    .map(|(_, e)| e)
                    .collect()
            }
        }
    }
}

fn resolve_index(n: i64, len: usize) -> Option<usize> {
    if n >= 0 {
        let i = n as usize;
        (i < len).then_some(i)
    } else {
        len.checked_sub(n.unsigned_abs() as usize)
    }
}

/// 单个选择步骤
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStep {
    /// 展开后的 CSS 选择器
    pub css: String,
    /// 下标过滤
    pub index: IndexFilter,
}

impl SelectorStep {
    /// 编译一段简写，空段返回 `None`
    fn compile(segment: &str) -> Option<Self> {
        let (head, index) = split_index(segment.trim());
        let css = shorthand_to_css(head)?;
        Some(Self { css, index })
    }
}

fn split_index(segment: &str) -> (&str, IndexFilter) {
    if let Some((head, spec)) = segment.rsplit_once('!') {
        let parsed: Option<Vec<i64>> = spec.split(':').map(|s| s.trim().parse().ok()).collect();
        if let Some(indexes) = parsed.filter(|v| !v.is_empty()) {
            return (head, IndexFilter::Exclude(indexes));
        }
    }
    if let Some((head, tail)) = segment.rsplit_once('.') {
        if let Ok(n) = tail.trim().parse::<i64>() {
            return (head, IndexFilter::Eq(n));
        }
    }
    (segment, IndexFilter::All)
}

fn shorthand_to_css(head: &str) -> Option<String> {
    let head = head.trim();
    let css = if let Some(id) = head.strip_prefix("id.") {
        format!("#{}", id.trim())
    } else if let Some(class) = head.strip_prefix("class.") {
        class
            .split_whitespace()
            .map(|c| format!(".{}", c))
            .collect::<String>()
    } else if let Some(tag) = head.strip_prefix("tag.") {
        tag.trim().to_string()
    } else {
        head.to_string()
    };
    match css.as_str() {
        "" | "#" => None,
        _ => Some(css),
    }
}

/// 取值方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// 规范化空白后的全部文本
    Text,
    /// 仅元素自身的文本节点
    OwnText,
    /// 每个直接文本节点一行
    TextNodes,
    /// 外层HTML
    Html,
    /// 内层HTML
    InnerHtml,
    /// 元素属性
    Attr(String),
}

impl Attribute {
    fn parse(name: &str) -> Self {
        match name.trim() {
            "text" => Attribute::Text,
            "ownText" => Attribute::OwnText,
            "textNodes" => Attribute::TextNodes,
            "html" | "outerHtml" | "all" => Attribute::Html,
            "innerHtml" => Attribute::InnerHtml,
            other => Attribute::Attr(other.to_string()),
        }
    }

    fn extract(&self, element: ElementRef<'_>, base_url: &str) -> Vec<String> {
        match self {
            Attribute::Text => vec![normalize_whitespace(
                &element.text().collect::<Vec<_>>().join(" "),
            )],
            Attribute::OwnText => vec![normalize_whitespace(&own_text_nodes(element).join(" "))],
            Attribute::TextNodes => own_text_nodes(element)
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Attribute::Html => vec![element.html()],
            Attribute::InnerHtml => vec![element.inner_html()],
            Attribute::Attr(name) => element
                .value()
                .attr(name)
                .map(|raw| normalize_attribute_url(name, raw, base_url))
                .into_iter()
                .collect(),
        }
    }
}

fn own_text_nodes(element: ElementRef<'_>) -> Vec<String> {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect()
}

/// 合并连续空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 末尾一段是否为属性名
fn is_attribute_segment(segment: &str) -> bool {
    let segment = segment.trim();
    if segment.is_empty() {
        return false;
    }
    if VALUE_KEYWORDS.contains(&segment)
        || KNOWN_ATTRIBUTES.contains(&segment)
        || segment.starts_with("data-")
    {
        return true;
    }
    if ["id.", "class.", "tag.", "text."]
        .iter()
        .any(|p| segment.starts_with(p))
    {
        return false;
    }
    if segment
        .chars()
        .any(|c| ".#[]:>~+*! ,()=".contains(c))
    {
        return false;
    }
    if HTML_TAGS.contains(&segment.to_ascii_lowercase().as_str()) {
        return false;
    }
    segment
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// 一条备选选择路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    /// 逐级选择步骤
    pub steps: Vec<SelectorStep>,
    /// 取值方式
    pub attribute: Attribute,
    explicit_attribute: bool,
}

impl SelectorPath {
    fn compile(alternative: &str) -> Self {
        let alternative = alternative.trim();
        if alternative
            .get(..RAW_CSS_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(RAW_CSS_PREFIX))
        {
            return Self::compile_raw_css(&alternative[RAW_CSS_PREFIX.len()..]);
        }

        let mut segments: Vec<&str> = split_top_level(alternative, "@")
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let explicit_attribute = segments.last().is_some_and(|s| is_attribute_segment(s));
        let attribute = if explicit_attribute {
            segments.pop().map(Attribute::parse).unwrap_or(Attribute::Text)
        } else {
            Attribute::Text
        };

        Self {
            steps: segments.into_iter().filter_map(SelectorStep::compile).collect(),
            attribute,
            explicit_attribute,
        }
    }

    fn compile_raw_css(body: &str) -> Self {
        let parts = split_top_level(body, "@");
        let (css, attribute, explicit_attribute) = match parts.last() {
            Some(last) if parts.len() > 1 && is_attribute_segment(last) => (
                &body[..body.len() - last.len() - 1],
                Attribute::parse(last),
                true,
            ),
            _ => (body, Attribute::Text, false),
        };
        let css = css.trim();
        let steps = if css.is_empty() {
            Vec::new()
        } else {
            vec![SelectorStep {
                css: css.to_string(),
                index: IndexFilter::All,
            }]
        };
        Self {
            steps,
            attribute,
            explicit_attribute,
        }
    }

    /// 没有任何可执行内容的路径
    fn is_empty(&self) -> bool {
        self.steps.is_empty() && !self.explicit_attribute
    }

    fn select<'a>(&self, doc: &'a MarkupDocument) -> Result<Vec<ElementRef<'a>>, RuleError> {
        if self.steps.is_empty() {
            return Ok(doc.roots());
        }

        let mut current: Option<Vec<ElementRef<'a>>> = None;
        for step in &self.steps {
            let selector = Selector::parse(&step.css)
                .map_err(|e| RuleError::SelectorCompile(format!("{}: {:?}", step.css, e)))?;
            let matched: Vec<ElementRef<'a>> = match &current {
                None => doc.html.select(&selector).collect(),
                Some(context) => {
                    let ids: HashSet<_> = context.iter().map(|e| e.id()).collect();
                    doc.html
                        .select(&selector)
                        .filter(|e| e.ancestors().any(|a| ids.contains(&a.id())))
                        .collect()
                }
            };
            let filtered = step.index.apply(matched);
            if filtered.is_empty() {
                return Ok(filtered);
            }
            current = Some(filtered);
        }
        Ok(current.unwrap_or_default())
    }
}

/// 正则后处理
#[derive(Debug, Clone)]
pub enum RegexPost {
    /// 取第一个匹配，有捕获组时取第1组
    Capture(Regex),
    /// 全量替换
    Replace { pattern: Regex, replacement: String },
}

impl PartialEq for RegexPost {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RegexPost::Capture(a), RegexPost::Capture(b)) => a.as_str() == b.as_str(),
            (
                RegexPost::Replace {
                    pattern: a,
                    replacement: ra,
                },
                RegexPost::Replace {
                    pattern: b,
                    replacement: rb,
                },
            ) => a.as_str() == b.as_str() && ra == rb,
            _ => false,
        }
    }
}

impl RegexPost {
    /// 编译正则，给出替换文本时为全量替换
    pub fn compile(pattern: &str, replacement: Option<&str>) -> Result<Self, RuleError> {
        let regex = Regex::new(pattern).map_err(|e| RuleError::InvalidRegex(e.to_string()))?;
        Ok(match replacement {
            Some(replacement) => RegexPost::Replace {
                pattern: regex,
                replacement: replacement.to_string(),
            },
            None => RegexPost::Capture(regex),
        })
    }

    /// 对文本应用后处理
    pub fn apply(&self, text: &str) -> String {
        match self {
            RegexPost::Capture(regex) => regex
                .captures(text)
                .and_then(|caps| {
                    if regex.captures_len() > 1 {
                        caps.get(1)
                    } else {
                        caps.get(0)
                    }
                })
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            RegexPost::Replace {
                pattern,
                replacement,
            } => pattern.replace_all(text, replacement.as_str()).into_owned(),
        }
    }
}

/// 编译后的选择器规则
///
/// 编译是纯函数，同一规则编译两次得到相同的结构
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// 备选路径
    pub alternatives: Vec<SelectorPath>,
    /// 正则后处理
    pub post: Option<RegexPost>,
}

/// 求值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorOutput {
    /// 标量模式，多个值以换行连接
    Scalar(String),
    /// 列表模式，每个元素的外层HTML
    List(Vec<String>),
}

impl CompiledRule {
    /// 编译规则
    pub fn compile(rule: &str) -> Result<Self, RuleError> {
        let (expression, regex, replacement) = split_regex(rule);
        let post = regex
            .map(|pattern| RegexPost::compile(pattern, replacement))
            .transpose()?;
        let alternatives = split_top_level(expression, "||")
            .into_iter()
            .map(SelectorPath::compile)
            .collect();
        Ok(Self { alternatives, post })
    }

    /// 标量求值
    pub fn apply_scalar(&self, doc: &MarkupDocument, base_url: &str) -> String {
        for path in self.alternatives.iter().filter(|p| !p.is_empty()) {
            let elements = match path.select(doc) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(error = %e, "Selector alternative skipped");
                    continue;
                }
            };
            let joined = elements
                .into_iter()
                .flat_map(|el| path.attribute.extract(el, base_url))
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            let value = match &self.post {
                Some(post) => post.apply(&joined),
                None => joined,
            };
            if !value.is_empty() {
                return value;
            }
        }
        String::new()
    }

    /// 列表求值，返回每个匹配元素的外层HTML
    pub fn apply_list(&self, doc: &MarkupDocument) -> Vec<String> {
        for path in self.alternatives.iter().filter(|p| !p.steps.is_empty()) {
            match path.select(doc) {
                Ok(elements) if !elements.is_empty() => {
                    return elements.into_iter().map(|el| el.html()).collect();
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Selector alternative skipped"),
            }
        }
        Vec::new()
    }
}

/// 编译并对标记文本求值
///
/// 编译或求值失败都返回空结果
pub fn compile_and_apply(markup: &str, rule: &str, base_url: &str, want_list: bool) -> SelectorOutput {
    let compiled = match CompiledRule::compile(rule) {
        Ok(compiled) => compiled,
        Err(e) => {
            debug!(rule = rule, error = %e, "Rule compilation failed");
            return if want_list {
                SelectorOutput::List(Vec::new())
            } else {
                SelectorOutput::Scalar(String::new())
            };
        }
    };
    let doc = MarkupDocument::parse(markup);
    if want_list {
        SelectorOutput::List(compiled.apply_list(&doc))
    } else {
        SelectorOutput::Scalar(compiled.apply_scalar(&doc, base_url))
    }
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod tests;
