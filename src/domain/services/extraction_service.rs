// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ExtractionSettings;
use crate::domain::models::context::ExecutionContext;
use crate::domain::models::document::Document;
use crate::domain::models::record::{ExtractedRecord, RawItem};
use crate::domain::models::source::{FieldRules, Source};
use crate::domain::rules::grammar::{
    contains_script, parse_steps, split_regex, split_top_level, RuleStep, JS_CLOSE, JS_OPEN,
};
use crate::domain::rules::json_path::{self, value_to_string};
use crate::domain::rules::selector::{compile_and_apply, RegexPost, SelectorOutput};
use crate::domain::rules::strict_json::{strip_strict_prefix, StrictJsonPath};
use crate::domain::rules::template::{resolve_json_template, TemplateResolver};
use crate::sandbox::{Sandbox, ScriptBindings, ScriptOutcome};
use crate::utils::errors::ScriptError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

static PUT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@put:\{([^}]*)\}").expect("Failed to compile put token regex"));

static GET_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@get:\{([^}]*)\}").expect("Failed to compile get token regex"));

/// 提取服务
///
/// 规则求值的总入口：判定文档类型，按规则组合选择器、JSON路径、模板和脚本，
/// 返回单个字符串或记录列表。任何规则错误都只影响当前字段。
pub struct ExtractionService {
    source: Arc<Source>,
    sandbox: Sandbox,
    strict_json: Arc<dyn StrictJsonPath>,
    settings: ExtractionSettings,
}

impl ExtractionService {
    /// 创建提取服务
    ///
    /// # 参数
    ///
    /// * `source` - 书源
    /// * `sandbox` - 已加载书源脚本库的沙箱
    /// * `strict_json` - `@json:` 规则使用的查询器
    /// * `settings` - 提取配置
    pub fn new(
        source: Arc<Source>,
        sandbox: Sandbox,
        strict_json: Arc<dyn StrictJsonPath>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            source,
            sandbox,
            strict_json,
            settings,
        }
    }

    /// 书源
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// 脚本沙箱
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// 解析上下文模板
    pub fn resolve_template(&self, template: &str, context: &ExecutionContext) -> String {
        TemplateResolver::new(&self.source, Some(&self.sandbox)).resolve(template, context)
    }

    /// 提取单个字段
    ///
    /// 规则中的脚本片段把规则拆成流水线，每一步的输出作为下一步的输入
    pub fn extract_field(&self, document: &Document, rule: &str, context: &ExecutionContext) -> String {
        let rule = rule.trim();
        if rule.is_empty() {
            return String::new();
        }
        if !contains_script(rule) {
            return self.apply_rule(document, rule, context);
        }

        let mut current = document.clone();
        let mut text = String::new();
        for step in parse_steps(rule) {
            match step {
                RuleStep::Rule(rule) => {
                    text = self.apply_rule(&current, &rule, context);
                    current = Document::detect(&text);
                }
                RuleStep::Script(script) => match self.run_script(&script, &current, document, context) {
                    Ok(outcome) => {
                        text = outcome.clone().into_text();
                        current = outcome.into_document();
                    }
                    Err(e) => {
                        warn!(source_id = %self.source.id, error = %e, "Field script failed, substituting empty result");
                        return String::new();
                    }
                },
            }
        }
        text
    }

    /// 提取记录列表
    ///
    /// 列表规则以 `-` 开头时结果倒序，`+` 开头时忽略该前缀
    pub fn extract_list(
        &self,
        document: &Document,
        list_rule: &str,
        field_rules: &FieldRules,
        context: &ExecutionContext,
    ) -> Vec<ExtractedRecord> {
        let (rule, reverse) = strip_order_prefix(list_rule.trim());
        let mut items = self.list_items(document, rule, context, 0);
        if reverse {
            items.reverse();
        }
        debug!(source_id = %self.source.id, count = items.len(), "List items located");

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.build_record(index, item, field_rules, context))
            .collect()
    }

    fn apply_rule(&self, document: &Document, rule: &str, context: &ExecutionContext) -> String {
        match document {
            Document::Json(value) => self.json_field(value, rule, context),
            Document::Html(markup) => self.markup_field(markup, rule, context),
        }
    }

    fn run_script(
        &self,
        script: &str,
        input: &Document,
        original: &Document,
        context: &ExecutionContext,
    ) -> Result<ScriptOutcome, ScriptError> {
        let bindings = ScriptBindings::from_context(context, &self.source)
            .with_result(document_value(input))
            .with_src(original.as_text());
        self.sandbox.run(script, &bindings)
    }

    /// JSON 字段：`@put` 旁路、模板、`||`/`&&` 取第一个非空
    fn json_field(&self, document: &Value, rule: &str, context: &ExecutionContext) -> String {
        if PUT_TOKEN.is_match(rule) {
            return self.apply_put(document, rule, context);
        }
        if rule.contains("{{") {
            let resolved = resolve_json_template(rule, document);
            if !resolved.is_empty() {
                return resolved;
            }
        }

        for alternative in split_top_level(rule, "||") {
            for part in split_top_level(alternative, "&&") {
                let value = self.json_part(document, part, context);
                if !value.is_empty() {
                    return value;
                }
            }
        }
        String::new()
    }

    fn json_part(&self, document: &Value, part: &str, context: &ExecutionContext) -> String {
        let part = part.trim();
        if part.is_empty() {
            return String::new();
        }
        if let Some(path) = strip_strict_prefix(part) {
            return self.strict_scalar(document, path, context);
        }

        let (path, regex, replacement) = split_regex(part);
        let text = json_path::resolve_string(document, path.trim());
        match regex {
            None => text,
            Some(pattern) => match RegexPost::compile(pattern, replacement) {
                Ok(post) => post.apply(&text),
                Err(e) => {
                    debug!(rule = part, error = %e, "Regex refinement skipped");
                    String::new()
                }
            },
        }
    }

    /// `@put:{key:path}` 旁路：取值写入会话变量，去掉标记后的规则即为结果
    ///
    /// 剩余规则中的 `@get:{key}` 读取会话变量，`{{...}}` 按 JSON 模式解析
    fn apply_put(&self, document: &Value, rule: &str, context: &ExecutionContext) -> String {
        let mut memo: HashMap<String, String> = HashMap::new();
        for caps in PUT_TOKEN.captures_iter(rule) {
            for clause in split_top_level(&caps[1], ",") {
                let Some((key, path)) = clause.split_once(':') else {
                    debug!(clause = clause, "Malformed @put clause skipped");
                    continue;
                };
                let key = trim_quotes(key);
                let path = trim_quotes(path);
                if key.is_empty() || path.is_empty() {
                    continue;
                }
                let value = memo
                    .entry(path.to_string())
                    .or_insert_with(|| self.json_part(document, path, context))
                    .clone();
                context.variables.put(key, value);
            }
        }

        let stripped = PUT_TOKEN.replace_all(rule, "");
        let interpolated = GET_TOKEN.replace_all(&stripped, |caps: &Captures| {
            context.variables.get(caps[1].trim()).unwrap_or_default()
        });
        let interpolated = interpolated.trim();
        if interpolated.contains("{{") {
            resolve_json_template(interpolated, document)
        } else {
            interpolated.to_string()
        }
    }

    /// 严格查询，有后处理脚本时执行脚本并对输出做第二遍 JSON 模板解析
    fn strict_value(&self, document: &Value, path: &str, context: &ExecutionContext) -> Value {
        let outcome = match self.strict_json.query(document, path) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(path = path, error = %e, "Strict JSON query failed");
                return Value::Null;
            }
        };
        let Some(script) = outcome.post_process_script.filter(|s| !s.trim().is_empty()) else {
            return outcome.value;
        };

        let bindings = ScriptBindings::from_context(context, &self.source)
            .with_result(outcome.value)
            .with_src(document.to_string());
        match self.sandbox.run(&script, &bindings) {
            Ok(result) => {
                let mut text = result.into_text();
                if text.contains("{{") {
                    text = resolve_json_template(&text, document);
                }
                match Document::detect(&text) {
                    Document::Json(value) => value,
                    Document::Html(text) => Value::String(text),
                }
            }
            Err(e) => {
                warn!(path = path, error = %e, "Strict JSON post-process script failed");
                Value::Null
            }
        }
    }

    fn strict_scalar(&self, document: &Value, path: &str, context: &ExecutionContext) -> String {
        match self.strict_value(document, path, context) {
            Value::Array(items) => items
                .iter()
                .map(value_to_string)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            other => value_to_string(&other),
        }
    }

    fn strict_list(&self, document: &Value, path: &str, context: &ExecutionContext) -> Vec<Value> {
        match self.strict_value(document, path, context) {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// 标记字段：含 `{{` 时整条规则是上下文模板，否则 `&&` 各部分结果依次拼接
    fn markup_field(&self, markup: &str, rule: &str, context: &ExecutionContext) -> String {
        if rule.contains("{{") {
            let scoped = context.clone().with_result(markup);
            return self.resolve_template(rule, &scoped);
        }

        split_top_level(rule, "&&")
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match compile_and_apply(markup, part, &context.base_url, false) {
                SelectorOutput::Scalar(value) => value,
                SelectorOutput::List(items) => items.join("\n"),
            })
            .collect()
    }

    fn list_items(
        &self,
        document: &Document,
        rule: &str,
        context: &ExecutionContext,
        depth: usize,
    ) -> Vec<RawItem> {
        if contains_script(rule) {
            return self.scripted_list_items(document, rule, context, depth);
        }
        self.plain_list_items(document, rule, context)
    }

    fn plain_list_items(&self, document: &Document, rule: &str, context: &ExecutionContext) -> Vec<RawItem> {
        match document {
            Document::Json(value) => self
                .json_list(value, rule, context)
                .into_iter()
                .map(RawItem::Json)
                .collect(),
            Document::Html(markup) => {
                let items = markup_list(markup, rule, context);
                if items.is_empty() && document.is_markup() {
                    self.fallback_list(markup, context)
                } else {
                    items
                }
            }
        }
    }

    /// 列表规则中的脚本块
    ///
    /// 脚本以原始文档为 `result` 执行；脚本前的规则仅当它是 JSON 路径时作用于脚本输出的 JSON，
    /// 脚本后的规则作为后续规则在脚本输出上递归求值
    fn scripted_list_items(
        &self,
        document: &Document,
        rule: &str,
        context: &ExecutionContext,
        depth: usize,
    ) -> Vec<RawItem> {
        let mut steps = parse_steps(rule).into_iter();
        let mut prefix = None;
        let mut script = None;
        for step in steps.by_ref() {
            match step {
                RuleStep::Rule(rule) => prefix = Some(rule),
                RuleStep::Script(body) => {
                    script = Some(body);
                    break;
                }
            }
        }
        let continuation: String = steps
            .map(|step| match step {
                RuleStep::Rule(rule) => rule,
                RuleStep::Script(body) => format!("{}{}{}", JS_OPEN, body, JS_CLOSE),
            })
            .collect();

        let Some(script) = script else {
            return Vec::new();
        };
        let payload = match self.run_script(&script, document, document, context) {
            Ok(outcome) => outcome.into_document(),
            Err(e) => {
                warn!(source_id = %self.source.id, error = %e, "List script failed, no items");
                return Vec::new();
            }
        };

        let prefix = prefix.filter(|p| {
            let p = p.trim();
            let is_path = !p.is_empty() && (json_path::is_dot_path(p) || strip_strict_prefix(p).is_some());
            if !is_path && !p.is_empty() {
                debug!(prefix = p, "List prefix is not a JSON path, ignored");
            }
            is_path
        });
        let payload = match (prefix, payload) {
            (Some(prefix), Document::Json(value)) => {
                Document::Json(Value::Array(self.json_list(&value, &prefix, context)))
            }
            (_, payload) => payload,
        };

        if continuation.trim().is_empty() {
            return self.plain_list_items(&payload, "", context);
        }
        if depth >= self.settings.max_continuation_depth {
            warn!(depth = depth, "List continuation depth exceeded, no items");
            return Vec::new();
        }
        self.list_items(&payload, continuation.trim(), context, depth + 1)
    }

    /// JSON 列表：空规则取整个文档，`||` 备选取第一个非空，`##` 正则在列表模式下忽略
    fn json_list(&self, document: &Value, rule: &str, context: &ExecutionContext) -> Vec<Value> {
        let rule = rule.trim();
        if rule.is_empty() {
            return match document {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
        }
        if let Some(path) = strip_strict_prefix(rule) {
            return self.strict_list(document, path, context);
        }
        split_top_level(rule, "||")
            .into_iter()
            .map(|alternative| json_path::resolve_list(document, split_regex(alternative).0.trim()))
            .find(|items| !items.is_empty())
            .unwrap_or_default()
    }

    fn fallback_list(&self, markup: &str, context: &ExecutionContext) -> Vec<RawItem> {
        for selector in &self.settings.fallback_list_selectors {
            let items = markup_list(markup, &format!("@css:{}", selector), context);
            if !items.is_empty() {
                debug!(selector = selector.as_str(), count = items.len(), "Fallback list selector matched");
                return items;
            }
        }
        debug!(source_id = %self.source.id, "No fallback list selector matched");
        Vec::new()
    }

    fn build_record(
        &self,
        index: usize,
        item: RawItem,
        field_rules: &FieldRules,
        context: &ExecutionContext,
    ) -> ExtractedRecord {
        let document = match &item {
            RawItem::Markup(markup) => Document::Html(markup.clone()),
            RawItem::Json(value) => Document::from_value(value.clone()),
        };
        let fields: BTreeMap<String, String> = field_rules
            .iter()
            .map(|(name, rule)| (name.clone(), self.extract_field(&document, rule, context)))
            .collect();

        let empty = fields.values().filter(|v| v.is_empty()).count();
        if empty > 0 {
            debug!(index = index, empty_fields = empty, "Record has empty fields");
        }
        ExtractedRecord {
            fields,
            raw: Some(item),
        }
    }
}

fn markup_list(markup: &str, rule: &str, context: &ExecutionContext) -> Vec<RawItem> {
    match compile_and_apply(markup, rule, &context.base_url, true) {
        SelectorOutput::List(items) => items.into_iter().map(RawItem::Markup).collect(),
        SelectorOutput::Scalar(_) => Vec::new(),
    }
}

fn document_value(document: &Document) -> Value {
    match document {
        Document::Json(value) => value.clone(),
        Document::Html(text) => Value::String(text.clone()),
    }
}

fn strip_order_prefix(rule: &str) -> (&str, bool) {
    if let Some(rest) = rule.strip_prefix('-') {
        (rest.trim_start(), true)
    } else if let Some(rest) = rule.strip_prefix('+') {
        (rest.trim_start(), false)
    } else {
        (rule, false)
    }
}

fn trim_quotes(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
