// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::context::ExecutionContext;
use crate::domain::models::source::Source;
use crate::domain::rules::grammar::replace_placeholders;
use crate::domain::rules::json_path;
use crate::sandbox::{Sandbox, ScriptBindings};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static PAGE_ARITHMETIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^page\s*([+-])\s*(\d+)$").expect("Failed to compile page arithmetic regex")
});

/// `{{...}}` 占位符解析器
///
/// 依次识别 `key`、`page`、`page±N`、`source.<字段>`、`baseUrl`、`host()`，
/// 其余表达式交给脚本沙箱求值；求值失败时占位符原样保留
pub struct TemplateResolver<'a> {
    source: &'a Source,
    sandbox: Option<&'a Sandbox>,
}

impl<'a> TemplateResolver<'a> {
    /// 创建解析器，没有沙箱时脚本表达式原样保留
    pub fn new(source: &'a Source, sandbox: Option<&'a Sandbox>) -> Self {
        Self { source, sandbox }
    }

    /// 解析模板
    pub fn resolve(&self, template: &str, context: &ExecutionContext) -> String {
        replace_placeholders(template, |raw| self.resolve_placeholder(raw, context))
    }

    fn resolve_placeholder(&self, raw: &str, context: &ExecutionContext) -> String {
        let expr = raw.trim();
        let verbatim = || format!("{{{{{}}}}}", raw);

        if expr == "key" {
            return context.key.clone().unwrap_or_default();
        }
        if expr == "page" {
            return context.page.to_string();
        }
        if let Some(caps) = PAGE_ARITHMETIC.captures(expr) {
            let offset: i64 = caps[2].parse().unwrap_or(0);
            let page = if &caps[1] == "+" {
                context.page.saturating_add(offset)
            } else {
                context.page.saturating_sub(offset)
            };
            return page.to_string();
        }
        if let Some(field) = expr.strip_prefix("source.") {
            return self.source.field(field.trim()).unwrap_or_default();
        }
        if expr == "baseUrl" {
            return context.base_url.clone();
        }

        let Some(sandbox) = self.sandbox else {
            return verbatim();
        };
        if expr == "host()" && !sandbox.has_library() {
            return verbatim();
        }

        let bindings = ScriptBindings::from_context(context, self.source);
        match sandbox.run(expr, &bindings) {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                debug!(expression = expr, error = %e, "Template expression failed, keeping placeholder");
                verbatim()
            }
        }
    }
}

/// JSON 模式：每个占位符按点路径在 JSON 对象上取值，取不到为空
pub fn resolve_json_template(template: &str, document: &Value) -> String {
    replace_placeholders(template, |expr| json_path::resolve_string(document, expr.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::SandboxSettings;
    use crate::domain::models::variables::SessionVariableStore;
    use crate::sandbox::capabilities::ScriptCapabilities;
    use serde_json::json;

    fn source() -> Source {
        let mut source = Source::new("demo", "https://example.com");
        source.name = "Demo".to_string();
        source
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("https://example.com", SessionVariableStore::new())
            .with_key("rust")
            .with_page(2)
    }

    fn sandbox(library: Option<&str>) -> Sandbox {
        Sandbox::new(
            SandboxSettings::default(),
            ScriptCapabilities::offline("demo", SessionVariableStore::new()),
        )
        .with_library(library)
    }

    #[test]
    fn test_builtin_placeholders() {
        let source = source();
        let resolver = TemplateResolver::new(&source, None);
        assert_eq!(
            resolver.resolve("{{baseUrl}}/s?q={{key}}&p={{page}}&n={{page+1}}&m={{ page - 1 }}", &context()),
            "https://example.com/s?q=rust&p=2&n=3&m=1"
        );
        assert_eq!(resolver.resolve("{{source.name}}|{{source.nope}}", &context()), "Demo|");
    }

    #[test]
    fn test_unknown_expression_without_sandbox_is_verbatim() {
        let source = source();
        let resolver = TemplateResolver::new(&source, None);
        assert_eq!(resolver.resolve("a{{1+1}}b", &context()), "a{{1+1}}b");
    }

    #[test]
    fn test_script_expressions() {
        let source = source();
        let sb = sandbox(None);
        let resolver = TemplateResolver::new(&source, Some(&sb));
        assert_eq!(resolver.resolve("p{{page * 10}}", &context()), "p20");
        assert_eq!(resolver.resolve("{{key.toUpperCase()}}", &context()), "RUST");
        assert_eq!(resolver.resolve("x{{broken(}}y", &context()), "x{{broken(}}y");
        assert_eq!(resolver.resolve("{{host()}}/a", &context()), "{{host()}}/a");
    }

    #[test]
    fn test_host_from_library() {
        let source = source();
        let sb = sandbox(Some("function host() { return 'https://m.example.com'; }"));
        let resolver = TemplateResolver::new(&source, Some(&sb));
        assert_eq!(resolver.resolve("{{host()}}/book/1", &context()), "https://m.example.com/book/1");
    }

    #[test]
    fn test_json_template() {
        let doc = json!({"id": 7, "info": {"slug": "abc"}});
        assert_eq!(
            resolve_json_template("/book/{{$.id}}/{{info.slug}}{{$.missing}}", &doc),
            "/book/7/abc"
        );
    }
}
