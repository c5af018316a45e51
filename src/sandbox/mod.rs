// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 脚本沙箱模块
///
/// 在隔离、限时的 JS 环境中执行规则脚本，脚本只能通过显式注入的能力集合
/// 访问会话变量、网络和 Cookie。
pub mod capabilities;
pub mod crypto;
pub mod helpers;
pub mod network_bridge;
pub mod permissive;
mod runtime;

use crate::config::settings::SandboxSettings;
use crate::domain::models::context::ExecutionContext;
use crate::domain::models::document::Document;
use crate::domain::models::source::Source;
use crate::domain::rules::json_path::value_to_string;
use crate::utils::errors::ScriptError;
use capabilities::ScriptCapabilities;
use permissive::{PayloadKind, ProseHeuristic};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 脚本返回值
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `undefined` 或 `null`
    Empty,
    /// 字符串、数字、布尔值
    Text(String),
    /// 对象或数组
    Json(Value),
}

impl ScriptValue {
    /// 转为文本
    pub fn into_text(self) -> String {
        match self {
            ScriptValue::Empty => String::new(),
            ScriptValue::Text(text) => text,
            ScriptValue::Json(value) => value_to_string(&value),
        }
    }

    /// 转为文档，供后续规则继续处理
    pub fn into_document(self) -> Document {
        match self {
            ScriptValue::Empty => Document::Html(String::new()),
            ScriptValue::Text(text) => Document::detect(&text),
            ScriptValue::Json(value) => Document::from_value(value),
        }
    }
}

/// 单次脚本执行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    /// 脚本最后一个表达式的值
    pub value: ScriptValue,
    /// 脚本通过 `java.setContent` 替换的当前数据载荷
    pub replaced_result: Option<String>,
}

impl ScriptOutcome {
    /// 后续流水线的输入：有替换载荷时优先使用替换载荷
    pub fn into_document(self) -> Document {
        match self.replaced_result {
            Some(replaced) => Document::detect(&replaced),
            None => self.value.into_document(),
        }
    }

    /// 文本形式的结果
    pub fn into_text(self) -> String {
        match self.replaced_result {
            Some(replaced) => replaced,
            None => self.value.into_text(),
        }
    }
}

/// 脚本可见的变量
///
/// 以 JSON 字面量注入，`null` 表示未设置
#[derive(Debug, Clone, Default)]
pub struct ScriptBindings {
    /// 当前数据载荷
    pub result: Value,
    /// 原始文档
    pub src: Value,
    /// 查询关键字
    pub key: Value,
    /// 页码
    pub page: Value,
    /// 基础URL
    pub base_url: Value,
    /// 书源
    pub source: Value,
}

impl ScriptBindings {
    /// 从执行上下文构造
    pub fn from_context(context: &ExecutionContext, source: &Source) -> Self {
        Self {
            result: context
                .result
                .as_ref()
                .map(|r| Value::String(r.clone()))
                .unwrap_or(Value::Null),
            src: Value::Null,
            key: context
                .key
                .as_ref()
                .map(|k| Value::String(k.clone()))
                .unwrap_or(Value::Null),
            page: Value::from(context.page),
            base_url: Value::String(context.base_url.clone()),
            source: source.script_view(),
        }
    }

    /// 设置当前数据载荷
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    /// 设置原始文档
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Value::String(src.into());
        self
    }

    /// 生成变量声明脚本
    fn declarations(&self) -> String {
        format!(
            "var result = {};\nvar src = {};\nvar key = {};\nvar page = {};\nvar baseUrl = {};\nvar source = {};\n",
            self.result, self.src, self.key, self.page, self.base_url, self.source
        )
    }
}

/// 脚本沙箱
///
/// 克隆开销很小，克隆体共享同一能力集合
#[derive(Clone, Debug)]
pub struct Sandbox {
    settings: SandboxSettings,
    capabilities: ScriptCapabilities,
    library: Option<Arc<str>>,
    heuristic: ProseHeuristic,
}

impl Sandbox {
    /// 创建沙箱
    pub fn new(settings: SandboxSettings, capabilities: ScriptCapabilities) -> Self {
        let heuristic = ProseHeuristic::new(&settings.permissive_eval);
        Self {
            settings,
            capabilities,
            library: None,
            heuristic,
        }
    }

    /// 设置书源脚本库
    pub fn with_library(mut self, library: Option<&str>) -> Self {
        self.library = library
            .filter(|l| !l.trim().is_empty())
            .map(Arc::from);
        self
    }

    /// 沙箱配置
    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    /// 能力集合
    pub fn capabilities(&self) -> &ScriptCapabilities {
        &self.capabilities
    }

    /// 书源脚本库
    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// 是否加载了脚本库
    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    /// 使用默认超时执行脚本
    pub fn run(&self, script: &str, bindings: &ScriptBindings) -> Result<ScriptOutcome, ScriptError> {
        self.run_with_timeout(script, bindings, self.settings.timeout())
    }

    /// 执行脚本
    ///
    /// # 参数
    ///
    /// * `script` - 脚本源码，最后一个表达式的值作为结果
    /// * `bindings` - 注入的变量
    /// * `timeout` - 执行超时
    ///
    /// # 返回值
    ///
    /// * `Ok(ScriptOutcome)` - 执行结果
    /// * `Err(ScriptError)` - 编译/运行错误、超时或线程异常
    pub fn run_with_timeout(
        &self,
        script: &str,
        bindings: &ScriptBindings,
        timeout: Duration,
    ) -> Result<ScriptOutcome, ScriptError> {
        let start = Instant::now();
        let job = runtime::ScriptJob {
            sandbox: self.clone(),
            declarations: bindings.declarations(),
            script: script.to_string(),
        };
        let outcome = runtime::execute(job, timeout);
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Script executed"
        );
        outcome
    }

    /// 执行脚本并转为文本，任何错误都返回空字符串
    pub fn eval_text(&self, script: &str, bindings: &ScriptBindings) -> String {
        match self.run(script, bindings) {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                warn!(error = %e, "Script failed, substituting empty result");
                String::new()
            }
        }
    }

    /// 宽松求值
    ///
    /// 正文或标记原样返回；短脚本在独立限时的嵌套沙箱中执行，失败时原样返回
    pub fn permissive_eval(&self, payload: &str) -> String {
        match self.heuristic.classify(payload) {
            PayloadKind::Prose => payload.to_string(),
            PayloadKind::Script => {
                let timeout = Duration::from_millis(self.settings.permissive_eval.nested_timeout_ms);
                match self.run_with_timeout(payload, &ScriptBindings::default(), timeout) {
                    Ok(outcome) => outcome.into_text(),
                    Err(e) => {
                        debug!(error = %e, "Permissive eval failed, returning payload unchanged");
                        payload.to_string()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sandbox_test.rs"]
mod tests;
