// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 10_000_000;
const DEFAULT_RECURSION_LIMIT: u64 = 512;
const DEFAULT_STACK_SIZE_BYTES: u64 = 8 * 1024 * 1024;
const DEFAULT_PERMISSIVE_MAX_SCRIPT_LEN: u64 = 512;
const DEFAULT_PERMISSIVE_NON_ASCII_RATIO: f64 = 0.3;
const DEFAULT_PERMISSIVE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_MAX_RETRIES: u64 = 2;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; scraperule/1.0)";
const DEFAULT_MAX_CONTINUATION_DEPTH: u64 = 4;
const DEFAULT_LOG_FILTER: &str = "info,scraperule=debug";

/// 列表规则无结果时依次尝试的结构选择器
const DEFAULT_FALLBACK_LIST_SELECTORS: [&str; 8] = [
    ".item",
    ".card",
    ".row",
    "article",
    ".list-item",
    ".result",
    "ul > li",
    "table tr",
];

/// 应用程序配置设置
///
/// 包含脚本沙箱、网络桥、规则提取和日志等所有配置项
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    /// 脚本沙箱配置
    pub sandbox: SandboxSettings,
    /// 网络桥配置
    pub network: NetworkSettings,
    /// 规则提取配置
    pub extraction: ExtractionSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 脚本沙箱配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    /// 单次脚本执行超时时间（毫秒）
    pub timeout_ms: u64,
    /// 循环迭代次数上限
    pub loop_iteration_limit: u64,
    /// 递归深度上限
    pub recursion_limit: usize,
    /// 脚本线程栈大小（字节）
    pub stack_size_bytes: usize,
    /// 宽松求值配置
    pub permissive_eval: PermissiveEvalSettings,
}

impl SandboxSettings {
    /// 执行超时时间
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
            loop_iteration_limit: DEFAULT_LOOP_ITERATION_LIMIT,
            recursion_limit: DEFAULT_RECURSION_LIMIT as usize,
            stack_size_bytes: DEFAULT_STACK_SIZE_BYTES as usize,
            permissive_eval: PermissiveEvalSettings::default(),
        }
    }
}

/// 宽松求值启发式配置
///
/// 判断载荷是正文/标记（原样返回）还是短脚本（求值）
#[derive(Debug, Clone, Deserialize)]
pub struct PermissiveEvalSettings {
    /// 超过该长度的载荷视为正文
    pub max_script_len: usize,
    /// 非ASCII字符占比超过该值的载荷视为正文
    pub non_ascii_ratio: f64,
    /// 嵌套沙箱的超时时间（毫秒）
    pub nested_timeout_ms: u64,
}

impl Default for PermissiveEvalSettings {
    fn default() -> Self {
        Self {
            max_script_len: DEFAULT_PERMISSIVE_MAX_SCRIPT_LEN as usize,
            non_ascii_ratio: DEFAULT_PERMISSIVE_NON_ASCII_RATIO,
            nested_timeout_ms: DEFAULT_PERMISSIVE_TIMEOUT_MS,
        }
    }
}

/// 网络桥配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    /// 最大重试次数
    pub max_retries: u32,
    /// 单次请求超时时间（毫秒）
    pub request_timeout_ms: u64,
    /// 初始退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 请求使用的User-Agent
    pub user_agent: String,
}

impl NetworkSettings {
    /// 单次请求超时时间
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 初始退避时间
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES as u32,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// 规则提取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionSettings {
    /// 列表规则无结果时的兜底选择器（按顺序尝试）
    pub fallback_list_selectors: Vec<String>,
    /// 列表脚本后续规则的最大递归深度
    pub max_continuation_depth: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            fallback_list_selectors: DEFAULT_FALLBACK_LIST_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_continuation_depth: DEFAULT_MAX_CONTINUATION_DEPTH as usize,
        }
    }
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// tracing 过滤规则
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `SCRAPERULE__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SCRAPERULE").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 从指定配置文件加载（文件之后仍叠加环境变量）
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::with_defaults()?
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("SCRAPERULE").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let fallback_selectors: Vec<String> = DEFAULT_FALLBACK_LIST_SELECTORS
            .iter()
            .map(|s| s.to_string())
            .collect();

        Config::builder()
            // Sandbox
            .set_default("sandbox.timeout_ms", DEFAULT_SCRIPT_TIMEOUT_MS)?
            .set_default("sandbox.loop_iteration_limit", DEFAULT_LOOP_ITERATION_LIMIT)?
            .set_default("sandbox.recursion_limit", DEFAULT_RECURSION_LIMIT)?
            .set_default("sandbox.stack_size_bytes", DEFAULT_STACK_SIZE_BYTES)?
            .set_default(
                "sandbox.permissive_eval.max_script_len",
                DEFAULT_PERMISSIVE_MAX_SCRIPT_LEN,
            )?
            .set_default(
                "sandbox.permissive_eval.non_ascii_ratio",
                DEFAULT_PERMISSIVE_NON_ASCII_RATIO,
            )?
            .set_default(
                "sandbox.permissive_eval.nested_timeout_ms",
                DEFAULT_PERMISSIVE_TIMEOUT_MS,
            )?
            // Network bridge
            .set_default("network.max_retries", DEFAULT_MAX_RETRIES)?
            .set_default("network.request_timeout_ms", DEFAULT_REQUEST_TIMEOUT_MS)?
            .set_default("network.initial_backoff_ms", DEFAULT_INITIAL_BACKOFF_MS)?
            .set_default("network.user_agent", DEFAULT_USER_AGENT)?
            // Extraction
            .set_default("extraction.fallback_list_selectors", fallback_selectors)?
            .set_default(
                "extraction.max_continuation_depth",
                DEFAULT_MAX_CONTINUATION_DEPTH,
            )?
            // Logging
            .set_default("logging.filter", DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
