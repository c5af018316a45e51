// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::RuleError;
use serde_json::Value;

/// 严格查询前缀，大小写不敏感
const STRICT_PREFIX: &str = "@json:";

/// 严格 JSONPath 查询结果
#[derive(Debug, Clone, PartialEq)]
pub struct StrictJsonOutcome {
    /// 查询结果，多个匹配时为数组
    pub value: Value,
    /// 附带的后处理脚本
    pub post_process_script: Option<String>,
}

/// 严格 JSONPath 查询接口
///
/// 用于 `@json:` 前缀的规则，支持递归下降、过滤等完整语法
pub trait StrictJsonPath: Send + Sync {
    /// 执行查询
    fn query(&self, document: &Value, path: &str) -> Result<StrictJsonOutcome, RuleError>;
}

/// 去掉严格查询前缀，不是严格查询时返回 `None`
pub fn strip_strict_prefix(rule: &str) -> Option<&str> {
    let rule = rule.trim_start();
    let prefix = rule.get(..STRICT_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(STRICT_PREFIX)
        .then(|| &rule[STRICT_PREFIX.len()..])
}
