// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;
use thiserror::Error;

/// 规则求值错误类型
///
/// 规则求值过程中的所有错误都在调用点被吞掉并转换为空结果，
/// 该类型只用于内部传递和日志记录
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("选择器编译失败: {0}")]
    SelectorCompile(String),

    #[error("正则表达式无效: {0}")]
    InvalidRegex(String),

    #[error("JSONPath查询失败: {0}")]
    JsonQuery(String),
}

/// 脚本执行错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("脚本执行失败: {0}")]
    Execution(String),

    #[error("脚本执行超时 ({0:?})")]
    Timeout(Duration),

    #[error("无法启动脚本线程: {0}")]
    Spawn(String),

    #[error("脚本线程异常退出")]
    Aborted,
}

/// 加解密与编码错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("密钥或IV长度无效")]
    InvalidLength,

    #[error("解密填充错误")]
    Unpad,

    #[error("解码失败: {0}")]
    Decode(String),
}

/// 配置错误类型
///
/// 这是公开接口唯一会返回的错误，用于区分“书源配置不完整”与“没有结果”
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("书源 {source_id} 缺少规则组: {group}")]
    MissingRuleGroup {
        source_id: String,
        group: &'static str,
    },

    #[error("书源 {source_id} 的规则组 {group} 缺少规则: {rule}")]
    MissingRule {
        source_id: String,
        group: &'static str,
        rule: &'static str,
    },
}
