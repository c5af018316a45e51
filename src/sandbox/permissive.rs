// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::PermissiveEvalSettings;
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*/?\s*[a-zA-Z][^>]*>").expect("Failed to compile tag regex")
});

/// 宽松求值的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// 正文或标记，原样返回
    Prose,
    /// 短脚本表达式，可以执行
    Script,
}

/// 文本与脚本的判定启发式
///
/// 超过长度阈值、非 ASCII 字符占比过高或包含标签的载荷视为正文。
/// 阈值来自配置，只是尽力而为的判断
#[derive(Debug, Clone)]
pub struct ProseHeuristic {
    max_script_len: usize,
    non_ascii_ratio: f64,
}

impl ProseHeuristic {
    /// 从配置创建
    pub fn new(settings: &PermissiveEvalSettings) -> Self {
        Self {
            max_script_len: settings.max_script_len,
            non_ascii_ratio: settings.non_ascii_ratio,
        }
    }

    /// 判定载荷类型
    pub fn classify(&self, payload: &str) -> PayloadKind {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return PayloadKind::Prose;
        }

        let total = trimmed.chars().count();
        if total > self.max_script_len {
            return PayloadKind::Prose;
        }

        let non_ascii = trimmed.chars().filter(|c| !c.is_ascii()).count();
        if non_ascii as f64 / total as f64 > self.non_ascii_ratio {
            return PayloadKind::Prose;
        }

        if TAG_LIKE.is_match(trimmed) {
            return PayloadKind::Prose;
        }

        PayloadKind::Script
    }
}
