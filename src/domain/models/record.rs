// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// 列表项的原始数据，便于排查规则问题
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum RawItem {
    /// 列表项的HTML片段
    Markup(String),
    /// 列表项的JSON对象
    Json(Value),
}

/// 提取出的一条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// 字段名到提取结果
    pub fields: BTreeMap<String, String>,
    /// 原始列表项
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawItem>,
}

impl ExtractedRecord {
    /// 读取字段，不存在时返回空字符串
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }
}
