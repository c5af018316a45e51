// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// 字段名到规则的映射，按字段名排序保证输出稳定
pub type FieldRules = BTreeMap<String, String>;

/// 书源
///
/// 一次抓取会话内不可变的站点配置，提取过程中只读
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Source {
    /// 书源唯一标识
    pub id: String,
    /// 书源名称
    pub name: String,
    /// 站点基础URL
    pub base_url: String,
    /// 脚本库，定义可被规则脚本调用的辅助函数
    pub script_library: Option<String>,
    /// 自定义请求头，同时作为脚本网络请求的默认请求头
    pub headers: HashMap<String, String>,
    /// 登录页地址
    pub login_url: Option<String>,
    /// 登录检测脚本
    pub login_check_script: Option<String>,
    /// 封面解密脚本
    pub cover_decode_script: Option<String>,
    /// 规则组
    pub rules: RuleGroups,
    /// 其他自定义字段，可通过 `{{source.<field>}}` 读取
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// 书源规则组
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleGroups {
    /// 搜索结果
    pub search: Option<ListRuleGroup>,
    /// 书籍详情
    pub book_info: Option<FieldRuleGroup>,
    /// 目录
    pub toc: Option<ListRuleGroup>,
    /// 正文
    pub content: Option<FieldRuleGroup>,
}

/// 列表规则组
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListRuleGroup {
    /// 请求地址模板
    pub url: Option<String>,
    /// 列表规则
    pub list: String,
    /// 每个列表项的字段规则
    pub fields: FieldRules,
}

/// 字段规则组
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldRuleGroup {
    /// 请求地址模板
    pub url: Option<String>,
    /// 字段规则
    pub fields: FieldRules,
}

impl Source {
    /// 创建只有标识和基础URL的书源
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// 设置脚本库
    pub fn with_script_library(mut self, library: impl Into<String>) -> Self {
        self.script_library = Some(library.into());
        self
    }

    /// 读取 `{{source.<field>}}` 引用的字段
    ///
    /// 同时接受驼峰和下划线两种写法
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.clone()),
            "baseUrl" | "base_url" | "url" => Some(self.base_url.clone()),
            "loginUrl" | "login_url" => self.login_url.clone(),
            "header" | "headers" => serde_json::to_string(&self.headers).ok(),
            _ => self.extra.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// 暴露给脚本的 `source` 对象
    pub fn script_view(&self) -> Value {
        let mut view = json!({
            "id": self.id,
            "name": self.name,
            "baseUrl": self.base_url,
            "headers": self.headers,
            "loginUrl": self.login_url,
        });
        if let Value::Object(map) = &mut view {
            for (k, v) in &self.extra {
                map.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_deserialize_camel_case() {
        let source: Source = serde_json::from_value(json!({
            "id": "demo",
            "name": "Demo",
            "baseUrl": "https://example.com",
            "scriptLibrary": "function host() { return 'https://m.example.com'; }",
            "headers": {"Referer": "https://example.com"},
            "group": "novel",
            "rules": {
                "search": {
                    "url": "/search?q={{key}}&p={{page}}",
                    "list": "class.book",
                    "fields": {"name": "tag.h3@text"}
                },
                "content": {"fields": {"content": "id.content@html"}}
            }
        }))
        .unwrap();

        assert_eq!(source.base_url, "https://example.com");
        assert!(source.script_library.is_some());
        let search = source.rules.search.as_ref().unwrap();
        assert_eq!(search.list, "class.book");
        assert_eq!(search.fields.get("name").unwrap(), "tag.h3@text");
        assert!(source.rules.book_info.is_none());
        assert_eq!(source.field("group").as_deref(), Some("novel"));
    }

    #[test]
    fn test_source_field_lookup() {
        let mut source = Source::new("s1", "https://example.com");
        source.name = "Example".to_string();
        source.extra.insert("weight".to_string(), json!(3));

        assert_eq!(source.field("name").as_deref(), Some("Example"));
        assert_eq!(source.field("baseUrl").as_deref(), Some("https://example.com"));
        assert_eq!(source.field("weight").as_deref(), Some("3"));
        assert_eq!(source.field("missing"), None);
    }

    #[test]
    fn test_script_view() {
        let source = Source::new("s1", "https://example.com");
        let view = source.script_view();
        assert_eq!(view["id"], "s1");
        assert_eq!(view["baseUrl"], "https://example.com");
    }
}
