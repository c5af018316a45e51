// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::variables::SessionVariableStore;

/// 执行上下文
///
/// 每次顶层提取调用创建一个，调用返回后丢弃
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// 当前查询关键字
    pub key: Option<String>,
    /// 当前页码
    pub page: i64,
    /// 当前数据载荷，脚本中的 `result`
    pub result: Option<String>,
    /// 基础URL
    pub base_url: String,
    /// 会话变量存储
    pub variables: SessionVariableStore,
}

impl ExecutionContext {
    /// 创建上下文，页码默认为1
    pub fn new(base_url: impl Into<String>, variables: SessionVariableStore) -> Self {
        Self {
            key: None,
            page: 1,
            result: None,
            base_url: base_url.into(),
            variables,
        }
    }

    /// 设置查询关键字
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 设置页码
    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    /// 设置当前数据载荷
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}
