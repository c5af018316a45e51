// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 会话变量存储
///
/// 同一书源会话内（搜索 → 详情 → 目录 → 正文）共享的键值表，
/// 供脚本在相互独立的提取调用之间传递登录令牌、设备ID等数据。
/// 克隆得到的是同一存储的句柄；不同会话各自创建存储，互不可见。
#[derive(Debug, Clone)]
pub struct SessionVariableStore {
    session_id: Uuid,
    entries: Arc<DashMap<String, String>>,
}

impl SessionVariableStore {
    /// 为新会话创建空存储
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            entries: Arc::new(DashMap::new()),
        }
    }

    /// 所属会话ID
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// 读取变量
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// 写入变量，返回旧值
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// 删除变量
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// 是否存在变量
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清空变量，会话结束时调用
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for SessionVariableStore {
    fn default() -> Self {
        Self::new()
    }
}
