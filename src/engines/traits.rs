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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 所有引擎都失败
    #[error("All engines failed")]
    AllEnginesFailed,
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Timeout => true,
            EngineError::Other(_) => false, // Assume other errors (like validation) are not retryable
            EngineError::AllEnginesFailed => false,
        }
    }
}

/// 网络请求
///
/// 脚本中的 `java.ajax` / `java.connect` 等调用最终都会转换为该结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 请求方法
    pub method: String,
    /// 请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// 请求体
    #[serde(default)]
    pub body: Option<String>,
    /// 超时时间
    #[serde(skip, default = "default_timeout")]
    pub timeout: Duration,
}

/// 请求未指定超时时使用的默认值
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn default_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl FetchRequest {
    /// 创建GET请求
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: default_timeout(),
        }
    }
}

/// 网络响应
///
/// `status_code == 0` 且 body 为空表示“空载荷”，即请求最终失败
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FetchResponse {
    /// HTTP状态码
    #[serde(rename = "status")]
    pub status_code: u16,
    /// 响应头
    pub headers: HashMap<String, String>,
    /// 响应内容
    pub body: String,
    /// 响应时间（毫秒）
    #[serde(skip)]
    pub response_time_ms: u64,
}

impl FetchResponse {
    /// 空载荷
    pub fn empty() -> Self {
        Self::default()
    }

    /// 是否为空载荷
    pub fn is_empty(&self) -> bool {
        self.status_code == 0 && self.body.is_empty()
    }
}

/// 传输引擎特质
///
/// 宿主侧的HTTP传输层，脚本沙箱通过网络桥以阻塞方式调用它
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// 执行请求
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
