// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 脚本网络桥
//!
//! 脚本在独立线程上同步运行，网络请求通过桥接器投递到 tokio 运行时执行，
//! 调用方在有界通道上阻塞等待结果。任何失败都返回空响应。

use crate::engines::router::EngineRouter;
use crate::engines::traits::{FetchRequest, FetchResponse};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// 同步网络桥接口
pub trait NetworkBridge: Send + Sync {
    /// 执行请求，阻塞直到完成或超时
    fn execute(&self, request: FetchRequest) -> FetchResponse;
}

/// 离线桥，所有请求返回空响应
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBridge;

impl NetworkBridge for OfflineBridge {
    fn execute(&self, request: FetchRequest) -> FetchResponse {
        debug!(url = %request.url, "Network bridge offline, returning empty response");
        FetchResponse::empty()
    }
}

/// 基于 tokio 运行时的网络桥
///
/// 不能在运行时的 worker 线程上直接调用，否则会占住该线程
pub struct RuntimeBridge {
    handle: Handle,
    router: Arc<EngineRouter>,
    wait_timeout: Duration,
}

impl RuntimeBridge {
    /// 创建网络桥
    ///
    /// # 参数
    ///
    /// * `handle` - tokio 运行时句柄
    /// * `router` - 带重试的引擎路由器
    /// * `wait_timeout` - 等待结果的最长时间，应覆盖全部重试
    pub fn new(handle: Handle, router: Arc<EngineRouter>, wait_timeout: Duration) -> Self {
        Self {
            handle,
            router,
            wait_timeout,
        }
    }
}

impl NetworkBridge for RuntimeBridge {
    fn execute(&self, request: FetchRequest) -> FetchResponse {
        let (tx, rx) = mpsc::sync_channel(1);
        let router = self.router.clone();
        let url = request.url.clone();

        self.handle.spawn(async move {
            let response = router.fetch(&request).await;
            let _ = tx.send(response);
        });

        match rx.recv_timeout(self.wait_timeout) {
            Ok(response) => response,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(url = %url, timeout = ?self.wait_timeout, "Network bridge wait timed out");
                FetchResponse::empty()
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!(url = %url, "Network bridge task dropped before responding");
                FetchResponse::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_bridge_returns_empty() {
        let response = OfflineBridge.execute(FetchRequest::get("https://example.com"));
        assert!(response.is_empty());
    }
}
