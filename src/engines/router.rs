// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, TransportEngine};
use crate::utils::retry_policy::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, warn};

/// 引擎路由器
///
/// 按顺序轮换传输引擎发送请求，失败时按重试策略有限次重试，
/// 全部失败后返回空载荷而不是错误
pub struct EngineRouter {
    /// 引擎列表
    engines: Vec<Arc<dyn TransportEngine>>,
    /// 重试策略
    retry_policy: RetryPolicy,
    /// 当前轮询索引
    round_robin_index: parking_lot::Mutex<usize>,
}

impl EngineRouter {
    /// 创建新的引擎路由器
    ///
    /// # 参数
    ///
    /// * `engines` - 引擎列表，按优先级排序
    /// * `retry_policy` - 重试策略
    pub fn new(engines: Vec<Arc<dyn TransportEngine>>, retry_policy: RetryPolicy) -> Self {
        Self {
            engines,
            retry_policy,
            round_robin_index: parking_lot::Mutex::new(0),
        }
    }

    /// 选择本次尝试使用的引擎
    ///
    /// 首次尝试从轮询位置开始，之后每次重试换下一个引擎
    fn engine_for_attempt(&self, start: usize, attempt: u32) -> Option<&Arc<dyn TransportEngine>> {
        if self.engines.is_empty() {
            return None;
        }
        let index = (start + attempt as usize) % self.engines.len();
        self.engines.get(index)
    }

    /// 发送请求，返回第一个成功的响应
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 某个引擎成功返回
    /// * `Err(EngineError)` - 重试耗尽后的最后一个错误
    pub async fn try_fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        let start = {
            let mut index = self.round_robin_index.lock();
            let current = *index;
            *index = index.wrapping_add(1);
            current
        };

        let mut attempt: u32 = 0;
        loop {
            let engine = self
                .engine_for_attempt(start, attempt)
                .ok_or(EngineError::AllEnginesFailed)?;

            match engine.fetch(request).await {
                Ok(response) => {
                    debug!(
                        engine = engine.name(),
                        status = response.status_code,
                        url = %request.url,
                        "Fetch succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if !self.retry_policy.should_retry_with_error(attempt, &e) {
                        warn!(engine = engine.name(), url = %request.url, error = %e, "Fetch failed");
                        return Err(e);
                    }
                    attempt += 1;
                    let backoff = self.retry_policy.calculate_backoff(attempt);
                    warn!(
                        engine = engine.name(),
                        url = %request.url,
                        error = %e,
                        attempt,
                        "Fetch failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// 发送请求，失败时返回空载荷
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResponse {
        self.try_fetch(request)
            .await
            .unwrap_or_else(|_| FetchResponse::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FlakyEngine {
        name: &'static str,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FlakyEngine {
        fn new(name: &'static str, failures: usize) -> Self {
            Self {
                name,
                failures_left: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransportEngine for FlakyEngine {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(EngineError::Timeout);
            }
            Ok(FetchResponse {
                status_code: 200,
                body: format!("{} {}", self.name, request.url),
                ..FetchResponse::default()
            })
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::with_limits(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_router_falls_back_to_alternate_engine() {
        let primary = Arc::new(FlakyEngine::new("primary", 1));
        let secondary = Arc::new(FlakyEngine::new("secondary", 0));
        let router = EngineRouter::new(
            vec![
                primary.clone() as Arc<dyn TransportEngine>,
                secondary.clone() as Arc<dyn TransportEngine>,
            ],
            fast_policy(2),
        );

        let response = router.fetch(&FetchRequest::get("http://a/")).await;
        assert_eq!(response.body, "secondary http://a/");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_router_returns_empty_payload_after_bounded_retries() {
        let engine = Arc::new(FlakyEngine::new("broken", usize::MAX));
        let router = EngineRouter::new(vec![engine.clone() as Arc<dyn TransportEngine>], fast_policy(2));

        let response = router.fetch(&FetchRequest::get("http://a/")).await;
        assert!(response.is_empty());
        // 首次请求 + 2 次重试
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_router_without_engines() {
        let router = EngineRouter::new(Vec::new(), fast_policy(2));
        assert!(matches!(
            router.try_fetch(&FetchRequest::get("http://a/")).await,
            Err(EngineError::AllEnginesFailed)
        ));
    }
}
