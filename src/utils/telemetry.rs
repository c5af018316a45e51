// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 默认日志过滤规则
pub const DEFAULT_FILTER: &str = "info,scraperule=debug";

/// 初始化日志系统
///
/// 优先使用 `RUST_LOG`，否则使用给定的过滤规则。
/// 重复初始化时静默忽略，便于测试中多次调用
pub fn init_telemetry(filter: Option<&str>) {
    let filter = filter.unwrap_or(DEFAULT_FILTER).to_string();
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
