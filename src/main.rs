// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{bail, Context};
use scraperule::application::use_cases::source_use_case::SourceUseCase;
use scraperule::config::settings::Settings;
use scraperule::domain::models::source::Source;
use scraperule::domain::services::session::ScrapeSession;
use scraperule::engines::reqwest_engine::ReqwestEngine;
use scraperule::engines::router::EngineRouter;
use scraperule::infrastructure::repositories::credential_repo_impl::InMemoryCredentialRepository;
use scraperule::sandbox::network_bridge::RuntimeBridge;
use scraperule::utils::retry_policy::RetryPolicy;
use scraperule::utils::telemetry;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

const USAGE: &str = "usage: scraperule <source.json> <search|book-info|toc|content> <document-file> [key|page-url]\n       scraperule <source.json> search-url <key> [page]";

/// 主函数
///
/// 加载书源和文档文件，执行一次规则解析并以 JSON 输出结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    telemetry::init_telemetry(Some(&settings.logging.filter));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let (source_path, operation, target) = (&args[0], args[1].as_str(), &args[2]);
    let extra = args.get(3).cloned().unwrap_or_default();

    let source: Source = serde_json::from_str(
        &std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read source file {}", source_path))?,
    )
    .with_context(|| format!("invalid source definition in {}", source_path))?;
    info!(source_id = %source.id, operation, "Running rule operation");

    let use_case = SourceUseCase::new(build_session(source, &settings)?);

    let output = match operation {
        "search-url" => {
            let page = extra.parse::<i64>().unwrap_or(1);
            serde_json::to_value(use_case.search_url(target.clone(), page).await?)?
        }
        "search" => serde_json::to_value(use_case.search(read_document(target)?, extra).await?)?,
        "book-info" => serde_json::to_value(use_case.book_info(read_document(target)?, extra).await?)?,
        "toc" => serde_json::to_value(use_case.toc(read_document(target)?, extra).await?)?,
        "content" => serde_json::to_value(use_case.content(read_document(target)?, extra).await?)?,
        other => bail!("unknown operation '{}'\n{}", other, USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_document(path: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read document {}", path))
}

/// 构建联网会话：脚本网络请求经由 reqwest 引擎和带重试的路由器发送
fn build_session(source: Source, settings: &Settings) -> anyhow::Result<ScrapeSession> {
    let network = &settings.network;
    let engine = ReqwestEngine::new(&network.user_agent)?;
    let router = Arc::new(EngineRouter::new(
        vec![Arc::new(engine)],
        RetryPolicy::with_limits(network.max_retries, network.initial_backoff()),
    ));
    let wait_timeout = network.request_timeout() * (network.max_retries + 1) + network.initial_backoff() * 4;
    let bridge = RuntimeBridge::new(Handle::current(), router, wait_timeout);

    Ok(ScrapeSession::new(
        source,
        settings,
        Arc::new(bridge),
        Arc::new(InMemoryCredentialRepository::new()),
    ))
}
