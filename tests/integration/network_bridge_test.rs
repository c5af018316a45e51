// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::source_from;
use scraperule::application::use_cases::source_use_case::SourceUseCase;
use scraperule::config::settings::Settings;
use scraperule::domain::repositories::credential_repository::CredentialRepository;
use scraperule::domain::services::session::ScrapeSession;
use scraperule::engines::reqwest_engine::{ReqwestEngine, DEFAULT_USER_AGENT};
use scraperule::engines::router::EngineRouter;
use scraperule::infrastructure::repositories::credential_repo_impl::InMemoryCredentialRepository;
use scraperule::sandbox::network_bridge::RuntimeBridge;
use scraperule::utils::retry_policy::RetryPolicy;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 正文规则为给定脚本的联网用例
fn networked_use_case(
    content_rule: &str,
    credentials: Arc<InMemoryCredentialRepository>,
) -> SourceUseCase {
    let source = source_from(json!({
        "id": "net",
        "baseUrl": "https://example.com",
        "headers": {"X-Source": "net"},
        "rules": {"content": {"fields": {"content": content_rule}}}
    }));
    let engine = ReqwestEngine::new(DEFAULT_USER_AGENT).expect("reqwest client");
    let router = Arc::new(EngineRouter::new(vec![Arc::new(engine)], RetryPolicy::none()));
    let bridge = RuntimeBridge::new(Handle::current(), router, Duration::from_secs(5));
    SourceUseCase::new(ScrapeSession::new(
        source,
        &Settings::default(),
        Arc::new(bridge),
        credentials,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_script_ajax_goes_through_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chapter/1"))
        .and(header("X-Source", "net"))
        .respond_with(ResponseTemplate::new(200).set_body_string("chapter body"))
        .mount(&server)
        .await;

    let rule = format!("<js>java.ajax('{}/chapter/1') + '!'</js>", server.uri());
    let use_case = networked_use_case(&rule, Arc::new(InMemoryCredentialRepository::new()));
    let content = use_case
        .content("<p>placeholder</p>".to_string(), String::new())
        .await
        .expect("content");
    assert_eq!(content, "chapter body!");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stored_cookie_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vip"))
        .and(header("Cookie", "sid=7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("vip text"))
        .mount(&server)
        .await;

    let credentials = Arc::new(InMemoryCredentialRepository::new());
    credentials.store_cookie("net", &server.uri(), "sid=7");

    let rule = format!(
        "<js>java.getCookie('{uri}') + '|' + java.ajax('{uri}/vip')</js>",
        uri = server.uri()
    );
    let use_case = networked_use_case(&rule, credentials);
    let content = use_case
        .content(String::new(), String::new())
        .await
        .expect("content");
    assert_eq!(content, "sid=7|vip text");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_server_yields_empty_body() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let rule = format!("<js>java.ajax('http://{}/gone')</js>", address);
    let use_case = networked_use_case(&rule, Arc::new(InMemoryCredentialRepository::new()));
    let content = use_case
        .content("<p>x</p>".to_string(), String::new())
        .await
        .expect("content");
    assert_eq!(content, "");
}
