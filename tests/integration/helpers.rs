// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraperule::config::settings::Settings;
use scraperule::domain::models::context::ExecutionContext;
use scraperule::domain::models::source::{FieldRules, Source};
use scraperule::domain::services::session::ScrapeSession;

pub const BASE_URL: &str = "https://example.com";

/// 从 JSON 定义创建书源
pub fn source_from(definition: serde_json::Value) -> Source {
    serde_json::from_value(definition).expect("valid source definition")
}

/// 离线会话
pub fn offline_session(source: Source) -> ScrapeSession {
    ScrapeSession::offline(source, &Settings::default())
}

/// 会话对应的执行上下文
pub fn context_for(session: &ScrapeSession) -> ExecutionContext {
    ExecutionContext::new(BASE_URL, session.variables().clone())
}

pub fn fields(pairs: &[(&str, &str)]) -> FieldRules {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
