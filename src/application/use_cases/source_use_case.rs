// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ExtractedRecord;
use crate::domain::services::session::ScrapeSession;
use crate::utils::errors::ConfigurationError;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum SourceUseCaseError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("Blocking task failed: {0}")]
    Join(String),
}

/// 书源用例
///
/// 规则求值是同步且可能阻塞的（脚本线程、网络桥），
/// 这里把每个操作放到 tokio 的阻塞线程池中执行
#[derive(Clone)]
pub struct SourceUseCase {
    session: Arc<ScrapeSession>,
}

impl SourceUseCase {
    pub fn new(session: ScrapeSession) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn session(&self) -> &ScrapeSession {
        &self.session
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, SourceUseCaseError>
    where
        T: Send + 'static,
        F: FnOnce(&ScrapeSession) -> Result<T, ConfigurationError> + Send + 'static,
    {
        let session = self.session.clone();
        match tokio::task::spawn_blocking(move || operation(&session)).await {
            Ok(result) => result.map_err(SourceUseCaseError::from),
            Err(e) => {
                error!(error = %e, "Extraction task panicked or was cancelled");
                Err(SourceUseCaseError::Join(e.to_string()))
            }
        }
    }

    pub async fn search_url(&self, key: String, page: i64) -> Result<String, SourceUseCaseError> {
        self.run_blocking(move |s| s.search_url(&key, page)).await
    }

    pub async fn search(&self, raw: String, key: String) -> Result<Vec<ExtractedRecord>, SourceUseCaseError> {
        self.run_blocking(move |s| s.parse_search(&raw, &key)).await
    }

    pub async fn book_info(&self, raw: String, page_url: String) -> Result<ExtractedRecord, SourceUseCaseError> {
        self.run_blocking(move |s| s.parse_book_info(&raw, &page_url)).await
    }

    pub async fn toc(&self, raw: String, page_url: String) -> Result<Vec<ExtractedRecord>, SourceUseCaseError> {
        self.run_blocking(move |s| s.parse_toc(&raw, &page_url)).await
    }

    pub async fn content(&self, raw: String, page_url: String) -> Result<String, SourceUseCaseError> {
        self.run_blocking(move |s| s.parse_content(&raw, &page_url)).await
    }

    pub async fn decode_cover(&self, cover: String) -> Result<String, SourceUseCaseError> {
        self.run_blocking(move |s| Ok(s.decode_cover(&cover))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;
    use crate::domain::models::source::Source;

    fn use_case() -> SourceUseCase {
        let source: Source = serde_json::from_value(serde_json::json!({
            "id": "demo",
            "baseUrl": "https://example.com",
            "rules": {
                "search": {"url": "/s?q={{key}}", "list": "$.items", "fields": {"name": "$.n"}}
            }
        }))
        .unwrap();
        SourceUseCase::new(ScrapeSession::offline(source, &Settings::default()))
    }

    #[tokio::test]
    async fn test_operations_run_on_blocking_pool() {
        let uc = use_case();
        assert_eq!(
            uc.search_url("rust".into(), 1).await.unwrap(),
            "https://example.com/s?q=rust"
        );
        let records = uc
            .search(r#"{"items":[{"n":"A"}]}"#.into(), "rust".into())
            .await
            .unwrap();
        assert_eq!(records[0].get("name"), "A");
    }

    #[tokio::test]
    async fn test_configuration_errors_surface() {
        let uc = use_case();
        let result = uc.content("<p></p>".into(), String::new()).await;
        assert!(matches!(result, Err(SourceUseCaseError::Configuration(_))));
    }
}
