// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::credential_repository::CredentialRepository;
use dashmap::DashMap;
use std::sync::Arc;
use url::Url;

/// 内存中的凭据仓库实现
///
/// 以 `(书源, 主机名)` 为键保存 Cookie
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialRepository {
    cookies: Arc<DashMap<(String, String), String>>,
}

impl InMemoryCredentialRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::default()
    }

    fn host_key(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_else(|| url.trim().to_ascii_lowercase())
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn fetch_cookie(&self, source_id: &str, url: &str) -> String {
        self.cookies
            .get(&(source_id.to_string(), Self::host_key(url)))
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    fn store_cookie(&self, source_id: &str, url: &str, cookie: &str) {
        self.cookies.insert(
            (source_id.to_string(), Self::host_key(url)),
            cookie.to_string(),
        );
    }
}
