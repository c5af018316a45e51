// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::context::ExecutionContext;
use crate::domain::models::document::Document;
use crate::domain::models::record::ExtractedRecord;
use crate::domain::models::source::{ListRuleGroup, Source};
use crate::domain::models::variables::SessionVariableStore;
use crate::domain::repositories::credential_repository::CredentialRepository;
use crate::domain::rules::strict_json::StrictJsonPath;
use crate::domain::services::extraction_service::ExtractionService;
use crate::infrastructure::jsonpath::BasicJsonPath;
use crate::infrastructure::repositories::credential_repo_impl::InMemoryCredentialRepository;
use crate::sandbox::capabilities::ScriptCapabilities;
use crate::sandbox::network_bridge::{NetworkBridge, OfflineBridge};
use crate::sandbox::{Sandbox, ScriptBindings};
use crate::utils::errors::ConfigurationError;
use crate::utils::url_utils::resolve_url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// 抓取会话
///
/// 一个书源从搜索到正文的一次完整流程。会话独占自己的变量存储，
/// 关闭或释放时清空，不同会话之间互不可见。
pub struct ScrapeSession {
    source: Arc<Source>,
    variables: SessionVariableStore,
    service: ExtractionService,
}

impl ScrapeSession {
    /// 使用默认严格 JSONPath 查询器创建会话
    pub fn new(
        source: Source,
        settings: &Settings,
        network: Arc<dyn NetworkBridge>,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Self {
        Self::with_collaborators(
            source,
            settings,
            network,
            credentials,
            Arc::new(BasicJsonPath::new()),
        )
    }

    /// 离线会话：脚本网络请求返回空响应，Cookie 保存在内存中
    pub fn offline(source: Source, settings: &Settings) -> Self {
        Self::new(
            source,
            settings,
            Arc::new(OfflineBridge),
            Arc::new(InMemoryCredentialRepository::new()),
        )
    }

    /// 创建会话
    ///
    /// # 参数
    ///
    /// * `source` - 书源
    /// * `settings` - 应用配置
    /// * `network` - 脚本网络桥
    /// * `credentials` - Cookie 来源
    /// * `strict_json` - `@json:` 规则查询器
    pub fn with_collaborators(
        source: Source,
        settings: &Settings,
        network: Arc<dyn NetworkBridge>,
        credentials: Arc<dyn CredentialRepository>,
        strict_json: Arc<dyn StrictJsonPath>,
    ) -> Self {
        let variables = SessionVariableStore::new();
        let capabilities =
            ScriptCapabilities::new(source.id.clone(), variables.clone(), network, credentials)
                .with_default_headers(source.headers.clone())
                .with_request_timeout(settings.network.request_timeout());
        let sandbox = Sandbox::new(settings.sandbox.clone(), capabilities)
            .with_library(source.script_library.as_deref());

        let source = Arc::new(source);
        let service = ExtractionService::new(
            source.clone(),
            sandbox,
            strict_json,
            settings.extraction.clone(),
        );
        info!(
            source_id = %source.id,
            session_id = %variables.session_id(),
            "Scrape session opened"
        );

        Self {
            source,
            variables,
            service,
        }
    }

    /// 书源
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// 会话变量存储
    pub fn variables(&self) -> &SessionVariableStore {
        &self.variables
    }

    /// 提取服务
    pub fn service(&self) -> &ExtractionService {
        &self.service
    }

    /// 生成搜索请求地址
    ///
    /// 相对地址基于书源基础URL补全；`url,{...}` 形式的请求选项原样保留
    pub fn search_url(&self, key: &str, page: i64) -> Result<String, ConfigurationError> {
        let group = self
            .source
            .rules
            .search
            .as_ref()
            .ok_or_else(|| self.missing_group("search"))?;
        let template = group
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| self.missing_rule("search", "url"))?;

        let context = self.context("").with_key(key).with_page(page);
        let resolved = self.service.resolve_template(template, &context);
        Ok(absolutize(&self.source.base_url, resolved.trim()))
    }

    /// 解析搜索结果页
    pub fn parse_search(&self, raw: &str, key: &str) -> Result<Vec<ExtractedRecord>, ConfigurationError> {
        let group = self.list_group(self.source.rules.search.as_ref(), "search")?;
        let context = self.context("").with_key(key);
        let document = self.prepare(raw, &context);
        Ok(self
            .service
            .extract_list(&document, &group.list, &group.fields, &context))
    }

    /// 解析书籍详情页，每个字段独立求值
    pub fn parse_book_info(&self, raw: &str, page_url: &str) -> Result<ExtractedRecord, ConfigurationError> {
        let group = self
            .source
            .rules
            .book_info
            .as_ref()
            .ok_or_else(|| self.missing_group("bookInfo"))?;
        let context = self.context(page_url);
        let document = self.prepare(raw, &context);

        let fields: BTreeMap<String, String> = group
            .fields
            .iter()
            .map(|(name, rule)| (name.clone(), self.service.extract_field(&document, rule, &context)))
            .collect();
        Ok(ExtractedRecord { fields, raw: None })
    }

    /// 解析目录页
    pub fn parse_toc(&self, raw: &str, page_url: &str) -> Result<Vec<ExtractedRecord>, ConfigurationError> {
        let group = self.list_group(self.source.rules.toc.as_ref(), "toc")?;
        let context = self.context(page_url);
        let document = self.prepare(raw, &context);
        Ok(self
            .service
            .extract_list(&document, &group.list, &group.fields, &context))
    }

    /// 解析正文页，使用 `content` 组中的 `content` 字段规则
    pub fn parse_content(&self, raw: &str, page_url: &str) -> Result<String, ConfigurationError> {
        let group = self
            .source
            .rules
            .content
            .as_ref()
            .ok_or_else(|| self.missing_group("content"))?;
        let rule = group
            .fields
            .get("content")
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| self.missing_rule("content", "content"))?;

        let context = self.context(page_url);
        let document = self.prepare(raw, &context);
        Ok(self.service.extract_field(&document, rule, &context))
    }

    /// 执行封面解密脚本，`result` 为封面地址或数据；未配置脚本时原样返回
    pub fn decode_cover(&self, cover: &str) -> String {
        let Some(script) = self
            .source
            .cover_decode_script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            return cover.to_string();
        };
        let bindings = ScriptBindings::from_context(&self.context(""), &self.source)
            .with_result(Value::String(cover.to_string()));
        self.service.sandbox().eval_text(script, &bindings)
    }

    /// 关闭会话并清空变量存储
    pub fn close(self) {
        info!(
            source_id = %self.source.id,
            session_id = %self.variables.session_id(),
            "Scrape session closed"
        );
    }

    fn context(&self, page_url: &str) -> ExecutionContext {
        let base_url = if page_url.trim().is_empty() {
            self.source.base_url.as_str()
        } else {
            page_url
        };
        ExecutionContext::new(base_url, self.variables.clone())
    }

    /// 判定文档类型；配置了登录检测脚本时先让脚本处理原始响应
    fn prepare(&self, raw: &str, context: &ExecutionContext) -> Document {
        let Some(script) = self
            .source
            .login_check_script
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            return Document::detect(raw);
        };

        let bindings = ScriptBindings::from_context(context, &self.source)
            .with_result(Value::String(raw.to_string()))
            .with_src(raw);
        match self.service.sandbox().run(script, &bindings) {
            Ok(outcome) => outcome.into_document(),
            Err(e) => {
                warn!(source_id = %self.source.id, error = %e, "Login check script failed, using raw response");
                Document::detect(raw)
            }
        }
    }

    fn list_group<'a>(
        &self,
        group: Option<&'a ListRuleGroup>,
        name: &'static str,
    ) -> Result<&'a ListRuleGroup, ConfigurationError> {
        let group = group.ok_or_else(|| self.missing_group(name))?;
        if group.list.trim().is_empty() {
            return Err(self.missing_rule(name, "list"));
        }
        Ok(group)
    }

    fn missing_group(&self, group: &'static str) -> ConfigurationError {
        let error = ConfigurationError::MissingRuleGroup {
            source_id: self.source.id.clone(),
            group,
        };
        warn!(error = %error, "Source configuration incomplete");
        error
    }

    fn missing_rule(&self, group: &'static str, rule: &'static str) -> ConfigurationError {
        let error = ConfigurationError::MissingRule {
            source_id: self.source.id.clone(),
            group,
            rule,
        };
        warn!(error = %error, "Source configuration incomplete");
        error
    }
}

impl Drop for ScrapeSession {
    fn drop(&mut self) {
        self.variables.clear();
        debug!(session_id = %self.variables.session_id(), "Session variables cleared");
    }
}

/// 补全相对地址，保留 `,{...}` 请求选项
fn absolutize(base_url: &str, resolved: &str) -> String {
    let (address, options) = match resolved.find(",{") {
        Some(pos) => resolved.split_at(pos),
        None => (resolved, ""),
    };
    if address.starts_with("http") || address.is_empty() {
        return resolved.to_string();
    }
    match Url::parse(base_url).and_then(|base| resolve_url(&base, address)) {
        Ok(url) => format!("{}{}", url, options),
        Err(e) => {
            debug!(url = address, error = %e, "Could not absolutize url");
            resolved.to_string()
        }
    }
}
