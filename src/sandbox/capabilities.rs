// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::variables::SessionVariableStore;
use crate::domain::repositories::credential_repository::CredentialRepository;
use crate::engines::traits::{FetchRequest, FetchResponse, DEFAULT_REQUEST_TIMEOUT};
use crate::infrastructure::repositories::credential_repo_impl::InMemoryCredentialRepository;
use crate::sandbox::network_bridge::{NetworkBridge, OfflineBridge};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 脚本中 `java` 对象暴露的全部函数
///
/// 脚本能做的事情只限于这张表
pub const CAPABILITY_FUNCTIONS: [&str; 21] = [
    "get",
    "put",
    "ajax",
    "post",
    "connect",
    "getCookie",
    "base64Encode",
    "base64Decode",
    "hexEncode",
    "hexDecode",
    "md5Encode",
    "md5Encode16",
    "aesEncode",
    "aesDecode",
    "encodeURI",
    "setContent",
    "evalPermissive",
    "timeFormat",
    "log",
    "toast",
    "longToast",
];

/// 注入脚本沙箱的能力集合
///
/// 会话变量、网络、Cookie 都通过这里访问，不存在其他全局状态
#[derive(Clone)]
pub struct ScriptCapabilities {
    /// 书源标识，用于 Cookie 查找
    pub source_id: String,
    /// 会话变量存储
    pub variables: SessionVariableStore,
    /// 网络桥
    pub network: Arc<dyn NetworkBridge>,
    /// 凭据仓库
    pub credentials: Arc<dyn CredentialRepository>,
    /// 网络请求的默认请求头
    pub default_headers: HashMap<String, String>,
    /// 单次网络请求超时
    pub request_timeout: Duration,
}

impl fmt::Debug for ScriptCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCapabilities")
            .field("source_id", &self.source_id)
            .field("session_id", &self.variables.session_id())
            .field("default_headers", &self.default_headers)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ScriptCapabilities {
    /// 创建能力集合
    pub fn new(
        source_id: impl Into<String>,
        variables: SessionVariableStore,
        network: Arc<dyn NetworkBridge>,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            variables,
            network,
            credentials,
            default_headers: HashMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// 离线能力集合：网络请求总是返回空响应，Cookie 存在内存中
    pub fn offline(source_id: impl Into<String>, variables: SessionVariableStore) -> Self {
        Self::new(
            source_id,
            variables,
            Arc::new(OfflineBridge),
            Arc::new(InMemoryCredentialRepository::new()),
        )
    }

    /// 设置默认请求头
    pub fn with_default_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    /// 设置单次网络请求超时
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 读取会话变量，不存在时为空字符串
    pub fn get_variable(&self, key: &str) -> String {
        self.variables.get(key).unwrap_or_default()
    }

    /// 写入会话变量
    pub fn put_variable(&self, key: &str, value: &str) {
        self.variables.put(key, value);
    }

    /// 发送网络请求，请求自身的请求头优先于默认请求头，超时取配置值
    pub fn fetch(&self, mut request: FetchRequest) -> FetchResponse {
        request.timeout = self.request_timeout;
        for (name, value) in &self.default_headers {
            let present = request
                .headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case(name));
            if !present {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("cookie")) {
            let cookie = self.cookie(&request.url);
            if !cookie.is_empty() {
                request.headers.insert("Cookie".to_string(), cookie);
            }
        }
        self.network.execute(request)
    }

    /// 查找 Cookie
    pub fn cookie(&self, url: &str) -> String {
        self.credentials.fetch_cookie(&self.source_id, url)
    }
}

/// `url,{...}` 写法中的请求选项
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequestOptions {
    method: Option<String>,
    body: Option<Value>,
    headers: Option<HashMap<String, Value>>,
}

fn json_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// 解析请求描述
///
/// 支持纯URL，以及 `url,{"method":"POST","body":...,"headers":{...}}` 形式；
/// 选项解析失败时整体按URL处理
pub fn parse_request_spec(spec: &str) -> FetchRequest {
    let spec = spec.trim();
    if let Some(pos) = spec.find(",{") {
        let (url, options) = (spec[..pos].trim(), &spec[pos + 1..]);
        if let Ok(options) = serde_json::from_str::<RequestOptions>(options) {
            let mut request = FetchRequest::get(url);
            if let Some(method) = options.method {
                request.method = method.to_ascii_uppercase();
            }
            request.body = options.body.map(json_to_text);
            for (name, value) in options.headers.unwrap_or_default() {
                request.headers.insert(name, json_to_text(value));
            }
            return request;
        }
    }
    FetchRequest::get(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingBridge {
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl NetworkBridge for RecordingBridge {
        fn execute(&self, request: FetchRequest) -> FetchResponse {
            self.requests.lock().push(request);
            FetchResponse {
                status_code: 200,
                body: "ok".to_string(),
                ..FetchResponse::default()
            }
        }
    }

    #[test]
    fn test_fetch_merges_default_headers_and_cookie() {
        let bridge = Arc::new(RecordingBridge::default());
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        credentials.store_cookie("s1", "https://example.com", "sid=7");

        let mut defaults = HashMap::new();
        defaults.insert("Referer".to_string(), "https://example.com".to_string());
        defaults.insert("User-Agent".to_string(), "default".to_string());

        let caps = ScriptCapabilities::new(
            "s1",
            SessionVariableStore::new(),
            bridge.clone(),
            credentials,
        )
        .with_default_headers(defaults);

        let mut request = FetchRequest::get("https://example.com/api");
        request
            .headers
            .insert("user-agent".to_string(), "custom".to_string());
        let response = caps.fetch(request);
        assert_eq!(response.body, "ok");

        let sent = bridge.requests.lock();
        let headers = &sent[0].headers;
        assert_eq!(headers.get("Referer").map(String::as_str), Some("https://example.com"));
        assert_eq!(headers.get("user-agent").map(String::as_str), Some("custom"));
        assert!(!headers.contains_key("User-Agent"));
        assert_eq!(headers.get("Cookie").map(String::as_str), Some("sid=7"));
    }

    #[test]
    fn test_variables_go_through_session_store() {
        let store = SessionVariableStore::new();
        let caps = ScriptCapabilities::offline("s1", store.clone());
        caps.put_variable("token", "abc");
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        assert_eq!(caps.get_variable("missing"), "");
    }

    #[test]
    fn test_parse_request_spec() {
        let plain = parse_request_spec("https://example.com/s?q=1");
        assert_eq!(plain.method, "GET");
        assert_eq!(plain.url, "https://example.com/s?q=1");

        let post = parse_request_spec(
            r#"https://example.com/s,{"method":"post","body":"q=1","headers":{"X-Token":"t"}}"#,
        );
        assert_eq!(post.url, "https://example.com/s");
        assert_eq!(post.method, "POST");
        assert_eq!(post.body.as_deref(), Some("q=1"));
        assert_eq!(post.headers.get("X-Token").map(String::as_str), Some("t"));

        let broken = parse_request_spec("https://example.com/a,{oops");
        assert_eq!(broken.url, "https://example.com/a,{oops");
    }

    #[test]
    fn test_capability_table_is_enumerable() {
        assert!(CAPABILITY_FUNCTIONS.contains(&"ajax"));
        assert!(CAPABILITY_FUNCTIONS.contains(&"setContent"));
        let mut names = CAPABILITY_FUNCTIONS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CAPABILITY_FUNCTIONS.len());
    }
}
