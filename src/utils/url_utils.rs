// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 需要做URL补全的属性名
const URL_ATTRIBUTES: [&str; 3] = ["href", "src", "url"];

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 判断属性是否需要做URL补全
pub fn is_url_attribute(attribute: &str) -> bool {
    URL_ATTRIBUTES
        .iter()
        .any(|a| a.eq_ignore_ascii_case(attribute))
}

/// 按属性规则补全URL
///
/// 只处理 `href`/`src`/`url` 属性，且原值不以 `http`、`data:`、`//` 开头时才解析；
/// 基础URL无效或解析失败时原样返回
pub fn normalize_attribute_url(attribute: &str, raw: &str, base_url: &str) -> String {
    if !is_url_attribute(attribute) {
        return raw.to_string();
    }
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.starts_with("http")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("//")
    {
        return raw.to_string();
    }

    match Url::parse(base_url).and_then(|base| resolve_url(&base, trimmed)) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_relative_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "/c").unwrap().as_str(),
            "http://example.com/c"
        );
    }

    #[test]
    fn test_resolve_relative_url() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        assert_eq!(
            resolve_url(&base, "c").unwrap().as_str(),
            "http://example.com/a/c"
        );
    }

    #[test]
    fn test_normalize_relative_href() {
        assert_eq!(
            normalize_attribute_url("href", "/x", "https://example.com"),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_normalize_keeps_absolute_and_special_values() {
        let base = "https://example.com/books/";
        assert_eq!(
            normalize_attribute_url("src", "https://cdn.example.com/a.jpg", base),
            "https://cdn.example.com/a.jpg"
        );
        assert_eq!(
            normalize_attribute_url("src", "data:image/png;base64,AAAA", base),
            "data:image/png;base64,AAAA"
        );
        assert_eq!(
            normalize_attribute_url("href", "//cdn.example.com/a", base),
            "//cdn.example.com/a"
        );
    }

    #[test]
    fn test_normalize_ignores_other_attributes() {
        assert_eq!(
            normalize_attribute_url("title", "/x", "https://example.com"),
            "/x"
        );
        assert_eq!(
            normalize_attribute_url("data-src", "/x", "https://example.com"),
            "/x"
        );
    }

    #[test]
    fn test_normalize_with_invalid_base() {
        assert_eq!(normalize_attribute_url("href", "/x", "not a url"), "/x");
    }
}
