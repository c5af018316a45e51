// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 凭据仓库接口
///
/// 按书源和URL提供 Cookie，供脚本的 `getCookie` 调用。
/// 脚本在独立线程上同步执行，因此接口是同步的。
pub trait CredentialRepository: Send + Sync {
    /// 获取指定书源在某个URL下的 Cookie 字符串
    ///
    /// # 参数
    ///
    /// * `source_id` - 书源标识
    /// * `url` - 请求地址，按主机名匹配
    ///
    /// # 返回值
    ///
    /// Cookie 字符串，没有时返回空字符串
    fn fetch_cookie(&self, source_id: &str, url: &str) -> String;

    /// 保存 Cookie
    fn store_cookie(&self, source_id: &str, url: &str, cookie: &str);
}
