// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供领域层抽象接口的具体实现：
/// - 严格 JSONPath 查询器（jsonpath）：`@json:` 规则的默认实现
/// - 仓库实现（repositories）：内存凭据仓库
///
/// 基础设施层遵循依赖倒置原则，依赖于领域层的抽象接口。
pub mod jsonpath;
pub mod repositories;
