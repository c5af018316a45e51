// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 提取服务（extraction_service）：字段与列表提取的编排
/// - 会话（session）：按书源规则组执行搜索、详情、目录、正文解析
pub mod extraction_service;
pub mod session;
