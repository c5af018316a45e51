// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义规则引擎依赖的外部存储抽象，具体实现由基础设施层提供：
/// - 凭据仓库（credential_repository）：按书源和主机提供 Cookie
pub mod credential_repository;
