// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含规则引擎的核心逻辑，包括：
/// - 领域模型（models）：书源、文档、上下文和提取结果
/// - 仓库接口（repositories）：外部凭据存储的抽象接口
/// - 规则语法（rules）：选择器、点路径和模板
/// - 服务（services）：提取编排与会话
///
/// 领域层不依赖任何具体的网络或存储实现。
pub mod models;
pub mod repositories;
pub mod rules;
pub mod services;
