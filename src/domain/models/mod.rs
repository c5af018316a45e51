// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了规则引擎的核心数据结构，包括：
/// - 书源（source）：站点配置与规则组
/// - 文档（document）：待提取的HTML或JSON文档
/// - 会话变量（variables）：同一会话内共享的键值存储
/// - 执行上下文（context）：单次提取调用的输入
/// - 提取记录（record）：列表提取的输出
pub mod context;
pub mod document;
pub mod record;
pub mod source;
pub mod variables;
