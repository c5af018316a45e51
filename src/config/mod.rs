// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理规则引擎的配置设置，包括脚本沙箱、网络桥、规则提取和日志等配置
pub mod settings;
