// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 面向异步调用方的用例封装
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 书源模型、规则语法、提取编排与会话
pub mod domain;

/// 引擎模块
///
/// 供脚本网络桥使用的HTTP传输引擎
pub mod engines;

/// 基础设施模块
///
/// 凭据仓库和严格 JSONPath 查询器的默认实现
pub mod infrastructure;

/// 脚本沙箱模块
///
/// 隔离、限时的规则脚本执行环境
pub mod sandbox;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
