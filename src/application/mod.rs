// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 面向异步调用方的用例封装，规则求值本身保持同步
pub mod use_cases;
