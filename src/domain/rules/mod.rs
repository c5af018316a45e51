// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 规则语法模块
///
/// 规则是一段描述如何从文档中取值的字符串，该模块负责：
/// - 词法切分（grammar）：`||`、`&&`、`@`、脚本片段和占位符
/// - 选择器简写（selector）：编译并在HTML上求值
/// - 点路径（json_path）：在JSON上取值
/// - 严格查询（strict_json）：`@json:` 规则的外部查询接口
/// - 模板（template）：`{{...}}` 占位符替换
pub mod grammar;
pub mod json_path;
pub mod selector;
pub mod strict_json;
pub mod template;
