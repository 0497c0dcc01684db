// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// - 内容生成（generate_content）：凭证选择、熔断与重试组合调用下游生成服务
pub mod generate_content;
