// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 凭证（credential）：带配额的下游访问密钥
/// - 工作模板（work_template）：调度器选择的工作单元描述
/// - 执行日志（execution_log）：调度器每次触发的只追加记录
pub mod credential;
pub mod execution_log;
pub mod work_template;
