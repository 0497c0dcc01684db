// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的持久化契约，具体实现位于基础设施层：
/// - 凭证仓库（credential_repository）：凭证生命周期与配额写入
/// - 工作模板仓库（work_template_repository）：可调度模板查询与使用时间戳
/// - 执行日志仓库（execution_log_repository）：只追加的执行日志
pub mod credential_repository;
pub mod execution_log_repository;
pub mod work_template_repository;

pub use crate::utils::errors::RepositoryError;
