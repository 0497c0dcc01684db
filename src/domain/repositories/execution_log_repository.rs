// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::execution_log::ExecutionLogEntry;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;

/// 执行日志仓库特质（只追加）
#[async_trait]
pub trait ExecutionLogRepository: Send + Sync {
    /// 追加一条日志
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), RepositoryError>;
    /// 指定服务最近的日志，按创建时间倒序
    async fn find_recent(
        &self,
        service: &str,
        limit: u64,
    ) -> Result<Vec<ExecutionLogEntry>, RepositoryError>;
}
