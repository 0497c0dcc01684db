// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::work_template::WorkTemplate;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 工作模板仓库特质
#[async_trait]
pub trait WorkTemplateRepository: Send + Sync {
    /// 创建模板
    async fn create(&self, template: &WorkTemplate) -> Result<WorkTemplate, RepositoryError>;
    /// 根据ID查找模板
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkTemplate>, RepositoryError>;
    /// 启用且（从未使用或上次使用早于 `cutoff`）的模板
    async fn find_eligible(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkTemplate>, RepositoryError>;
    /// 所有启用的模板
    async fn find_active(&self) -> Result<Vec<WorkTemplate>, RepositoryError>;
    /// 启用或停用模板
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<(), RepositoryError>;
    /// 记录模板的使用时间
    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}
