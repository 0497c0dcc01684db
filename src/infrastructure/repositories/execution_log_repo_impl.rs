// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::execution_log::{ExecutionContext, ExecutionLogEntry, LogLevel};
use crate::domain::repositories::execution_log_repository::ExecutionLogRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::execution_log;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;

/// 执行日志仓库实现
///
/// 只提供追加与按服务查询，不支持修改或删除
#[derive(Clone)]
pub struct ExecutionLogRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl ExecutionLogRepositoryImpl {
    /// 创建新的执行日志仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<execution_log::Model> for ExecutionLogEntry {
    type Error = RepositoryError;

    fn try_from(model: execution_log::Model) -> Result<Self, Self::Error> {
        let level = model.level.parse::<LogLevel>().map_err(|_| {
            RepositoryError::Corrupted(format!(
                "execution log {} has unknown level '{}'",
                model.id, model.level
            ))
        })?;
        let context: ExecutionContext = serde_json::from_value(model.context).map_err(|e| {
            RepositoryError::Corrupted(format!("execution log {} context: {}", model.id, e))
        })?;

        Ok(Self {
            id: model.id,
            level,
            service: model.service,
            message: model.message,
            context,
            created_at: model.created_at,
        })
    }
}

#[async_trait]
impl ExecutionLogRepository for ExecutionLogRepositoryImpl {
    async fn append(&self, entry: &ExecutionLogEntry) -> Result<(), RepositoryError> {
        let context = serde_json::to_value(&entry.context)
            .map_err(|e| RepositoryError::Corrupted(format!("context serialization: {}", e)))?;

        let model = execution_log::ActiveModel {
            id: Set(entry.id),
            level: Set(entry.level.to_string()),
            service: Set(entry.service.clone()),
            message: Set(entry.message.clone()),
            context: Set(context),
            created_at: Set(entry.created_at),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find_recent(
        &self,
        service: &str,
        limit: u64,
    ) -> Result<Vec<ExecutionLogEntry>, RepositoryError> {
        let models = execution_log::Entity::find()
            .filter(execution_log::Column::Service.eq(service))
            .order_by_desc(execution_log::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(ExecutionLogEntry::try_from).collect()
    }
}
