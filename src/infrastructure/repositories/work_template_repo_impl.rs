// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::work_template::WorkTemplate;
use crate::domain::repositories::work_template_repository::WorkTemplateRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::work_template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作模板仓库实现
#[derive(Clone)]
pub struct WorkTemplateRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WorkTemplateRepositoryImpl {
    /// 创建新的工作模板仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn update_column(
        &self,
        id: Uuid,
        column: work_template::Column,
        value: SimpleExpr,
    ) -> Result<(), RepositoryError> {
        let result = work_template::Entity::update_many()
            .col_expr(column, value)
            .filter(work_template::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl From<work_template::Model> for WorkTemplate {
    fn from(model: work_template::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            payload: model.payload,
            is_active: model.is_active,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl WorkTemplateRepository for WorkTemplateRepositoryImpl {
    async fn create(&self, template: &WorkTemplate) -> Result<WorkTemplate, RepositoryError> {
        let model = work_template::ActiveModel {
            id: Set(template.id),
            name: Set(template.name.clone()),
            payload: Set(template.payload.clone()),
            is_active: Set(template.is_active),
            last_used_at: Set(template.last_used_at),
            created_at: Set(template.created_at),
        };

        let saved = model.insert(self.db.as_ref()).await?;
        Ok(saved.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkTemplate>, RepositoryError> {
        let model = work_template::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_eligible(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkTemplate>, RepositoryError> {
        let models = work_template::Entity::find()
            .filter(work_template::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(work_template::Column::LastUsedAt.is_null())
                    .add(work_template::Column::LastUsedAt.lt(cutoff.fixed_offset())),
            )
            .order_by_asc(work_template::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_active(&self) -> Result<Vec<WorkTemplate>, RepositoryError> {
        let models = work_template::Entity::find()
            .filter(work_template::Column::IsActive.eq(true))
            .order_by_asc(work_template::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<(), RepositoryError> {
        self.update_column(id, work_template::Column::IsActive, Expr::value(is_active))
            .await
    }

    async fn mark_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.update_column(
            id,
            work_template::Column::LastUsedAt,
            Expr::value(at.fixed_offset()),
        )
        .await
    }
}
