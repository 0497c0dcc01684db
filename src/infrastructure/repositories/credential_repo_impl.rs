// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::credential::{normalize_quota, Credential, CredentialStatus};
use crate::domain::repositories::credential_repository::CredentialRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::credential;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, NullOrdering},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 凭证仓库实现
///
/// 基于SeaORM实现的凭证数据访问层。配额相关写入均为单条 UPDATE，
/// 状态修正在同一条语句中完成。
#[derive(Clone)]
pub struct CredentialRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl CredentialRepositoryImpl {
    /// 创建新的凭证仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 读取刚写入的记录；更新未命中任何行时返回 `NotFound`
    async fn reload(&self, id: Uuid, rows_affected: u64) -> Result<Credential, RepositoryError> {
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}

impl TryFrom<credential::Model> for Credential {
    type Error = RepositoryError;

    fn try_from(model: credential::Model) -> Result<Self, Self::Error> {
        let status = model.status.parse::<CredentialStatus>().map_err(|_| {
            RepositoryError::Corrupted(format!(
                "credential {} has unknown status '{}'",
                model.id, model.status
            ))
        })?;

        Ok(Self {
            id: model.id,
            secret: model.secret,
            status,
            quota_remaining: model.quota_remaining,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        })
    }
}

fn into_domain(models: Vec<credential::Model>) -> Result<Vec<Credential>, RepositoryError> {
    models.into_iter().map(Credential::try_from).collect()
}

#[async_trait]
impl CredentialRepository for CredentialRepositoryImpl {
    async fn create(&self, credential: &Credential) -> Result<Credential, RepositoryError> {
        let (quota, forced) = normalize_quota(credential.quota_remaining);
        let status = forced.unwrap_or(credential.status);

        let model = credential::ActiveModel {
            id: Set(credential.id),
            secret: Set(credential.secret.clone()),
            status: Set(status.to_string()),
            quota_remaining: Set(quota),
            last_used_at: Set(credential.last_used_at),
            created_at: Set(credential.created_at),
        };

        let saved = model.insert(self.db.as_ref()).await?;
        Credential::try_from(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, RepositoryError> {
        credential::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(Credential::try_from)
            .transpose()
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Credential>, RepositoryError> {
        credential::Entity::find()
            .filter(credential::Column::Secret.eq(secret))
            .one(self.db.as_ref())
            .await?
            .map(Credential::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Credential>, RepositoryError> {
        let models = credential::Entity::find()
            .order_by_asc(credential::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        into_domain(models)
    }

    async fn find_available(&self) -> Result<Vec<Credential>, RepositoryError> {
        let models = credential::Entity::find()
            .filter(credential::Column::Status.eq(CredentialStatus::Active.to_string()))
            .filter(credential::Column::QuotaRemaining.gt(0))
            .order_by_with_nulls(
                credential::Column::LastUsedAt,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(credential::Column::CreatedAt)
            .order_by_asc(credential::Column::Id)
            .all(self.db.as_ref())
            .await?;
        into_domain(models)
    }

    async fn count_available(&self) -> Result<u64, RepositoryError> {
        let count = credential::Entity::find()
            .filter(credential::Column::Status.eq(CredentialStatus::Active.to_string()))
            .filter(credential::Column::QuotaRemaining.gt(0))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn write_quota(&self, id: Uuid, remaining: i64) -> Result<Credential, RepositoryError> {
        let (quota, forced) = normalize_quota(remaining);

        let mut update = credential::Entity::update_many()
            .col_expr(credential::Column::QuotaRemaining, Expr::value(quota))
            .filter(credential::Column::Id.eq(id));
        if let Some(status) = forced {
            update = update.col_expr(credential::Column::Status, Expr::value(status.to_string()));
        }

        let result = update.exec(self.db.as_ref()).await?;
        self.reload(id, result.rows_affected).await
    }

    async fn write_state(
        &self,
        id: Uuid,
        status: CredentialStatus,
        quota_remaining: i64,
    ) -> Result<Credential, RepositoryError> {
        let (quota, forced) = normalize_quota(quota_remaining);
        let status = forced.unwrap_or(status);

        let result = credential::Entity::update_many()
            .col_expr(credential::Column::Status, Expr::value(status.to_string()))
            .col_expr(credential::Column::QuotaRemaining, Expr::value(quota))
            .filter(credential::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        self.reload(id, result.rows_affected).await
    }

    async fn write_error(&self, id: Uuid) -> Result<Credential, RepositoryError> {
        // 配额为 0 的记录保持耗尽状态
        let status = Expr::case(
            credential::Column::QuotaRemaining.gt(0),
            Expr::val(CredentialStatus::Error.to_string()),
        )
        .finally(Expr::val(CredentialStatus::Exhausted.to_string()));

        let result = credential::Entity::update_many()
            .col_expr(credential::Column::Status, status.into())
            .filter(credential::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        self.reload(id, result.rows_affected).await
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = credential::Entity::update_many()
            .col_expr(credential::Column::LastUsedAt, Expr::value(at.fixed_offset()))
            .filter(credential::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = credential::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
