// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::credential::{Credential, CredentialStatus};
use crate::domain::repositories::credential_repository::CredentialRepository;
use crate::domain::repositories::RepositoryError;
use chrono::Utc;
use metrics::counter;
use sea_orm::SqlErr;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

/// 凭证池错误类型
#[derive(Error, Debug)]
pub enum CredentialPoolError {
    /// 密钥已存在
    #[error("A credential with this secret already exists")]
    DuplicateSecret,
    /// 配额数值非法
    #[error("Invalid quota value: {0}")]
    InvalidQuota(i64),
    /// 凭证不存在
    #[error("Credential not found: {0}")]
    NotFound(Uuid),
    /// 存储错误，原样向上传递
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CredentialPoolError {
    fn for_credential(id: Uuid) -> impl FnOnce(RepositoryError) -> CredentialPoolError {
        move |e| match e {
            RepositoryError::NotFound => CredentialPoolError::NotFound(id),
            other => CredentialPoolError::Repository(other),
        }
    }
}

/// 凭证池服务
///
/// 管理凭证的生命周期，并在可用凭证中按最近最少使用的顺序轮换。
/// 本服务内部不做重试，存储错误直接返回给调用方。
pub struct CredentialPoolService {
    repo: Arc<dyn CredentialRepository>,
    /// 同一时间戳并列时的辅助轮换下标，只在内存中，重启后归零
    rotation: AtomicUsize,
    span: Span,
}

impl CredentialPoolService {
    /// 创建新的凭证池服务实例
    ///
    /// # 参数
    ///
    /// * `repo` - 凭证仓库
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self {
            repo,
            rotation: AtomicUsize::new(0),
            span: tracing::info_span!("credential_pool"),
        }
    }

    /// 指定本服务日志所属的 span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    async fn traced<T, F>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        fut.instrument(self.span.clone()).await
    }

    /// 添加新凭证
    ///
    /// # 参数
    ///
    /// * `secret` - 凭证密钥，必须唯一
    /// * `initial_quota` - 初始配额，为 0 时凭证直接处于耗尽状态
    ///
    /// # 返回值
    ///
    /// * `Ok(Credential)` - 新建的凭证
    /// * `Err(CredentialPoolError::DuplicateSecret)` - 密钥已存在
    /// * `Err(CredentialPoolError::InvalidQuota)` - 初始配额为负数
    pub async fn add(
        &self,
        secret: &str,
        initial_quota: i64,
    ) -> Result<Credential, CredentialPoolError> {
        self.traced(async {
            if initial_quota < 0 {
                return Err(CredentialPoolError::InvalidQuota(initial_quota));
            }
            if self.repo.find_by_secret(secret).await?.is_some() {
                return Err(CredentialPoolError::DuplicateSecret);
            }

            let credential = Credential::new(secret, initial_quota);
            let created = self.repo.create(&credential).await.map_err(|e| match e {
                RepositoryError::Database(ref db_err)
                    if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    CredentialPoolError::DuplicateSecret
                }
                other => CredentialPoolError::Repository(other),
            })?;

            info!(
                credential_id = %created.id,
                secret = %created.masked_secret(),
                quota = created.quota_remaining,
                status = %created.status,
                "Credential added"
            );
            Ok(created)
        })
        .await
    }

    /// 选出下一个可用凭证并记录使用时间
    ///
    /// 按 last_used_at 升序（从未使用的在前）选择；时间戳并列时
    /// 使用内部轮换下标在并列者之间轮流。
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(Credential))` - 被选中的凭证，last_used_at 已更新
    /// * `Ok(None)` - 没有可用凭证
    pub async fn select_next(&self) -> Result<Option<Credential>, CredentialPoolError> {
        self.traced(async {
            let candidates: Vec<Credential> = self
                .repo
                .find_available()
                .await?
                .into_iter()
                .filter(Credential::is_available)
                .collect();
            let Some(first) = candidates.first() else {
                counter!("credential_pool_empty_total").increment(1);
                warn!("No available credential in pool");
                return Ok(None);
            };

            let tied = candidates
                .iter()
                .take_while(|c| c.last_used_at == first.last_used_at)
                .count();
            let index = self.rotation.fetch_add(1, Ordering::Relaxed) % tied;
            let mut chosen = candidates[index].clone();

            let now = Utc::now();
            self.repo
                .touch(chosen.id, now)
                .await
                .map_err(CredentialPoolError::for_credential(chosen.id))?;
            chosen.last_used_at = Some(now.fixed_offset());

            counter!("credential_selections_total").increment(1);
            debug!(
                credential_id = %chosen.id,
                quota = chosen.quota_remaining,
                candidates = candidates.len(),
                "Credential selected"
            );
            Ok(Some(chosen))
        })
        .await
    }

    /// 覆盖写入剩余配额
    ///
    /// 结果 `<= 0` 时配额存为 0 并在同一次写入中切换为耗尽状态；
    /// 结果 `> 0` 时状态保持不变。
    pub async fn update_quota(
        &self,
        id: Uuid,
        new_remaining: i64,
    ) -> Result<Credential, CredentialPoolError> {
        self.traced(async {
            let updated = self
                .repo
                .write_quota(id, new_remaining)
                .await
                .map_err(CredentialPoolError::for_credential(id))?;

            if new_remaining <= 0 {
                info!(credential_id = %id, "Credential quota exhausted");
            } else {
                debug!(credential_id = %id, quota = updated.quota_remaining, "Credential quota updated");
            }
            Ok(updated)
        })
        .await
    }

    /// 扣减配额
    ///
    /// 读取当前配额后写回差值，与 [`update_quota`](Self::update_quota) 走同一条截断路径
    pub async fn consume(&self, id: Uuid, amount: i64) -> Result<Credential, CredentialPoolError> {
        if amount < 0 {
            return Err(CredentialPoolError::InvalidQuota(amount));
        }
        let current = self
            .get(id)
            .await?
            .ok_or(CredentialPoolError::NotFound(id))?;
        self.update_quota(id, current.quota_remaining.saturating_sub(amount))
            .await
    }

    /// 标记为耗尽，同时清零配额
    pub async fn mark_exhausted(&self, id: Uuid) -> Result<Credential, CredentialPoolError> {
        self.traced(async {
            let updated = self
                .repo
                .write_state(id, CredentialStatus::Exhausted, 0)
                .await
                .map_err(CredentialPoolError::for_credential(id))?;
            info!(credential_id = %id, "Credential marked exhausted");
            Ok(updated)
        })
        .await
    }

    /// 标记为出错
    ///
    /// 配额已为 0 的凭证保持耗尽状态
    pub async fn mark_error(&self, id: Uuid) -> Result<Credential, CredentialPoolError> {
        self.traced(async {
            let updated = self
                .repo
                .write_error(id)
                .await
                .map_err(CredentialPoolError::for_credential(id))?;
            warn!(credential_id = %id, status = %updated.status, "Credential marked as error");
            Ok(updated)
        })
        .await
    }

    /// 重新设置配额
    ///
    /// `new_quota > 0` 时恢复为可用，否则为耗尽
    pub async fn refresh(&self, id: Uuid, new_quota: i64) -> Result<Credential, CredentialPoolError> {
        self.traced(async {
            let updated = self
                .repo
                .write_state(id, CredentialStatus::Active, new_quota)
                .await
                .map_err(CredentialPoolError::for_credential(id))?;
            info!(
                credential_id = %id,
                quota = updated.quota_remaining,
                status = %updated.status,
                "Credential refreshed"
            );
            Ok(updated)
        })
        .await
    }

    /// 是否至少有一个可用凭证
    pub async fn has_active(&self) -> Result<bool, CredentialPoolError> {
        Ok(self.repo.count_available().await? > 0)
    }

    /// 根据ID获取凭证
    pub async fn get(&self, id: Uuid) -> Result<Option<Credential>, CredentialPoolError> {
        Ok(self.repo.find_by_id(id).await?)
    }

    /// 列出全部凭证，包括已耗尽和出错的
    pub async fn list(&self) -> Result<Vec<Credential>, CredentialPoolError> {
        Ok(self.repo.list().await?)
    }

    /// 删除凭证
    ///
    /// # 返回值
    ///
    /// 是否删除了记录
    pub async fn delete(&self, id: Uuid) -> Result<bool, CredentialPoolError> {
        self.traced(async {
            let deleted = self.repo.delete(id).await?;
            if deleted {
                info!(credential_id = %id, "Credential deleted");
            }
            Ok(deleted)
        })
        .await
    }
}

#[cfg(test)]
#[path = "credential_pool_service_test.rs"]
mod tests;
