// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::credential::{Credential, CredentialStatus};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 凭证仓库特质
///
/// 所有配额写入都必须遵守 [`normalize_quota`](crate::domain::models::credential::normalize_quota)，
/// 并以单条语句完成，调用方不会观察到负配额或"启用且配额为 0"的中间状态。
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// 插入新凭证
    async fn create(&self, credential: &Credential) -> Result<Credential, RepositoryError>;
    /// 根据ID查找凭证
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Credential>, RepositoryError>;
    /// 根据密钥查找凭证
    async fn find_by_secret(&self, secret: &str) -> Result<Option<Credential>, RepositoryError>;
    /// 列出全部凭证（包含已耗尽与出错的）
    async fn list(&self) -> Result<Vec<Credential>, RepositoryError>;
    /// 可用凭证，按 last_used_at 升序（空值在前）、created_at 升序
    async fn find_available(&self) -> Result<Vec<Credential>, RepositoryError>;
    /// 可用凭证数量
    async fn count_available(&self) -> Result<u64, RepositoryError>;
    /// 覆盖写入剩余配额
    async fn write_quota(&self, id: Uuid, remaining: i64) -> Result<Credential, RepositoryError>;
    /// 同时写入状态与配额
    async fn write_state(
        &self,
        id: Uuid,
        status: CredentialStatus,
        quota_remaining: i64,
    ) -> Result<Credential, RepositoryError>;
    /// 标记为出错；配额为 0 的记录保持耗尽状态
    async fn write_error(&self, id: Uuid) -> Result<Credential, RepositoryError>;
    /// 记录被选中的时间
    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;
    /// 删除凭证，返回是否删除了记录
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
