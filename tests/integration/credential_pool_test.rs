// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_context;
use genpilot::domain::models::credential::CredentialStatus;
use genpilot::domain::services::credential_pool_service::CredentialPoolService;
use genpilot::infrastructure::repositories::credential_repo_impl::CredentialRepositoryImpl;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 测试最久未使用的凭证优先被选中
///
/// 两个凭证交替被选中，且返回的凭证已记录使用时间
#[tokio::test]
async fn test_least_recently_used_credential_is_selected_first() {
    let ctx = create_test_context().await;
    let a = ctx.pool.add("sk-lru-aaaa", 10).await.unwrap();
    let b = ctx.pool.add("sk-lru-bbbb", 10).await.unwrap();

    let first = ctx.pool.select_next().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = ctx.pool.select_next().await.unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert!([a.id, b.id].contains(&first.id));
    assert!([a.id, b.id].contains(&second.id));

    let third = ctx.pool.select_next().await.unwrap().unwrap();
    assert_eq!(third.id, first.id);

    let stored = ctx.pool.get(first.id).await.unwrap().unwrap();
    assert!(stored.last_used_at.is_some());
}

/// 测试出错的凭证在刷新前不会被选中
#[tokio::test]
async fn test_errored_credential_returns_after_refresh() {
    let ctx = create_test_context().await;
    let credential = ctx.pool.add("sk-flaky-0001", 10).await.unwrap();

    ctx.pool.mark_error(credential.id).await.unwrap();
    assert!(!ctx.pool.has_active().await.unwrap());
    assert!(ctx.pool.select_next().await.unwrap().is_none());

    let refreshed = ctx.pool.refresh(credential.id, 3).await.unwrap();
    assert_eq!(refreshed.status, CredentialStatus::Active);
    assert_eq!(
        ctx.pool.select_next().await.unwrap().unwrap().id,
        credential.id
    );
}

/// 测试状态在不同的服务实例之间共享
///
/// 轮转索引只是提示，真正的状态保存在数据库中
#[tokio::test]
async fn test_state_is_shared_through_storage() {
    let ctx = create_test_context().await;
    let other = CredentialPoolService::new(Arc::new(CredentialRepositoryImpl::new(
        ctx.db.clone(),
    )));

    let credential = ctx.pool.add("sk-shared-0001", 5).await.unwrap();
    other.update_quota(credential.id, 0).await.unwrap();

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Exhausted);
    assert_eq!(stored.quota_remaining, 0);
    assert!(!ctx.pool.has_active().await.unwrap());
}

/// 测试审计列表包含所有状态的凭证且不泄露密钥
#[tokio::test]
async fn test_list_includes_every_status_with_masked_secrets() {
    let ctx = create_test_context().await;
    let active = ctx.pool.add("sk-audit-1111", 5).await.unwrap();
    let exhausted = ctx.pool.add("sk-audit-2222", 0).await.unwrap();
    let errored = ctx.pool.add("sk-audit-3333", 5).await.unwrap();
    ctx.pool.mark_error(errored.id).await.unwrap();

    let listed = ctx.pool.list().await.unwrap();
    assert_eq!(listed.len(), 3);

    let status_of = |id: Uuid| listed.iter().find(|c| c.id == id).unwrap().status;
    assert_eq!(status_of(active.id), CredentialStatus::Active);
    assert_eq!(status_of(exhausted.id), CredentialStatus::Exhausted);
    assert_eq!(status_of(errored.id), CredentialStatus::Error);

    let debug = format!("{:?}", listed);
    assert!(!debug.contains("sk-audit-1111"));
    assert!(debug.contains("1111"));
}
