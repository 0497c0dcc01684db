// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_context, seed_template};
use chrono::{Duration, Utc};
use genpilot::domain::repositories::work_template_repository::WorkTemplateRepository;
use genpilot::domain::repositories::RepositoryError;
use uuid::Uuid;

/// 测试可调度模板的查询条件
///
/// 从未使用或上次使用早于截止时间的启用模板才可被调度
#[tokio::test]
async fn test_find_eligible_respects_window_and_active_flag() {
    let ctx = create_test_context().await;
    let fresh = seed_template(&ctx, "fresh").await;
    let stale = seed_template(&ctx, "stale").await;
    let recent = seed_template(&ctx, "recent").await;
    let disabled = seed_template(&ctx, "disabled").await;

    let now = Utc::now();
    ctx.templates
        .mark_used(stale.id, now - Duration::hours(30))
        .await
        .unwrap();
    ctx.templates
        .mark_used(recent.id, now - Duration::hours(1))
        .await
        .unwrap();
    ctx.templates.set_active(disabled.id, false).await.unwrap();

    let eligible = ctx
        .templates
        .find_eligible(now - Duration::hours(24))
        .await
        .unwrap();
    let mut ids: Vec<Uuid> = eligible.iter().map(|t| t.id).collect();
    ids.sort();
    let mut expected = vec![fresh.id, stale.id];
    expected.sort();
    assert_eq!(ids, expected);

    let active = ctx.templates.find_active().await.unwrap();
    assert_eq!(active.len(), 3);
    assert!(active.iter().all(|t| t.id != disabled.id));
}

#[tokio::test]
async fn test_mark_used_persists_timestamp() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "daily").await;
    let at = Utc::now();

    ctx.templates.mark_used(template.id, at).await.unwrap();

    let stored = ctx.templates.find_by_id(template.id).await.unwrap().unwrap();
    let last_used = stored.last_used_at.unwrap();
    assert!((last_used.with_timezone(&Utc) - at).num_milliseconds().abs() < 1000);
    assert_eq!(stored.payload, serde_json::json!({ "topic": "daily" }));
}

#[tokio::test]
async fn test_updates_on_unknown_template_are_not_found() {
    let ctx = create_test_context().await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        ctx.templates.mark_used(missing, Utc::now()).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(matches!(
        ctx.templates.set_active(missing, false).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(ctx.templates.find_by_id(missing).await.unwrap().is_none());
}
