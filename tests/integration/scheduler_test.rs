// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_context, seed_template};
use async_trait::async_trait;
use genpilot::domain::models::execution_log::{ExecutionResult, SCHEDULER_SERVICE};
use genpilot::domain::repositories::execution_log_repository::ExecutionLogRepository;
use genpilot::domain::repositories::work_template_repository::WorkTemplateRepository;
use genpilot::workers::scheduler::SkipReason;
use genpilot::workers::{FiringOutcome, Scheduler, SchedulerConfig, UnitOfWork};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// 记录每次调用所用模板的工作单元
#[derive(Default)]
struct RecordingWork {
    seen: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl UnitOfWork for RecordingWork {
    async fn execute(&self, template_id: Uuid) -> anyhow::Result<()> {
        self.seen.lock().push(template_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// 测试调度器与数据库仓库协作
///
/// 两个模板在窗口内各被选中一次，之后退回到任意启用模板，
/// 每次触发都写入一条执行日志
#[tokio::test]
async fn test_scheduler_rotates_templates_and_persists_logs() {
    let ctx = create_test_context().await;
    let first = seed_template(&ctx, "first").await;
    let second = seed_template(&ctx, "second").await;
    let work = Arc::new(RecordingWork::default());

    let scheduler = Scheduler::new(
        ctx.templates.clone(),
        ctx.logs.clone(),
        work.clone(),
        SchedulerConfig::default(),
    );

    for _ in 0..3 {
        assert!(matches!(
            scheduler.trigger().await,
            FiringOutcome::Success { .. }
        ));
    }

    let seen = work.seen.lock().clone();
    assert_eq!(seen.len(), 3);
    let mut first_two = seen[..2].to_vec();
    first_two.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(first_two, expected);

    for template in [first.id, second.id] {
        let stored = ctx.templates.find_by_id(template).await.unwrap().unwrap();
        assert!(stored.last_used_at.is_some());
    }

    let logs = ctx.logs.find_recent(SCHEDULER_SERVICE, 10).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs
        .iter()
        .all(|entry| entry.context.result == ExecutionResult::Success));
}

#[tokio::test]
async fn test_scheduler_logs_skip_when_no_template_is_active() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "paused").await;
    ctx.templates.set_active(template.id, false).await.unwrap();
    let work = Arc::new(RecordingWork::default());

    let scheduler = Scheduler::new(
        ctx.templates.clone(),
        ctx.logs.clone(),
        work.clone(),
        SchedulerConfig::default(),
    );

    assert_eq!(
        scheduler.trigger().await,
        FiringOutcome::Skipped {
            reason: SkipReason::NoActiveTemplate
        }
    );
    assert!(work.seen.lock().is_empty());

    let logs = ctx.logs.find_recent(SCHEDULER_SERVICE, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].context.result, ExecutionResult::Skipped);
    assert_eq!(logs[0].context.template_id, None);
}
