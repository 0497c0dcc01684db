// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_context;
use chrono::Utc;
use genpilot::domain::models::execution_log::{
    ExecutionContext, ExecutionLogEntry, ExecutionResult, LogLevel, SCHEDULER_SERVICE,
};
use genpilot::domain::repositories::execution_log_repository::ExecutionLogRepository;
use std::time::Duration;
use uuid::Uuid;

fn entry(message: &str, result: ExecutionResult, template_id: Option<Uuid>) -> ExecutionLogEntry {
    ExecutionLogEntry::scheduler(
        message,
        ExecutionContext {
            template_id,
            result,
            error_message: (result == ExecutionResult::Failed).then(|| "boom".to_string()),
            execution_time_ms: 12,
            timestamp: Utc::now(),
        },
    )
}

/// 测试日志按时间倒序返回且上下文完整保留
#[tokio::test]
async fn test_append_and_find_recent() {
    let ctx = create_test_context().await;
    let template_id = Uuid::new_v4();

    ctx.logs
        .append(&entry("Work completed", ExecutionResult::Success, Some(template_id)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.logs
        .append(&entry("Work failed", ExecutionResult::Failed, Some(template_id)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.logs
        .append(&entry("Skipped", ExecutionResult::Skipped, None))
        .await
        .unwrap();

    let recent = ctx.logs.find_recent(SCHEDULER_SERVICE, 10).await.unwrap();
    let results: Vec<_> = recent.iter().map(|e| e.context.result).collect();
    assert_eq!(
        results,
        vec![
            ExecutionResult::Skipped,
            ExecutionResult::Failed,
            ExecutionResult::Success
        ]
    );

    let failed = &recent[1];
    assert_eq!(failed.level, LogLevel::Error);
    assert_eq!(failed.service, SCHEDULER_SERVICE);
    assert_eq!(failed.context.template_id, Some(template_id));
    assert_eq!(failed.context.error_message.as_deref(), Some("boom"));
    assert_eq!(failed.context.execution_time_ms, 12);

    assert_eq!(recent[0].level, LogLevel::Warn);
    assert_eq!(recent[2].level, LogLevel::Info);

    let limited = ctx.logs.find_recent(SCHEDULER_SERVICE, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert!(ctx.logs.find_recent("Other", 10).await.unwrap().is_empty());
}
