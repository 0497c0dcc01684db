// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_context, seed_template, TestContext};
use genpilot::application::use_cases::generate_content::{GenerateContentUseCase, GenerationError};
use genpilot::domain::models::credential::CredentialStatus;
use genpilot::domain::models::execution_log::{ExecutionResult, SCHEDULER_SERVICE};
use genpilot::domain::repositories::execution_log_repository::ExecutionLogRepository;
use genpilot::providers::circuit_breaker::{CircuitBreakerRegistry, CircuitConfig, Status};
use genpilot::providers::http_provider::{HttpGenerationProvider, QUOTA_REMAINING_HEADER};
use genpilot::providers::traits::{GenerationProvider, ProviderError};
use genpilot::utils::retry_policy::RetryPolicy;
use genpilot::workers::{FiringOutcome, Scheduler, SchedulerConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
    }
}

fn http_provider(name: &str, server: &MockServer) -> Arc<dyn GenerationProvider> {
    Arc::new(
        HttpGenerationProvider::new(
            name,
            &format!("{}/generate", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap(),
    )
}

fn build_use_case(
    ctx: &TestContext,
    providers: Vec<Arc<dyn GenerationProvider>>,
    breakers: Arc<CircuitBreakerRegistry>,
    policy: RetryPolicy,
) -> GenerateContentUseCase {
    GenerateContentUseCase::new(
        ctx.pool.clone(),
        ctx.templates.clone(),
        providers,
        breakers,
        policy,
    )
}

fn ok_response(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "output": body }))
}

/// 测试按顺序调用所有服务并写回配额
///
/// 第一个服务报告剩余配额，第二个服务未报告时扣减 1
#[tokio::test]
async fn test_generation_calls_providers_in_order_and_writes_back_quota() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(header("authorization", "Bearer sk-live-0001"))
        .respond_with(ok_response(json!({"text": "script"})).insert_header(QUOTA_REMAINING_HEADER, "7"))
        .expect(1)
        .mount(&script)
        .await;
    let voice = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ok_response(json!({"audio": "voice.mp3"})))
        .expect(1)
        .mount(&voice)
        .await;

    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script), http_provider("voice", &voice)],
        Arc::new(CircuitBreakerRegistry::default()),
        fast_retry(),
    );

    let artifact = use_case.generate(template.id).await.unwrap();
    assert_eq!(artifact.template_id, template.id);
    assert_eq!(artifact.credential_id, credential.id);
    let providers: Vec<_> = artifact.outputs.iter().map(|o| o.provider.as_str()).collect();
    assert_eq!(providers, vec!["script", "voice"]);
    assert_eq!(artifact.outputs[1].output, json!({"audio": "voice.mp3"}));

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.quota_remaining, 6);
    assert_eq!(stored.status, CredentialStatus::Active);
}

#[tokio::test]
async fn test_quota_exceeded_exhausts_credential_and_stops_run() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&script)
        .await;
    let voice = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_response(json!({})))
        .expect(0)
        .mount(&voice)
        .await;

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(300),
    }));
    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script), http_provider("voice", &voice)],
        breakers.clone(),
        fast_retry(),
    );

    let result = use_case.generate(template.id).await;
    assert!(matches!(
        result,
        Err(GenerationError::Provider { ref provider, source: ProviderError::QuotaExceeded })
            if provider == "script"
    ));

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Exhausted);
    assert_eq!(stored.quota_remaining, 0);
    assert!(!ctx.pool.has_active().await.unwrap());

    // a spent key says nothing about the provider's health
    assert_eq!(breakers.get("script").status(), Status::Closed);
    assert_eq!(breakers.get("script").snapshot().total_failures, 0);
}

#[tokio::test]
async fn test_unauthorized_marks_credential_error() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-revoked-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
        .expect(1)
        .mount(&script)
        .await;

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(300),
    }));
    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        breakers.clone(),
        fast_retry(),
    );

    let result = use_case.generate(template.id).await;
    assert!(matches!(
        result,
        Err(GenerationError::Provider {
            source: ProviderError::Unauthorized(_),
            ..
        })
    ));

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Error);
    assert_eq!(stored.quota_remaining, 10);
    assert_eq!(breakers.get("script").status(), Status::Closed);
}

/// 测试瞬时故障被重试吸收，熔断器保持关闭
#[tokio::test]
async fn test_transient_failure_is_absorbed_by_retry() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&script)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok_response(json!({"text": "recovered"})))
        .expect(1)
        .mount(&script)
        .await;

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(30),
    }));
    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        breakers.clone(),
        fast_retry(),
    );

    let artifact = use_case.generate(template.id).await.unwrap();
    assert_eq!(artifact.outputs[0].output, json!({"text": "recovered"}));

    let snapshot = breakers.get("script").snapshot();
    assert_eq!(snapshot.status, Status::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test]
async fn test_non_retryable_rejection_is_not_retried() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
        .expect(1)
        .mount(&script)
        .await;

    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        Arc::new(CircuitBreakerRegistry::default()),
        fast_retry(),
    );

    let result = use_case.generate(template.id).await;
    assert!(matches!(
        result,
        Err(GenerationError::Provider {
            source: ProviderError::Rejected { status: 400, .. },
            ..
        })
    ));

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Active);
    assert_eq!(stored.quota_remaining, 10);
}

/// 测试熔断器打开后不再调用服务
#[tokio::test]
async fn test_open_circuit_rejects_without_calling_provider() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&script)
        .await;

    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitConfig {
        failure_threshold: 1,
        reset_timeout: Duration::from_secs(300),
    }));
    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        breakers.clone(),
        RetryPolicy::no_retry(),
    );

    let first = use_case.generate(template.id).await;
    assert!(matches!(
        first,
        Err(GenerationError::Provider {
            source: ProviderError::Unavailable(_),
            ..
        })
    ));
    assert_eq!(breakers.get("script").status(), Status::Open);

    let second = use_case.generate(template.id).await;
    assert!(matches!(
        second,
        Err(GenerationError::CircuitOpen { ref provider }) if provider == "script"
    ));

    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Active);
    assert_eq!(stored.quota_remaining, 10);
}

#[tokio::test]
async fn test_empty_pool_fails_before_any_provider_call() {
    let ctx = create_test_context().await;
    let template = seed_template(&ctx, "weekly digest").await;
    ctx.pool.add("sk-spent-0001", 0).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_response(json!({})))
        .expect(0)
        .mount(&script)
        .await;

    let use_case = build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        Arc::new(CircuitBreakerRegistry::default()),
        fast_retry(),
    );

    assert!(matches!(
        use_case.generate(template.id).await,
        Err(GenerationError::NoActiveCredential)
    ));
}

#[tokio::test]
async fn test_unknown_template_is_reported() {
    let ctx = create_test_context().await;
    ctx.pool.add("sk-live-0001", 10).await.unwrap();

    let use_case = build_use_case(
        &ctx,
        Vec::new(),
        Arc::new(CircuitBreakerRegistry::default()),
        fast_retry(),
    );

    let missing = Uuid::new_v4();
    assert!(matches!(
        use_case.generate(missing).await,
        Err(GenerationError::TemplateNotFound(id)) if id == missing
    ));
}

/// 测试调度器驱动完整的生成流程
///
/// 成功与失败的运行都会写入执行日志
#[tokio::test]
async fn test_scheduler_drives_generation_end_to_end() {
    let ctx = create_test_context().await;
    seed_template(&ctx, "weekly digest").await;
    let credential = ctx.pool.add("sk-live-0001", 1).await.unwrap();

    let script = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok_response(json!({"text": "done"})))
        .expect(1)
        .mount(&script)
        .await;

    let use_case = Arc::new(build_use_case(
        &ctx,
        vec![http_provider("script", &script)],
        Arc::new(CircuitBreakerRegistry::default()),
        fast_retry(),
    ));
    let scheduler = Scheduler::new(
        ctx.templates.clone(),
        ctx.logs.clone(),
        use_case,
        SchedulerConfig::default(),
    );

    assert!(matches!(
        scheduler.trigger().await,
        FiringOutcome::Success { .. }
    ));

    // the single unit of quota is spent, so the next run fails the pre-flight gate
    let stored = ctx.pool.get(credential.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CredentialStatus::Exhausted);

    match scheduler.trigger().await {
        FiringOutcome::Failed { template_id, error } => {
            assert!(template_id.is_some());
            assert!(error.contains("No active credential"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let logs = ctx.logs.find_recent(SCHEDULER_SERVICE, 10).await.unwrap();
    let results: Vec<_> = logs.iter().map(|e| e.context.result).collect();
    assert_eq!(results, vec![ExecutionResult::Failed, ExecutionResult::Success]);
}
