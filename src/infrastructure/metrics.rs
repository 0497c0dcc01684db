// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册本服务使用的各类监控指标。
/// 安装失败（如端口被占用）只记录告警，不影响服务启动。
///
/// # 参数
///
/// * `addr` - 导出器 HTTP 监听地址
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new();

    if let Err(e) = builder.with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

/// 注册指标描述
pub fn describe_metrics() {
    // Circuit Breaker Metrics
    describe_counter!(
        "circuit_breaker_requests_total",
        "Total number of requests processed by circuit breaker"
    );
    describe_counter!(
        "circuit_breaker_failures_total",
        "Total number of failed requests recorded by circuit breaker"
    );
    describe_counter!(
        "circuit_breaker_successes_total",
        "Total number of successful requests recorded by circuit breaker"
    );
    describe_counter!(
        "circuit_breaker_rejected_total",
        "Total number of requests rejected by open circuit breaker"
    );
    describe_gauge!(
        "circuit_breaker_status",
        "Current status of circuit breaker (0=Closed, 0.5=HalfOpen, 1=Open)"
    );

    // Retry Metrics
    describe_counter!(
        "retry_attempts_failed_total",
        "Total number of failed attempts observed by the retry executor"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Total number of operations that failed after all retry attempts"
    );

    // Credential Pool Metrics
    describe_counter!(
        "credential_selections_total",
        "Total number of credentials handed out by the pool"
    );
    describe_counter!(
        "credential_pool_empty_total",
        "Total number of selections that found no available credential"
    );

    // Scheduler Metrics
    describe_counter!(
        "scheduler_runs_total",
        "Total number of scheduler firings, labelled by result"
    );
}
