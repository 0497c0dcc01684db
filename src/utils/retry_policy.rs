// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::counter;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// 重试策略配置
///
/// 退避时间为 `min(base_delay * backoff_multiplier^(attempt-1), max_delay)`，不带抖动
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含首次调用），1 表示不重试
    pub max_attempts: u32,
    /// 初始退避时间
    pub base_delay: Duration,
    /// 最大退避时间
    pub max_delay: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn standard() -> Self {
        Self::default()
    }

    /// 只调用一次、不做重试的策略
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 计算第 `attempt` 次失败后的退避时间
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let backoff_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // 限制最大退避时间
        let capped_backoff = backoff_secs.min(self.max_delay.as_secs_f64()).max(0.0);

        Duration::from_secs_f64(capped_backoff)
    }

    /// 第 `attempt` 次尝试失败后是否还应该重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// 按策略执行可失败的异步操作
///
/// 失败后按退避时间休眠再重试，最多调用 `max_attempts` 次；
/// 全部失败时原样返回最后一次的错误，不做聚合。
///
/// # 参数
///
/// * `policy` - 重试策略
/// * `label` - 操作标签，提供时每次失败都会输出一条告警日志
/// * `operation` - 每次调用都会产生一个新的 future
///
/// # 返回值
///
/// * `Ok(T)` - 某次尝试成功
/// * `Err(E)` - 最后一次尝试的错误
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: Option<&str>,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_backoff_when(policy, label, |_| true, operation).await
}

/// 与 [`retry_with_backoff`] 相同，但 `is_retryable` 返回 false 的错误会被立即返回
pub async fn retry_with_backoff_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: Option<&str>,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                counter!("retry_attempts_failed_total").increment(1);
                if let Some(label) = label {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Attempt failed"
                    );
                }

                if !is_retryable(&e) {
                    return Err(e);
                }

                if !policy.should_retry(attempt) {
                    counter!("retry_exhausted_total").increment(1);
                    error!(
                        operation = label.unwrap_or("unlabelled"),
                        attempts = attempt,
                        error = %e,
                        "All retry attempts exhausted"
                    );
                    return Err(e);
                }

                tokio::time::sleep(policy.calculate_backoff(attempt)).await;
                attempt += 1;
            }
        }
    }
}
