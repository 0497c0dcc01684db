// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// 熔断器配置
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitConfig {
    /// 连续失败阈值
    pub failure_threshold: u32,
    /// 打开状态持续时间，从最近一次失败开始计算
    pub reset_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// 熔断器状态枚举
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    /// 关闭状态，请求直接放行
    Closed,
    /// 打开状态，请求立即被拒绝
    Open,
    /// 半开状态，只放行一个试探请求
    HalfOpen,
}

/// 熔断器状态快照
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitSnapshot {
    /// 当前状态
    pub status: Status,
    /// 连续失败次数
    pub consecutive_failures: u32,
    /// 上次失败时间
    pub last_failure_at: Option<Instant>,
    /// 总请求数
    pub total_requests: u64,
    /// 总失败数
    pub total_failures: u64,
    /// 总拒绝数
    pub total_rejected: u64,
}

/// 熔断器调用错误
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// 熔断器打开，被包装的操作没有被调用
    #[error("Circuit breaker for '{service}' is open")]
    Open { service: String },
    /// 被包装的操作返回的错误
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// 是否因熔断而被拒绝
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

}

#[derive(Debug)]
struct CircuitState {
    status: Status,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
    total_requests: u64,
    total_failures: u64,
    total_rejected: u64,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            status: Status::Closed,
            consecutive_failures: 0,
            last_failure: None,
            trial_in_flight: false,
            total_requests: 0,
            total_failures: 0,
            total_rejected: 0,
        }
    }
}

/// 熔断器
///
/// 每个实例对应一个具名的下游服务，彼此完全独立。
/// 状态只保存在内存中，进程重启后重新从关闭状态开始。
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitConfig,
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    /// 创建新的熔断器实例
    ///
    /// # 参数
    ///
    /// * `service` - 下游服务名称
    /// * `config` - 熔断配置
    pub fn new(service: impl Into<String>, config: CircuitConfig) -> Self {
        let breaker = Self {
            service: service.into(),
            config,
            state: Mutex::new(CircuitState::default()),
        };
        breaker.update_status_metric(Status::Closed);
        breaker
    }

    /// 服务名称
    pub fn service(&self) -> &str {
        &self.service
    }

    /// 熔断配置
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// 当前状态（打开到半开的转换只在下一次调用时发生）
    pub fn status(&self) -> Status {
        self.state.lock().status
    }

    /// 获取状态快照
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state.lock();
        CircuitSnapshot {
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            last_failure_at: state.last_failure,
            total_requests: state.total_requests,
            total_failures: state.total_failures,
            total_rejected: state.total_rejected,
        }
    }

    /// 通过熔断器执行操作
    ///
    /// 打开状态下直接返回 [`CircuitBreakerError::Open`]，`operation` 不会被调用。
    /// 熔断器本身不对操作施加超时。
    ///
    /// # 参数
    ///
    /// * `operation` - 被保护的异步操作
    ///
    /// # 返回值
    ///
    /// * `Ok(T)` - 操作成功
    /// * `Err(CircuitBreakerError::Open)` - 熔断器拒绝了本次调用
    /// * `Err(CircuitBreakerError::Inner(E))` - 操作本身的错误
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_when(operation, |_| true).await
    }

    /// 与 [`call`](Self::call) 相同，但只有 `is_failure` 返回 true 的错误才计入失败
    ///
    /// 其余错误说明服务仍然可达，按成功结算：关闭状态下清零连续失败数，
    /// 半开状态下关闭熔断器
    pub async fn call_when<T, E, F, Fut, P>(
        &self,
        operation: F,
        is_failure: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let permit = self.acquire().ok_or_else(|| CircuitBreakerError::Open {
            service: self.service.clone(),
        })?;

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    permit.fail();
                } else {
                    permit.succeed();
                }
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    /// 申请一次调用许可；打开状态且冷却未结束时返回 None
    fn acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();

        let is_trial = match state.status {
            Status::Closed => false,
            Status::Open => {
                let cooled_down = state
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.reset_timeout);
                if !cooled_down {
                    self.reject(&mut state);
                    return None;
                }
                state.status = Status::HalfOpen;
                info!(service = %self.service, "Circuit breaker half-open, allowing trial call");
                self.update_status_metric(Status::HalfOpen);
                true
            }
            Status::HalfOpen => {
                if state.trial_in_flight {
                    self.reject(&mut state);
                    return None;
                }
                true
            }
        };

        if is_trial {
            state.trial_in_flight = true;
        }
        state.total_requests += 1;
        counter!("circuit_breaker_requests_total", "service" => self.service.clone())
            .increment(1);

        Some(Permit {
            breaker: self,
            is_trial,
            settled: false,
        })
    }

    fn reject(&self, state: &mut CircuitState) {
        state.total_rejected += 1;
        counter!("circuit_breaker_rejected_total", "service" => self.service.clone())
            .increment(1);
    }

    fn record_success(&self, is_trial: bool) {
        let mut state = self.state.lock();
        counter!("circuit_breaker_successes_total", "service" => self.service.clone())
            .increment(1);

        if is_trial {
            state.trial_in_flight = false;
            state.status = Status::Closed;
            state.consecutive_failures = 0;
            info!(service = %self.service, "Circuit breaker closed after successful trial call");
            self.update_status_metric(Status::Closed);
        } else if state.status == Status::Closed {
            state.consecutive_failures = 0;
        }
    }

    fn record_failure(&self, is_trial: bool) {
        let mut state = self.state.lock();
        state.total_failures += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(Instant::now());
        counter!("circuit_breaker_failures_total", "service" => self.service.clone())
            .increment(1);

        if is_trial {
            state.trial_in_flight = false;
            state.status = Status::Open;
            warn!(service = %self.service, "Circuit breaker trial call failed, re-opening");
            self.update_status_metric(Status::Open);
        } else if state.status == Status::Closed
            && state.consecutive_failures >= self.config.failure_threshold
        {
            state.status = Status::Open;
            warn!(
                service = %self.service,
                consecutive_failures = state.consecutive_failures,
                "Circuit breaker opened"
            );
            self.update_status_metric(Status::Open);
        }
    }

    fn release_trial(&self) {
        let mut state = self.state.lock();
        state.trial_in_flight = false;
    }

    /// 更新状态指标
    fn update_status_metric(&self, status: Status) {
        let val = match status {
            Status::Closed => 0.0,
            Status::Open => 1.0,
            Status::HalfOpen => 0.5,
        };
        gauge!("circuit_breaker_status", "service" => self.service.clone()).set(val);
    }
}

/// 一次调用的许可
///
/// 未结算就被丢弃的试探许可会释放试探名额，熔断器保持半开
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    is_trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.is_trial);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.is_trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.is_trial && !self.settled {
            self.breaker.release_trial();
        }
    }
}

/// 熔断器注册表
///
/// 按服务名惰性创建并共享熔断器实例
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    configs: DashMap<String, CircuitConfig>,
    default_config: CircuitConfig,
}

impl CircuitBreakerRegistry {
    /// 使用指定默认配置创建注册表
    pub fn new(default_config: CircuitConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            configs: DashMap::new(),
            default_config,
        }
    }

    /// 为某个服务设置单独的配置
    ///
    /// 只影响之后才创建的熔断器
    pub fn set_config(&self, service: &str, config: CircuitConfig) {
        self.configs.insert(service.to_string(), config);
    }

    /// 获取（必要时创建）服务对应的熔断器
    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(service) {
            return breaker.clone();
        }

        let config = self
            .configs
            .get(service)
            .map(|c| c.value().clone())
            .unwrap_or_else(|| self.default_config.clone());

        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, config)))
            .clone()
    }

    /// 所有已创建熔断器的状态快照
    pub fn snapshots(&self) -> Vec<(String, CircuitSnapshot)> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}
