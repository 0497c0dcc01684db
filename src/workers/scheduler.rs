// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::execution_log::{ExecutionContext, ExecutionLogEntry, ExecutionResult};
use crate::domain::models::work_template::WorkTemplate;
use crate::domain::repositories::execution_log_repository::ExecutionLogRepository;
use crate::domain::repositories::work_template_repository::WorkTemplateRepository;
use crate::domain::repositories::RepositoryError;
use crate::workers::unit_of_work::UnitOfWork;
use chrono::Utc;
use metrics::counter;
use rand::seq::IndexedRandom;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument, Span};
use uuid::Uuid;

/// 调度器配置
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// 固定触发间隔
    pub interval: Duration,
    /// 同一模板两次被选中之间的最小间隔
    pub non_repetition_window: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            non_repetition_window: chrono::Duration::hours(24),
        }
    }
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 上一次触发仍在执行
    AlreadyRunning,
    /// 没有启用的模板
    NoActiveTemplate,
}

/// 单次触发的结果
#[derive(Debug, Clone, PartialEq)]
pub enum FiringOutcome {
    Success { template_id: Uuid },
    Failed {
        template_id: Option<Uuid>,
        error: String,
    },
    Skipped { reason: SkipReason },
}

const IDLE: u8 = 0;
const FIRING: u8 = 1;

/// 触发中标记
///
/// 持有期间调度器处于 Firing 状态，无论以何种方式离开作用域都会回到 Idle
struct FiringGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> FiringGuard<'a> {
    fn try_acquire(state: &'a AtomicU8) -> Option<Self> {
        state
            .compare_exchange(IDLE, FIRING, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { state })
    }
}

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

struct SchedulerInner {
    templates: Arc<dyn WorkTemplateRepository>,
    logs: Arc<dyn ExecutionLogRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    config: SchedulerConfig,
    state: AtomicU8,
}

/// 单飞调度器
///
/// 按固定间隔触发，同一时刻最多只有一次工作在执行。
/// 每次触发（成功、失败或跳过）都会写入一条执行日志。
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    span: Span,
}

impl Scheduler {
    /// 创建新的调度器实例
    ///
    /// # 参数
    ///
    /// * `templates` - 工作模板仓库
    /// * `logs` - 执行日志仓库
    /// * `unit_of_work` - 每次触发调用的工作单元
    /// * `config` - 调度配置
    pub fn new(
        templates: Arc<dyn WorkTemplateRepository>,
        logs: Arc<dyn ExecutionLogRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                templates,
                logs,
                unit_of_work,
                config,
                state: AtomicU8::new(IDLE),
            }),
            span: tracing::info_span!("scheduler"),
        }
    }

    /// 指定调度器日志所属的 span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 是否有工作正在执行
    pub fn is_firing(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == FIRING
    }

    /// 调度配置
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// 启动定时器
    ///
    /// 第一次触发发生在启动后一个间隔。每次触发都在独立任务中执行，
    /// 因此与仍在执行的上一次触发重叠时会被记录为跳过。
    ///
    /// # 返回值
    ///
    /// 定时器句柄，停止或丢弃句柄都会取消定时器
    pub fn start(&self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let scheduler = self.clone();
        let period = self.inner.config.interval.max(Duration::from_millis(1));

        let join = tokio::spawn(
            async move {
                info!(interval_secs = period.as_secs(), "Scheduler started");
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        _ = ticker.tick() => {
                            drop(scheduler.spawn_firing());
                        }
                    }
                }

                info!("Scheduler timer stopped");
            }
            .instrument(self.span.clone()),
        );

        SchedulerHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }

    /// 手动触发一次，与定时触发共享同一个单飞标记
    ///
    /// 触发在独立任务中执行，调用方取消等待不会中断工作，
    /// 标记仍保持到日志写入之后才释放
    pub async fn trigger(&self) -> FiringOutcome {
        match self.spawn_firing().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Scheduler firing task ended abnormally: {}", e);
                FiringOutcome::Failed {
                    template_id: None,
                    error: format!("firing task aborted: {}", e),
                }
            }
        }
    }

    fn spawn_firing(&self) -> JoinHandle<FiringOutcome> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.trigger().await }.instrument(self.span.clone()))
    }
}

impl SchedulerInner {
    async fn trigger(&self) -> FiringOutcome {
        let started = Instant::now();

        // 标记必须在第一个挂起点之前设置
        let Some(_guard) = FiringGuard::try_acquire(&self.state) else {
            self.record(
                "Skipped: previous run still in progress",
                ExecutionResult::Skipped,
                None,
                None,
                started,
            )
            .await;
            return FiringOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            };
        };

        let template_id = match self.pick_template().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                self.record(
                    "Skipped: no active work template",
                    ExecutionResult::Skipped,
                    None,
                    None,
                    started,
                )
                .await;
                return FiringOutcome::Skipped {
                    reason: SkipReason::NoActiveTemplate,
                };
            }
            Err(e) => {
                let message = format!("Failed to select work template: {}", e);
                self.record(
                    "Template selection failed",
                    ExecutionResult::Failed,
                    None,
                    Some(message.clone()),
                    started,
                )
                .await;
                return FiringOutcome::Failed {
                    template_id: None,
                    error: message,
                };
            }
        };

        debug!(template_id = %template_id, unit_of_work = self.unit_of_work.name(), "Executing unit of work");
        let unit_of_work = self.unit_of_work.clone();
        let result = tokio::spawn(async move { unit_of_work.execute(template_id).await })
            .await
            .unwrap_or_else(|join_err| {
                Err(anyhow::anyhow!("unit of work aborted: {}", join_err))
            });

        match result {
            Ok(()) => {
                if let Err(e) = self.templates.mark_used(template_id, Utc::now()).await {
                    error!(template_id = %template_id, error = %e, "Failed to stamp template last_used_at");
                }
                self.record(
                    "Work completed",
                    ExecutionResult::Success,
                    Some(template_id),
                    None,
                    started,
                )
                .await;
                FiringOutcome::Success { template_id }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                self.record(
                    "Work failed",
                    ExecutionResult::Failed,
                    Some(template_id),
                    Some(message.clone()),
                    started,
                )
                .await;
                FiringOutcome::Failed {
                    template_id: Some(template_id),
                    error: message,
                }
            }
        }
    }

    /// 选择模板：优先在窗口外的模板中随机选择，没有时退回到全部启用模板
    async fn pick_template(&self) -> Result<Option<Uuid>, RepositoryError> {
        let cutoff = Utc::now() - self.config.non_repetition_window;

        let eligible = self.templates.find_eligible(cutoff).await?;
        if let Some(id) = random_template_id(&eligible) {
            return Ok(Some(id));
        }

        let active = self.templates.find_active().await?;
        let fallback = random_template_id(&active);
        if fallback.is_some() {
            info!(
                active_templates = active.len(),
                "No template outside the non-repetition window, falling back to any active template"
            );
        }
        Ok(fallback)
    }

    async fn record(
        &self,
        message: &str,
        result: ExecutionResult,
        template_id: Option<Uuid>,
        error_message: Option<String>,
        started: Instant,
    ) {
        let execution_time_ms = started.elapsed().as_millis() as u64;
        counter!("scheduler_runs_total", "result" => result.to_string()).increment(1);

        match result {
            ExecutionResult::Success => {
                info!(template_id = ?template_id, elapsed_ms = execution_time_ms, "{}", message)
            }
            ExecutionResult::Skipped => warn!(elapsed_ms = execution_time_ms, "{}", message),
            ExecutionResult::Failed => error!(
                template_id = ?template_id,
                elapsed_ms = execution_time_ms,
                error = error_message.as_deref().unwrap_or_default(),
                "{}",
                message
            ),
        }

        let entry = ExecutionLogEntry::scheduler(
            message,
            ExecutionContext {
                template_id,
                result,
                error_message,
                execution_time_ms,
                timestamp: Utc::now(),
            },
        );
        if let Err(e) = self.logs.append(&entry).await {
            error!(error = %e, result = %result, "Failed to write execution log entry");
        }
    }
}

fn random_template_id(templates: &[WorkTemplate]) -> Option<Uuid> {
    templates.choose(&mut rand::rng()).map(|t| t.id)
}

/// 定时器句柄
pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// 停止定时器
    ///
    /// 只取消之后的触发，正在执行的工作会继续完成并写入日志
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Scheduler timer task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
