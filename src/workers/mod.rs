// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台调度与工作单元抽象：
/// - 调度器（scheduler）：固定间隔、单飞执行的模板调度
/// - 工作单元（unit_of_work）：调度器每次触发时调用的工作
pub mod scheduler;
pub mod unit_of_work;

pub use scheduler::{FiringOutcome, Scheduler, SchedulerConfig, SchedulerHandle};
pub use unit_of_work::UnitOfWork;
