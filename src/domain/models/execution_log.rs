// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 调度器写入日志时使用的服务名
pub const SCHEDULER_SERVICE: &str = "Scheduler";

/// 执行日志条目（只追加）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    /// 日志级别
    pub level: LogLevel,
    /// 写入方服务名
    pub service: String,
    /// 简要描述
    pub message: String,
    /// 结构化上下文
    pub context: ExecutionContext,
    pub created_at: DateTime<FixedOffset>,
}

impl ExecutionLogEntry {
    /// 由调度器产生的日志条目，级别由结果决定
    pub fn scheduler(message: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            level: LogLevel::for_result(context.result),
            service: SCHEDULER_SERVICE.to_string(),
            message: message.into(),
            context,
            created_at: Utc::now().fixed_offset(),
        }
    }
}

/// 执行上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub template_id: Option<Uuid>,
    pub result: ExecutionResult,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// 单次触发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionResult::Success => write!(f, "success"),
            ExecutionResult::Failed => write!(f, "failed"),
            ExecutionResult::Skipped => write!(f, "skipped"),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 失败记为 error，跳过记为 warn，成功记为 info
    pub fn for_result(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success => LogLevel::Info,
            ExecutionResult::Skipped => LogLevel::Warn,
            ExecutionResult::Failed => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}
