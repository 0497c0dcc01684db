// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::providers::circuit_breaker::CircuitConfig;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::scheduler::SchedulerConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// 配置加载错误
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// 应用程序配置设置
///
/// 包含数据库、调度器、熔断器、重试、可观测性以及下游服务配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// 数据库配置
    #[validate(nested)]
    pub database: DatabaseSettings,
    /// 调度器配置
    #[validate(nested)]
    pub scheduler: SchedulerSettings,
    /// 熔断器配置
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// 重试配置
    #[validate(nested)]
    pub retry: RetrySettings,
    /// 可观测性配置
    #[validate(nested)]
    pub observability: ObservabilitySettings,
    /// 下游生成服务，按调用顺序排列
    #[serde(default)]
    #[validate(nested)]
    pub providers: Vec<ProviderSettings>,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    #[validate(length(min = 1))]
    pub url: String,
    /// 最大连接数
    #[validate(range(min = 1))]
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 连接超时时间（秒）
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 是否输出 SQL 日志
    pub sql_logging: bool,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchedulerSettings {
    /// 是否启动定时器
    pub enabled: bool,
    /// 触发间隔（秒）
    #[validate(range(min = 1))]
    pub interval_secs: u64,
    /// 模板不重复窗口（小时）
    #[validate(range(min = 0, max = 8760))]
    pub non_repetition_window_hours: i64,
}

/// 熔断器配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CircuitBreakerSettings {
    /// 连续失败阈值
    #[validate(range(min = 1))]
    pub failure_threshold: u32,
    /// 冷却时间（秒）
    #[validate(range(min = 1))]
    pub reset_timeout_secs: u64,
}

/// 重试配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RetrySettings {
    /// 最大尝试次数
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    /// 初始退避（毫秒）
    pub base_delay_ms: u64,
    /// 最大退避（毫秒）
    pub max_delay_ms: u64,
    /// 退避乘数
    #[validate(range(min = 1.0, max = 10.0))]
    pub backoff_multiplier: f64,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 可观测性配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ObservabilitySettings {
    /// 日志格式
    pub log_format: LogFormat,
    /// 是否启用 Prometheus 指标
    pub metrics_enabled: bool,
    /// 指标监听地址
    #[validate(custom(function = "validate_socket_addr"))]
    pub metrics_address: String,
}

/// 下游生成服务配置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProviderSettings {
    /// 服务名称，同时作为熔断器的键
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// 服务地址
    #[validate(url)]
    pub endpoint: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_provider_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn validate_socket_addr(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("socket_addr"))
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `GENPILOT__` 前缀的环境变量，然后做语义校验
    ///
    /// # 返回值
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(SettingsError)` - 加载或校验失败
    pub fn new() -> Result<Self, SettingsError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("GENPILOT").separator("__"));

        Self::from_builder(builder)
    }

    /// 只包含内置默认值的配置构建器
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Database
            .set_default("database.url", "postgres://localhost/genpilot")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_secs", 10)?
            .set_default("database.idle_timeout_secs", 300)?
            .set_default("database.sql_logging", false)?
            // Scheduler
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_secs", 900)?
            .set_default("scheduler.non_repetition_window_hours", 24)?
            // Circuit breaker
            .set_default("circuit_breaker.failure_threshold", 5)?
            .set_default("circuit_breaker.reset_timeout_secs", 30)?
            // Retry
            .set_default("retry.max_attempts", 3)?
            .set_default("retry.base_delay_ms", 1000)?
            .set_default("retry.max_delay_ms", 8000)?
            .set_default("retry.backoff_multiplier", 2.0)?
            // Observability
            .set_default("observability.log_format", "text")?
            .set_default("observability.metrics_enabled", false)?
            .set_default("observability.metrics_address", "0.0.0.0:9000")
    }

    /// 构建、反序列化并校验配置
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 指标监听地址
    pub fn metrics_address(&self) -> Option<SocketAddr> {
        if !self.observability.metrics_enabled {
            return None;
        }
        self.observability.metrics_address.parse().ok()
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms.max(settings.base_delay_ms)),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            reset_timeout: Duration::from_secs(settings.reset_timeout_secs),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            non_repetition_window: chrono::Duration::hours(settings.non_repetition_window_hours),
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
