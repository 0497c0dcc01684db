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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 生成服务错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// 凭证无效或无权限
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// 凭证配额已用尽
    #[error("Quota exceeded")]
    QuotaExceeded,
    /// 服务暂时不可用（5xx、网络错误、超时）
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// 请求被拒绝
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    /// 响应无法解析
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// 服务配置错误
    #[error("Invalid provider configuration: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 只有暂时性的服务不可用返回true
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }

    /// 判断错误是否只与所用凭证有关
    ///
    /// 配额耗尽与鉴权失败说明服务本身可达，不计入熔断失败
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            ProviderError::QuotaExceeded | ProviderError::Unauthorized(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Unavailable(e.to_string())
        }
    }
}

/// 生成请求
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// 驱动本次生成的模板
    pub template_id: Uuid,
    /// 模板负载
    pub payload: serde_json::Value,
}

/// 生成结果
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationOutput {
    /// 服务返回的内容
    pub output: serde_json::Value,
    /// 服务报告的剩余配额
    #[serde(skip)]
    pub quota_remaining: Option<i64>,
}

/// 下游生成服务特质
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// 使用给定凭证执行一次生成
    ///
    /// # 参数
    ///
    /// * `secret` - 凭证密钥
    /// * `request` - 生成请求
    async fn generate(
        &self,
        secret: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError>;

    /// 服务名称，同时作为熔断器的键
    fn name(&self) -> &str;
}
