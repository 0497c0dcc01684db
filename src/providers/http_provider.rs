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

use crate::providers::traits::{
    GenerationOutput, GenerationProvider, GenerationRequest, ProviderError,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// 服务在响应头中报告剩余配额时使用的名称
pub const QUOTA_REMAINING_HEADER: &str = "x-quota-remaining";

/// HTTP生成服务
///
/// 基于reqwest实现：`POST {endpoint}`，Bearer 认证，JSON 请求体
pub struct HttpGenerationProvider {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpGenerationProvider {
    /// 创建HTTP生成服务
    ///
    /// # 参数
    ///
    /// * `name` - 服务名称
    /// * `endpoint` - 服务地址
    /// * `timeout` - 单次HTTP请求超时时间
    pub fn new(
        name: impl Into<String>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProviderError::Configuration(format!("invalid endpoint: {}", e)))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("genpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            endpoint,
            client,
        })
    }
}

fn classify(status: StatusCode, body: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::QuotaExceeded,
        s if s.is_server_error() => ProviderError::Unavailable(format!("{}: {}", s, body)),
        s => ProviderError::Rejected {
            status: s.as_u16(),
            message: body,
        },
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate(
        &self,
        secret: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(secret)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }

        let quota_remaining = response
            .headers()
            .get(QUOTA_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());

        let mut output: GenerationOutput = response.json().await?;
        output.quota_remaining = quota_remaining;

        debug!(
            provider = %self.name,
            template_id = %request.template_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            quota_remaining = ?quota_remaining,
            "Generation call completed"
        );
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "http_provider_test.rs"]
mod tests;
