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

use crate::{
    domain::{
        repositories::{work_template_repository::WorkTemplateRepository, RepositoryError},
        services::credential_pool_service::{CredentialPoolError, CredentialPoolService},
    },
    providers::{
        circuit_breaker::{CircuitBreakerError, CircuitBreakerRegistry},
        traits::{GenerationProvider, GenerationRequest, ProviderError},
    },
    utils::retry_policy::{retry_with_backoff_when, RetryPolicy},
    workers::unit_of_work::UnitOfWork,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No active credential available")]
    NoActiveCredential,
    #[error("Work template not found: {0}")]
    TemplateNotFound(Uuid),
    #[error("Circuit breaker for provider '{provider}' is open")]
    CircuitOpen { provider: String },
    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Pool(#[from] CredentialPoolError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 单个服务的输出
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutput {
    pub provider: String,
    pub output: serde_json::Value,
}

/// 一次生成运行汇总的结果，最终媒体的组装由外部完成
#[derive(Debug, Clone, Serialize)]
pub struct CompositeArtifact {
    pub template_id: Uuid,
    pub credential_id: Uuid,
    pub outputs: Vec<ProviderOutput>,
    pub generated_at: DateTime<Utc>,
}

pub struct GenerateContentUseCase {
    pool: Arc<CredentialPoolService>,
    templates: Arc<dyn WorkTemplateRepository>,
    providers: Vec<Arc<dyn GenerationProvider>>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry_policy: RetryPolicy,
}

impl GenerateContentUseCase {
    pub fn new(
        pool: Arc<CredentialPoolService>,
        templates: Arc<dyn WorkTemplateRepository>,
        providers: Vec<Arc<dyn GenerationProvider>>,
        breakers: Arc<CircuitBreakerRegistry>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            templates,
            providers,
            breakers,
            retry_policy,
        }
    }

    /// 以指定模板执行一次生成
    ///
    /// 依次调用每个下游服务：每次调用都经过该服务的熔断器，熔断器内部再做有限次重试。
    /// 调用成功后写回服务报告的剩余配额，未报告时扣减 1。
    pub async fn generate(&self, template_id: Uuid) -> Result<CompositeArtifact, GenerationError> {
        // 1. Pre-flight gate
        if !self.pool.has_active().await? {
            warn!(template_id = %template_id, "Credential pool is empty, skipping generation");
            return Err(GenerationError::NoActiveCredential);
        }

        // 2. Load template and credential
        let template = self
            .templates
            .find_by_id(template_id)
            .await?
            .ok_or(GenerationError::TemplateNotFound(template_id))?;
        let credential = self
            .pool
            .select_next()
            .await?
            .ok_or(GenerationError::NoActiveCredential)?;

        let request = GenerationRequest {
            template_id,
            payload: template.payload.clone(),
        };

        // 3. Call every provider through its breaker and the retry executor
        let mut outputs = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.name().to_string();
            let breaker = self.breakers.get(&name);
            let label = format!("{}.generate", name);

            let result = breaker
                .call_when(
                    || {
                        retry_with_backoff_when(
                            &self.retry_policy,
                            Some(&label),
                            ProviderError::is_retryable,
                            || provider.generate(&credential.secret, &request),
                        )
                    },
                    |e: &ProviderError| !e.is_credential_error(),
                )
                .await;

            match result {
                Ok(generated) => {
                    // 4. Write back quota
                    match generated.quota_remaining {
                        Some(remaining) => self.pool.update_quota(credential.id, remaining).await?,
                        None => self.pool.consume(credential.id, 1).await?,
                    };
                    outputs.push(ProviderOutput {
                        provider: name,
                        output: generated.output,
                    });
                }
                Err(CircuitBreakerError::Open { .. }) => {
                    return Err(GenerationError::CircuitOpen { provider: name });
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    // 5. Credential-level failures change the credential state
                    match &e {
                        ProviderError::QuotaExceeded => {
                            self.pool.mark_exhausted(credential.id).await?;
                        }
                        ProviderError::Unauthorized(_) => {
                            self.pool.mark_error(credential.id).await?;
                        }
                        _ => {}
                    }
                    return Err(GenerationError::Provider {
                        provider: name,
                        source: e,
                    });
                }
            }
        }

        // 6. Collect outputs
        Ok(CompositeArtifact {
            template_id,
            credential_id: credential.id,
            outputs,
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl UnitOfWork for GenerateContentUseCase {
    async fn execute(&self, template_id: Uuid) -> anyhow::Result<()> {
        let artifact = self.generate(template_id).await?;
        info!(
            template_id = %artifact.template_id,
            credential_id = %artifact.credential_id,
            outputs = artifact.outputs.len(),
            "Composite artifact generated"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "generate_content"
    }
}
