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

use genpilot::application::use_cases::generate_content::GenerateContentUseCase;
use genpilot::config::settings::Settings;
use genpilot::domain::services::credential_pool_service::CredentialPoolService;
use genpilot::infrastructure::database::connection;
use genpilot::infrastructure::repositories::credential_repo_impl::CredentialRepositoryImpl;
use genpilot::infrastructure::repositories::execution_log_repo_impl::ExecutionLogRepositoryImpl;
use genpilot::infrastructure::repositories::work_template_repo_impl::WorkTemplateRepositoryImpl;
use genpilot::providers::circuit_breaker::{CircuitBreakerRegistry, CircuitConfig};
use genpilot::providers::http_provider::HttpGenerationProvider;
use genpilot::providers::traits::GenerationProvider;
use genpilot::utils::retry_policy::RetryPolicy;
use genpilot::utils::telemetry;
use genpilot::workers::{Scheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动调度器
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging
    telemetry::init_telemetry(settings.observability.log_format);
    info!("Starting genpilot...");

    // Initialize Prometheus Metrics
    match settings.metrics_address() {
        Some(addr) => genpilot::infrastructure::metrics::init_metrics(addr),
        None => genpilot::infrastructure::metrics::describe_metrics(),
    }

    // 3. Connect to database
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connection established");

    // 4. Initialize repositories and services
    let credential_repo = Arc::new(CredentialRepositoryImpl::new(db.clone()));
    let template_repo = Arc::new(WorkTemplateRepositoryImpl::new(db.clone()));
    let log_repo = Arc::new(ExecutionLogRepositoryImpl::new(db.clone()));

    let pool = Arc::new(
        CredentialPoolService::new(credential_repo)
            .with_span(tracing::info_span!("credential_pool")),
    );
    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitConfig::from(
        &settings.circuit_breaker,
    )));
    let retry_policy = RetryPolicy::from(&settings.retry);

    // 5. Initialize providers
    let mut providers: Vec<Arc<dyn GenerationProvider>> =
        Vec::with_capacity(settings.providers.len());
    for provider in &settings.providers {
        providers.push(Arc::new(HttpGenerationProvider::new(
            provider.name.clone(),
            &provider.endpoint,
            Duration::from_secs(provider.timeout_secs),
        )?));
    }
    if providers.is_empty() {
        warn!("No generation providers configured");
    }
    info!(providers = providers.len(), "Providers initialized");

    let use_case = Arc::new(GenerateContentUseCase::new(
        pool,
        template_repo.clone(),
        providers,
        breakers,
        retry_policy,
    ));

    // 6. Start scheduler
    let scheduler = Scheduler::new(
        template_repo,
        log_repo,
        use_case,
        SchedulerConfig::from(&settings.scheduler),
    );
    let handle = if settings.scheduler.enabled {
        Some(scheduler.start())
    } else {
        warn!("Scheduler disabled by configuration");
        None
    };

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Some(handle) = handle {
        handle.stop().await;
    }

    info!("genpilot stopped");
    Ok(())
}
