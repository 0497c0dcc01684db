// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use genpilot::domain::models::work_template::WorkTemplate;
use genpilot::domain::repositories::work_template_repository::WorkTemplateRepository;
use genpilot::domain::services::credential_pool_service::CredentialPoolService;
use genpilot::infrastructure::repositories::credential_repo_impl::CredentialRepositoryImpl;
use genpilot::infrastructure::repositories::execution_log_repo_impl::ExecutionLogRepositoryImpl;
use genpilot::infrastructure::repositories::work_template_repo_impl::WorkTemplateRepositoryImpl;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

/// 基于内存 SQLite 的测试上下文
#[allow(dead_code)]
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub pool: Arc<CredentialPoolService>,
    pub templates: Arc<WorkTemplateRepositoryImpl>,
    pub logs: Arc<ExecutionLogRepositoryImpl>,
}

pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    Arc::new(db)
}

pub async fn create_test_context() -> TestContext {
    let db = setup_db().await;
    TestContext {
        pool: Arc::new(CredentialPoolService::new(Arc::new(
            CredentialRepositoryImpl::new(db.clone()),
        ))),
        templates: Arc::new(WorkTemplateRepositoryImpl::new(db.clone())),
        logs: Arc::new(ExecutionLogRepositoryImpl::new(db.clone())),
        db,
    }
}

#[allow(dead_code)]
pub async fn seed_template(ctx: &TestContext, name: &str) -> WorkTemplate {
    let template = WorkTemplate::new(name, serde_json::json!({ "topic": name }));
    ctx.templates.create(&template).await.unwrap()
}
