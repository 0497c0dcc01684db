// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 工作模板表迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkTemplates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkTemplates::Name).string().not_null())
                    .col(ColumnDef::new(WorkTemplates::Payload).json().not_null())
                    .col(
                        ColumnDef::new(WorkTemplates::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(WorkTemplates::LastUsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WorkTemplates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_templates_active_last_used")
                    .table(WorkTemplates::Table)
                    .col(WorkTemplates::IsActive)
                    .col(WorkTemplates::LastUsedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WorkTemplates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WorkTemplates {
    Table,
    Id,
    Name,
    Payload,
    IsActive,
    LastUsedAt,
    CreatedAt,
}
