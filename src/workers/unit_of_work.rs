// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

/// 工作单元特质
///
/// 调度器每次触发时调用的实际工作，由启动流程注入
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 以指定模板执行一次工作
    async fn execute(&self, template_id: Uuid) -> anyhow::Result<()>;

    /// 获取工作单元名称
    fn name(&self) -> &str;
}
