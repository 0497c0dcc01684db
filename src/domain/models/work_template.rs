// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 工作模板
///
/// 驱动一次生成运行的可复用描述。内容由外部维护，
/// 调度器只读写 `is_active` 与 `last_used_at`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTemplate {
    /// 模板唯一标识符
    pub id: Uuid,
    /// 模板名称
    pub name: String,
    /// 模板负载，原样传给下游生成服务
    pub payload: serde_json::Value,
    /// 是否启用
    pub is_active: bool,
    /// 最近一次被调度的时间
    pub last_used_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl WorkTemplate {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            is_active: true,
            last_used_at: None,
            created_at: Utc::now().fixed_offset(),
        }
    }
}
