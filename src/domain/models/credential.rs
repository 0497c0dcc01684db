// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 凭证实体
///
/// 访问下游生成服务的密钥，带有剩余配额。
/// 不变量：`quota_remaining == 0` 时 `status` 必为 `Exhausted`。
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// 凭证唯一标识符
    pub id: Uuid,
    /// 访问密钥（不会出现在日志中）
    #[serde(skip_serializing)]
    pub secret: String,
    /// 凭证状态
    pub status: CredentialStatus,
    /// 剩余配额，永不为负
    pub quota_remaining: i64,
    /// 最近一次被选中的时间
    pub last_used_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl Credential {
    /// 创建新凭证
    ///
    /// 初始配额为 0 时直接处于耗尽状态
    pub fn new(secret: impl Into<String>, initial_quota: i64) -> Self {
        let (quota_remaining, forced) = normalize_quota(initial_quota);
        Self {
            id: Uuid::new_v4(),
            secret: secret.into(),
            status: forced.unwrap_or(CredentialStatus::Active),
            quota_remaining,
            last_used_at: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    /// 是否可被选中
    pub fn is_available(&self) -> bool {
        self.status == CredentialStatus::Active && self.quota_remaining > 0
    }

    /// 只保留末尾四位的密钥
    pub fn masked_secret(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &self.masked_secret())
            .field("status", &self.status)
            .field("quota_remaining", &self.quota_remaining)
            .field("last_used_at", &self.last_used_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// 配额写入规则
///
/// 每次写入配额都必须经过此函数：`remaining <= 0` 时截断为 0 并强制切换为耗尽，
/// 否则状态保持不变。
///
/// # 返回值
///
/// `(存储的配额, 需要强制写入的状态)`
pub fn normalize_quota(remaining: i64) -> (i64, Option<CredentialStatus>) {
    if remaining <= 0 {
        (0, Some(CredentialStatus::Exhausted))
    } else {
        (remaining, None)
    }
}

/// 凭证状态枚举
///
/// Active → Exhausted（配额用尽）/ Error（认证失败等）；refresh 可恢复为 Active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// 可用
    #[default]
    Active,
    /// 配额耗尽
    Exhausted,
    /// 出错
    Error,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CredentialStatus::Active => write!(f, "active"),
            CredentialStatus::Exhausted => write!(f, "exhausted"),
            CredentialStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for CredentialStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CredentialStatus::Active),
            "exhausted" => Ok(CredentialStatus::Exhausted),
            "error" => Ok(CredentialStatus::Error),
            _ => Err(()),
        }
    }
}
