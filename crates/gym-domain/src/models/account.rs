//! 账号实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AccountStatus, Role};

/// 账号
///
/// 管理员、教练和会员共用一张表，以 `role` 区分
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub gym_id: i64,
    /// 小写存储，同一健身房内唯一
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    #[sqlx(default)]
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    /// 剩余额度，永不为负
    pub quota: i32,
    #[serde(skip_serializing, default)]
    pub failed_login_attempts: i32,
    #[sqlx(default)]
    pub locked_until: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// 在给定时间点是否处于锁定状态
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// 是否可以作为会员预约或扫码
    pub fn is_bookable_member(&self) -> bool {
        self.is_active() && self.role == Role::Member
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            full_name: self.full_name.clone(),
            role: self.role,
        }
    }
}

/// 账号摘要，用于嵌入其他响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: i64,
    pub full_name: String,
    pub role: Role,
}
