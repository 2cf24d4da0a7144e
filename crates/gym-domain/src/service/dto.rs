//! 服务层输入输出对象
//!
//! API 层把请求体转换为这里的输入结构，服务层不感知 HTTP

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Account, FinanceCategory, FinanceKind, Gym, QrCodeKind, Role};

/// 注册健身房
#[derive(Debug, Clone)]
pub struct RegisterGymInput {
    pub name: String,
    pub slug: String,
    /// 为空时使用配置的默认货币
    pub currency: Option<String>,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_full_name: String,
}

/// 会员自助注册
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub gym_slug: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub gym_slug: String,
    pub email: String,
    pub password: String,
}

/// 认证成功后的账号及所属健身房
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedAccount {
    pub gym: Gym,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub initial_quota: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAccountInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct CreateActivityInput {
    pub name: String,
    pub description: Option<String>,
    /// 教练创建时忽略，固定为教练本人
    pub trainer_id: Option<i64>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub quota_cost: Option<i32>,
    pub repeat_weeks: Option<u32>,
}

/// 未提供的字段保持不变
///
/// 可清空字段为两层 Option：外层 `None` 不修改，`Some(None)` 清空
#[derive(Debug, Clone, Default)]
pub struct UpdateActivityInput {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub trainer_id: Option<i64>,
    pub location: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// `Some(None)` 表示不限人数
    pub capacity: Option<Option<i32>>,
    pub quota_cost: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CreateQrCodeInput {
    pub label: String,
    pub kind: QrCodeKind,
    pub quota_amount: i32,
    pub price_cents: Option<i64>,
    pub max_uses: Option<i32>,
    pub per_member_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanInput {
    pub code: String,
    /// 员工代会员扫码时指定
    pub member_id: Option<i64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateRecordInput {
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    pub amount_cents: i64,
    /// 为空时使用健身房货币
    pub currency: Option<String>,
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRecordInput {
    pub kind: Option<FinanceKind>,
    pub category: Option<FinanceCategory>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub occurred_on: Option<NaiveDate>,
}
