//! 仓储写入参数与查询条件

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AccountStatus, ActivityStatus, AttendanceStatus, ChangeType, FinanceCategory, FinanceKind,
    QrCodeKind, RefType, Role,
};

// ==================== 租户与账号 ====================

#[derive(Debug, Clone)]
pub struct NewGym {
    pub name: String,
    pub slug: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default)]
pub struct GymChanges {
    pub name: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    /// 注册健身房时由仓储填充
    pub gym_id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    /// 大于 0 时写入一条 initial_grant 账本
    pub initial_quota: i32,
    pub operator_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    /// 姓名或邮箱模糊匹配（不区分大小写）
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

// ==================== 额度 ====================

/// 一次额度变动
#[derive(Debug, Clone)]
pub struct QuotaChange {
    pub gym_id: i64,
    pub account_id: i64,
    pub change_type: ChangeType,
    pub delta: i32,
    pub ref_type: Option<RefType>,
    pub ref_id: Option<i64>,
    pub remark: Option<String>,
    pub operator_id: Option<i64>,
}

// ==================== 活动 ====================

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub gym_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trainer_id: Option<i64>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub quota_cost: i32,
    pub series_id: Option<Uuid>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub trainer_id: Option<i64>,
    pub status: Option<ActivityStatus>,
}

/// 活动更新后的完整字段（由服务层合并）
#[derive(Debug, Clone)]
pub struct ActivityChanges {
    pub name: String,
    pub description: Option<String>,
    pub trainer_id: Option<i64>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub quota_cost: i32,
}

/// 取消活动的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCancellation {
    pub activity_id: i64,
    pub cancelled_bookings: i64,
    pub refunded_quota: i64,
}

// ==================== 签到 ====================

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub gym_id: i64,
    pub activity_id: i64,
    pub member_id: i64,
    pub booked_by: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub activity_id: Option<i64>,
    pub member_id: Option<i64>,
    pub status: Option<AttendanceStatus>,
    /// 按活动开始时间过滤
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ==================== 二维码 ====================

#[derive(Debug, Clone)]
pub struct NewQrCode {
    pub gym_id: i64,
    pub code: String,
    pub label: String,
    pub kind: QrCodeKind,
    pub quota_amount: i32,
    pub price_cents: Option<i64>,
    pub max_uses: Option<i32>,
    pub per_member_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QrCodeFilter {
    pub kind: Option<QrCodeKind>,
    pub active: Option<bool>,
}

/// 扫码写入命令
#[derive(Debug, Clone)]
pub struct ScanCommand {
    pub gym_id: i64,
    pub qr_code_id: i64,
    pub member_id: i64,
    pub operator_id: i64,
    pub idempotency_key: Option<String>,
    /// 充值码生成收入记录时使用的货币
    pub currency: String,
}

// ==================== 财务 ====================

#[derive(Debug, Clone)]
pub struct NewFinancialRecord {
    pub gym_id: i64,
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub recorded_by: i64,
    pub occurred_on: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct FinanceFilter {
    pub kind: Option<FinanceKind>,
    pub category: Option<FinanceCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub account_id: Option<i64>,
}

/// 财务记录更新后的完整字段（由服务层合并）
#[derive(Debug, Clone)]
pub struct FinanceChanges {
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub occurred_on: NaiveDate,
}

// ==================== 统计与审计 ====================

/// 看板统计的时间边界
#[derive(Debug, Clone, Copy)]
pub struct StatsWindow {
    pub now: DateTime<Utc>,
    /// 未来活动统计截止时间
    pub upcoming_until: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
    /// 下月第一天零点，不包含
    pub month_end: DateTime<Utc>,
    pub month_start_date: NaiveDate,
    pub month_end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewOperationLog {
    pub gym_id: i64,
    pub operator_id: i64,
    pub operator_name: Option<String>,
    pub module: String,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    pub module: Option<String>,
    pub operator_id: Option<i64>,
}
