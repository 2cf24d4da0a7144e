//! 请求 DTO 定义
//!
//! 所有 REST API 的请求参数和请求体结构，字段统一 camelCase

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use gym_domain::models::{
    AccountStatus, ActivityStatus, AttendanceStatus, FinanceCategory, FinanceKind, Pagination,
    QrCodeKind, Role,
};
use gym_domain::repository::{
    AccountFilter, ActivityFilter, AttendanceFilter, FinanceFilter, OperationLogFilter,
    QrCodeFilter,
};
use gym_domain::service::{
    CreateAccountInput, CreateActivityInput, CreateQrCodeInput, CreateRecordInput, LoginInput,
    RegisterGymInput, SignupInput, UpdateAccountInput, UpdateActivityInput, UpdateRecordInput,
};

// ==================== 分页 ====================

/// 分页参数
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// 页码最小为 1，每页条数限制在 1-100
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.page_size)
    }
}

// ==================== 认证 ====================

/// 注册健身房时创建的首个管理员
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccountRequest {
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "姓名长度必须在 1-100 之间"))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGymRequest {
    #[validate(length(min = 1, max = 100, message = "健身房名称长度必须在 1-100 之间"))]
    pub name: String,
    #[validate(length(min = 3, max = 50, message = "健身房标识长度必须在 3-50 之间"))]
    pub slug: String,
    #[validate(length(equal = 3, message = "货币代码必须为 3 个字母"))]
    pub currency: Option<String>,
    #[validate(nested)]
    pub admin: AdminAccountRequest,
}

impl From<RegisterGymRequest> for RegisterGymInput {
    fn from(req: RegisterGymRequest) -> Self {
        Self {
            name: req.name,
            slug: req.slug,
            currency: req.currency,
            admin_email: req.admin.email,
            admin_password: req.admin.password,
            admin_full_name: req.admin.full_name,
        }
    }
}

/// 会员自助注册
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 50, message = "健身房标识不能为空"))]
    pub gym_slug: String,
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "姓名长度必须在 1-100 之间"))]
    pub full_name: String,
    #[validate(length(max = 30, message = "电话长度不能超过 30"))]
    pub phone: Option<String>,
}

impl From<SignupRequest> for SignupInput {
    fn from(req: SignupRequest) -> Self {
        Self {
            gym_slug: req.gym_slug,
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            phone: req.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50, message = "健身房标识不能为空"))]
    pub gym_slug: String,
    #[validate(length(min = 1, max = 255, message = "邮箱不能为空"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "密码长度必须在 1-100 之间"))]
    pub password: String,
}

impl From<LoginRequest> for LoginInput {
    fn from(req: LoginRequest) -> Self {
        Self {
            gym_slug: req.gym_slug,
            email: req.email,
            password: req.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 100, message = "原密码不能为空"))]
    pub old_password: String,
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub new_password: String,
}

// ==================== 健身房 ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGymRequest {
    #[validate(length(min = 1, max = 100, message = "健身房名称长度必须在 1-100 之间"))]
    pub name: Option<String>,
    #[validate(length(equal = 3, message = "货币代码必须为 3 个字母"))]
    pub currency: Option<String>,
}

// ==================== 账号 ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub keyword: Option<String>,
}

impl From<AccountQuery> for AccountFilter {
    fn from(q: AccountQuery) -> Self {
        Self {
            role: q.role,
            status: q.status,
            keyword: q.keyword.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "姓名长度必须在 1-100 之间"))]
    pub full_name: String,
    #[validate(length(max = 30, message = "电话长度不能超过 30"))]
    pub phone: Option<String>,
    pub role: Role,
    #[validate(range(min = 0, max = 10000, message = "初始额度必须在 0-10000 之间"))]
    pub initial_quota: Option<i32>,
}

impl From<CreateAccountRequest> for CreateAccountInput {
    fn from(req: CreateAccountRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            phone: req.phone,
            role: req.role,
            initial_quota: req.initial_quota,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "姓名长度必须在 1-100 之间"))]
    pub full_name: Option<String>,
    #[validate(length(max = 30, message = "电话长度不能超过 30"))]
    pub phone: Option<String>,
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl From<UpdateAccountRequest> for UpdateAccountInput {
    fn from(req: UpdateAccountRequest) -> Self {
        Self {
            full_name: req.full_name,
            phone: req.phone,
            email: req.email,
            role: req.role,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountStatusRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 100, message = "密码长度必须在 8-100 之间"))]
    pub new_password: String,
}

// ==================== 额度 ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustQuotaRequest {
    #[validate(range(min = -10000, max = 10000, message = "单次调整额度不能超过 10000"))]
    pub delta: i32,
    #[validate(length(max = 200, message = "调整原因不能超过 200 个字符"))]
    pub reason: Option<String>,
}

// ==================== 活动 ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub trainer_id: Option<i64>,
    pub status: Option<ActivityStatus>,
}

impl From<ActivityQuery> for ActivityFilter {
    fn from(q: ActivityQuery) -> Self {
        Self {
            from: q.from,
            to: q.to,
            trainer_id: q.trainer_id,
            status: q.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[validate(length(min = 1, max = 100, message = "活动名称长度必须在 1-100 之间"))]
    pub name: String,
    #[validate(length(max = 2000, message = "活动描述不能超过 2000 个字符"))]
    pub description: Option<String>,
    pub trainer_id: Option<i64>,
    #[validate(length(max = 200, message = "地点不能超过 200 个字符"))]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "容量至少为 1"))]
    pub capacity: Option<i32>,
    #[validate(range(min = 0, max = 100, message = "额度消耗必须在 0-100 之间"))]
    pub quota_cost: Option<i32>,
    #[validate(range(min = 1, max = 52, message = "重复周数必须在 1-52 之间"))]
    pub repeat_weeks: Option<u32>,
}

impl From<CreateActivityRequest> for CreateActivityInput {
    fn from(req: CreateActivityRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            trainer_id: req.trainer_id,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
            quota_cost: req.quota_cost,
            repeat_weeks: req.repeat_weeks,
        }
    }
}

/// 未提供的字段保持不变
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    #[validate(length(min = 1, max = 100, message = "活动名称长度必须在 1-100 之间"))]
    pub name: Option<String>,
    /// 传 `null` 清空，长度由服务层校验
    #[serde(default, deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
    pub trainer_id: Option<i64>,
    #[serde(default, deserialize_with = "clearable")]
    pub location: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// 传 `null` 改为不限人数
    #[serde(default, deserialize_with = "clearable")]
    pub capacity: Option<Option<i32>>,
    #[validate(range(min = 0, max = 100, message = "额度消耗必须在 0-100 之间"))]
    pub quota_cost: Option<i32>,
}

/// 区分字段缺省和显式 `null`：缺省为 `None`，`null` 为 `Some(None)`
fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<UpdateActivityRequest> for UpdateActivityInput {
    fn from(req: UpdateActivityRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            trainer_id: req.trainer_id,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
            quota_cost: req.quota_cost,
        }
    }
}

// ==================== 签到 ====================

/// 预约请求，会员为自己预约时可省略请求体
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub member_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub activity_id: Option<i64>,
    pub member_id: Option<i64>,
    pub status: Option<AttendanceStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<AttendanceQuery> for AttendanceFilter {
    fn from(q: AttendanceQuery) -> Self {
        Self {
            activity_id: q.activity_id,
            member_id: q.member_id,
            status: q.status,
            from: q.from,
            to: q.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatusQuery {
    pub status: Option<AttendanceStatus>,
}

// ==================== 二维码 ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeQuery {
    pub kind: Option<QrCodeKind>,
    pub active: Option<bool>,
}

impl From<QrCodeQuery> for QrCodeFilter {
    fn from(q: QrCodeQuery) -> Self {
        Self {
            kind: q.kind,
            active: q.active,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQrCodeRequest {
    #[validate(length(min = 1, max = 100, message = "名称长度必须在 1-100 之间"))]
    pub label: String,
    pub kind: QrCodeKind,
    #[validate(range(min = 1, max = 1000, message = "额度数量必须在 1-1000 之间"))]
    pub quota_amount: i32,
    #[validate(range(min = 1, message = "售价必须大于 0"))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 1, message = "最大使用次数至少为 1"))]
    pub max_uses: Option<i32>,
    #[validate(range(min = 1, message = "每人使用上限至少为 1"))]
    pub per_member_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreateQrCodeRequest> for CreateQrCodeInput {
    fn from(req: CreateQrCodeRequest) -> Self {
        Self {
            label: req.label,
            kind: req.kind,
            quota_amount: req.quota_amount,
            price_cents: req.price_cents,
            max_uses: req.max_uses,
            per_member_limit: req.per_member_limit,
            expires_at: req.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQrCodeStatusRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 64, message = "二维码内容不能为空"))]
    pub code: String,
    pub member_id: Option<i64>,
    #[validate(length(min = 1, max = 100, message = "幂等键长度必须在 1-100 之间"))]
    pub idempotency_key: Option<String>,
}

// ==================== 财务 ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    pub kind: Option<FinanceKind>,
    pub category: Option<FinanceCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub account_id: Option<i64>,
}

impl From<RecordQuery> for FinanceFilter {
    fn from(q: RecordQuery) -> Self {
        Self {
            kind: q.kind,
            category: q.category,
            from: q.from,
            to: q.to,
            account_id: q.account_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    #[validate(range(min = 1, message = "金额必须大于 0"))]
    pub amount_cents: i64,
    #[validate(length(equal = 3, message = "货币代码必须为 3 个字母"))]
    pub currency: Option<String>,
    #[validate(length(max = 500, message = "描述不能超过 500 个字符"))]
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub occurred_on: NaiveDate,
}

impl From<CreateRecordRequest> for CreateRecordInput {
    fn from(req: CreateRecordRequest) -> Self {
        Self {
            kind: req.kind,
            category: req.category,
            amount_cents: req.amount_cents,
            currency: req.currency,
            description: req.description,
            account_id: req.account_id,
            occurred_on: req.occurred_on,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    pub kind: Option<FinanceKind>,
    pub category: Option<FinanceCategory>,
    #[validate(range(min = 1, message = "金额必须大于 0"))]
    pub amount_cents: Option<i64>,
    #[validate(length(equal = 3, message = "货币代码必须为 3 个字母"))]
    pub currency: Option<String>,
    #[validate(length(max = 500, message = "描述不能超过 500 个字符"))]
    pub description: Option<String>,
    pub account_id: Option<i64>,
    pub occurred_on: Option<NaiveDate>,
}

impl From<UpdateRecordRequest> for UpdateRecordInput {
    fn from(req: UpdateRecordRequest) -> Self {
        Self {
            kind: req.kind,
            category: req.category,
            amount_cents: req.amount_cents,
            currency: req.currency,
            description: req.description,
            account_id: req.account_id,
            occurred_on: req.occurred_on,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==================== 审计日志 ====================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogQuery {
    pub module: Option<String>,
    pub operator_id: Option<i64>,
}

impl From<OperationLogQuery> for OperationLogFilter {
    fn from(q: OperationLogQuery) -> Self {
        Self {
            module: q.module,
            operator_id: q.operator_id,
        }
    }
}
