//! 健身房业务错误类型
//!
//! 定义服务层的业务错误和系统错误

use thiserror::Error;

use gym_shared::error::InfraError;

/// 健身房业务错误类型
#[derive(Debug, Error)]
pub enum GymError {
    // === 租户 ===
    #[error("健身房不存在: {0}")]
    GymNotFound(String),

    #[error("健身房标识已被占用: {0}")]
    SlugTaken(String),

    // === 账号与认证 ===
    #[error("账号不存在: {0}")]
    AccountNotFound(i64),

    #[error("邮箱已被注册: {0}")]
    EmailTaken(String),

    #[error("邮箱或密码错误")]
    InvalidCredentials,

    #[error("账号已被禁用")]
    AccountDisabled,

    #[error("账号已被锁定，请稍后重试")]
    AccountLocked,

    #[error("无权执行此操作: {0}")]
    Forbidden(String),

    #[error("不能对自己的账号执行此操作: {0}")]
    SelfModification(String),

    #[error("健身房至少需要保留一名有效管理员")]
    LastAdmin,

    #[error("账号存在业务记录，无法删除，请改为禁用: {0}")]
    AccountInUse(i64),

    #[error("账号不是有效会员: {0}")]
    MemberNotEligible(i64),

    // === 额度 ===
    #[error("额度不足: 需要 {required}, 可用 {available}")]
    InsufficientQuota { required: i32, available: i32 },

    // === 课程活动 ===
    #[error("活动不存在: {0}")]
    ActivityNotFound(i64),

    #[error("活动已取消: {0}")]
    ActivityCancelled(i64),

    #[error("活动已开始: {0}")]
    ActivityStarted(i64),

    #[error("活动尚未开始: {0}")]
    ActivityNotStarted(i64),

    #[error("活动名额已满: {0}")]
    ActivityFull(i64),

    #[error("容量不能小于已预约人数: capacity={capacity}, booked={booked}")]
    CapacityBelowBookings { capacity: i32, booked: i64 },

    #[error("活动存在签到记录，无法删除: {0}")]
    ActivityHasAttendance(i64),

    // === 签到 ===
    #[error("签到记录不存在: {0}")]
    AttendanceNotFound(i64),

    #[error("会员已预约该活动: activity_id={activity_id}, member_id={member_id}")]
    AlreadyBooked { activity_id: i64, member_id: i64 },

    #[error("签到记录状态不允许此操作: attendance_id={attendance_id}, current_status={current_status}")]
    InvalidAttendanceState {
        attendance_id: i64,
        current_status: String,
    },

    #[error("活动开始后会员不能自行取消预约")]
    CancellationClosed,

    #[error("当前不在签到时间窗口内")]
    CheckInClosed,

    // === 二维码 ===
    #[error("二维码不存在: {0}")]
    QrCodeNotFound(String),

    #[error("二维码已停用")]
    QrCodeInactive,

    #[error("二维码已过期")]
    QrCodeExpired,

    #[error("二维码使用次数已达上限")]
    QrCodeExhausted,

    #[error("已达到该二维码的个人使用上限")]
    QrCodeLimitReached,

    #[error("二维码已被扫描过，无法删除，请改为停用: {0}")]
    QrCodeInUse(i64),

    #[error("重复的扫码请求: idempotency_key={0}")]
    DuplicateScan(String),

    // === 财务 ===
    #[error("财务记录不存在: {0}")]
    RecordNotFound(i64),

    #[error("扫码生成的财务记录不可修改: {0}")]
    RecordLocked(i64),

    // === 系统错误 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("基础设施错误: {0}")]
    Infra(#[from] InfraError),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 业务服务 Result 类型别名
pub type Result<T> = std::result::Result<T, GymError>;

impl GymError {
    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Infra(_) | Self::Internal(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::GymNotFound(_) => "GYM_NOT_FOUND",
            Self::SlugTaken(_) => "SLUG_TAKEN",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EmailTaken(_) => "EMAIL_TAKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::SelfModification(_) => "SELF_MODIFICATION",
            Self::LastAdmin => "LAST_ADMIN",
            Self::AccountInUse(_) => "ACCOUNT_IN_USE",
            Self::MemberNotEligible(_) => "MEMBER_NOT_ELIGIBLE",
            Self::InsufficientQuota { .. } => "INSUFFICIENT_QUOTA",
            Self::ActivityNotFound(_) => "ACTIVITY_NOT_FOUND",
            Self::ActivityCancelled(_) => "ACTIVITY_CANCELLED",
            Self::ActivityStarted(_) => "ACTIVITY_STARTED",
            Self::ActivityNotStarted(_) => "ACTIVITY_NOT_STARTED",
            Self::ActivityFull(_) => "ACTIVITY_FULL",
            Self::CapacityBelowBookings { .. } => "CAPACITY_BELOW_BOOKINGS",
            Self::ActivityHasAttendance(_) => "ACTIVITY_HAS_ATTENDANCE",
            Self::AttendanceNotFound(_) => "ATTENDANCE_NOT_FOUND",
            Self::AlreadyBooked { .. } => "ALREADY_BOOKED",
            Self::InvalidAttendanceState { .. } => "INVALID_ATTENDANCE_STATE",
            Self::CancellationClosed => "CANCELLATION_CLOSED",
            Self::CheckInClosed => "CHECK_IN_CLOSED",
            Self::QrCodeNotFound(_) => "QR_CODE_NOT_FOUND",
            Self::QrCodeInactive => "QR_CODE_INACTIVE",
            Self::QrCodeExpired => "QR_CODE_EXPIRED",
            Self::QrCodeExhausted => "QR_CODE_EXHAUSTED",
            Self::QrCodeLimitReached => "QR_CODE_LIMIT_REACHED",
            Self::QrCodeInUse(_) => "QR_CODE_IN_USE",
            Self::DuplicateScan(_) => "DUPLICATE_SCAN",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::RecordLocked(_) => "RECORD_LOCKED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Infra(_) => "INFRA_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为资源不存在类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::GymNotFound(_)
                | Self::AccountNotFound(_)
                | Self::ActivityNotFound(_)
                | Self::AttendanceNotFound(_)
                | Self::QrCodeNotFound(_)
                | Self::RecordNotFound(_)
        )
    }
}

/// 判断 sqlx 错误是否为指定约束的唯一键冲突
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
