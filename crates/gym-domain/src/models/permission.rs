//! 权限码常量
//!
//! 格式为 `模块:资源:操作`，校验时支持 `模块:资源:*` 通配

pub const GYM_SETTINGS_WRITE: &str = "gym:settings:write";
pub const ACCOUNT_READ: &str = "account:read";
pub const ACCOUNT_WRITE: &str = "account:write";
pub const QUOTA_ADJUST: &str = "quota:adjust";
pub const ACTIVITY_READ: &str = "activity:read";
pub const ACTIVITY_WRITE: &str = "activity:write";
pub const ATTENDANCE_READ: &str = "attendance:read";
pub const ATTENDANCE_MANAGE: &str = "attendance:manage";
pub const ATTENDANCE_BOOK: &str = "attendance:book";
pub const QRCODE_READ: &str = "qrcode:read";
pub const QRCODE_WRITE: &str = "qrcode:write";
pub const QRCODE_SCAN: &str = "qrcode:scan";
pub const FINANCE_READ: &str = "finance:read";
pub const FINANCE_WRITE: &str = "finance:write";
pub const STATS_READ: &str = "stats:read";
pub const AUDIT_READ: &str = "audit:read";

pub const ALL: &[&str] = &[
    GYM_SETTINGS_WRITE,
    ACCOUNT_READ,
    ACCOUNT_WRITE,
    QUOTA_ADJUST,
    ACTIVITY_READ,
    ACTIVITY_WRITE,
    ATTENDANCE_READ,
    ATTENDANCE_MANAGE,
    ATTENDANCE_BOOK,
    QRCODE_READ,
    QRCODE_WRITE,
    QRCODE_SCAN,
    FINANCE_READ,
    FINANCE_WRITE,
    STATS_READ,
    AUDIT_READ,
];
