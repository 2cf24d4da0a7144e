//! 枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，统一使用 snake_case

use serde::{Deserialize, Serialize};

use super::permission;

/// 账号角色
///
/// 决定路由级访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum Role {
    /// 管理员 - 拥有全部权限
    Admin,
    /// 教练 - 管理课程与签到
    Trainer,
    /// 会员 - 预约课程、扫码消费
    Member,
    /// 待审核会员 - 自助注册产生，审核通过前只能浏览
    PendingMember,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Trainer => "trainer",
            Self::Member => "member",
            Self::PendingMember => "pending_member",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Trainer)
    }

    /// 角色对应的权限码列表，登录时写入 JWT
    pub fn permissions(&self) -> Vec<String> {
        let codes: &[&str] = match self {
            Self::Admin => permission::ALL,
            Self::Trainer => &[
                permission::ACCOUNT_READ,
                permission::ACTIVITY_READ,
                permission::ACTIVITY_WRITE,
                permission::ATTENDANCE_READ,
                permission::ATTENDANCE_MANAGE,
                permission::ATTENDANCE_BOOK,
                permission::QRCODE_READ,
                permission::QRCODE_SCAN,
                permission::STATS_READ,
            ],
            Self::Member => &[
                permission::ACTIVITY_READ,
                permission::ATTENDANCE_BOOK,
                permission::QRCODE_SCAN,
            ],
            Self::PendingMember => &[permission::ACTIVITY_READ],
        };
        codes.iter().map(|c| c.to_string()).collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "trainer" => Ok(Self::Trainer),
            "member" => Ok(Self::Member),
            "pending_member" => Ok(Self::PendingMember),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// 账号状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
}

/// 活动状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Scheduled,
    Cancelled,
}

/// 签到记录状态
///
/// registered / attended / absent 三种状态占用名额并持有额度扣费
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// 已预约
    #[default]
    Registered,
    /// 已签到
    Attended,
    /// 缺席
    Absent,
    /// 已取消
    Cancelled,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Attended => "attended",
            Self::Absent => "absent",
            Self::Cancelled => "cancelled",
        }
    }

    /// 该状态是否授予会员参加活动的资格
    pub fn is_accessible(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// 二维码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum QrCodeKind {
    /// 消费码 - 扫码扣减额度
    Purchase,
    /// 充值码 - 扫码增加额度
    TopUp,
}

impl QrCodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::TopUp => "top_up",
        }
    }

    /// 扫码产生的额度变动类型
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Purchase => ChangeType::QrPurchase,
            Self::TopUp => ChangeType::QrTopUp,
        }
    }
}

/// 收支类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum FinanceKind {
    Income,
    Expense,
}

/// 收支分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum FinanceCategory {
    Membership,
    QuotaPack,
    Product,
    Salary,
    Rent,
    Equipment,
    Utilities,
    Other,
}

/// 额度账本变动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ChangeType {
    /// 开户赠送（+）
    InitialGrant,
    /// 管理员手动调整（±）
    ManualAdjust,
    /// 预约扣费（-）
    AttendanceCharge,
    /// 取消退款（+）
    AttendanceRefund,
    /// 扫码消费（-）
    QrPurchase,
    /// 扫码充值（+）
    QrTopUp,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialGrant => "initial_grant",
            Self::ManualAdjust => "manual_adjust",
            Self::AttendanceCharge => "attendance_charge",
            Self::AttendanceRefund => "attendance_refund",
            Self::QrPurchase => "qr_purchase",
            Self::QrTopUp => "qr_top_up",
        }
    }

    /// 返回该变动类型的数量符号，手动调整由调用方决定方向返回 0
    pub fn sign(&self) -> i32 {
        match self {
            Self::InitialGrant | Self::AttendanceRefund | Self::QrTopUp => 1,
            Self::AttendanceCharge | Self::QrPurchase => -1,
            Self::ManualAdjust => 0,
        }
    }
}

/// 账本关联类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum RefType {
    Attendance,
    QrScan,
    Manual,
}
