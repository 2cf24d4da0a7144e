//! 健身房领域模型
//!
//! 包含租户、账号、活动、签到、二维码、财务、账本与审计日志的实体定义

pub mod account;
pub mod activity;
pub mod attendance;
pub mod context;
pub mod enums;
pub mod finance;
pub mod gym;
pub mod ledger;
pub mod operation_log;
pub mod permission;
pub mod qr_code;
pub mod stats;

// 重新导出常用类型
pub use account::{Account, AccountSummary};
pub use activity::{Activity, ActivityView};
pub use attendance::{Attendance, AttendanceView};
pub use context::{Actor, Page, Pagination};
pub use enums::{
    AccountStatus, ActivityStatus, AttendanceStatus, ChangeType, FinanceCategory, FinanceKind,
    QrCodeKind, RefType, Role,
};
pub use finance::{CategoryTotal, FinanceSummary, FinancialRecord};
pub use gym::Gym;
pub use ledger::QuotaLedgerEntry;
pub use operation_log::OperationLog;
pub use qr_code::{QrCode, QrScan, ScanOutcome};
pub use stats::{AccountCount, OverviewStats};
