//! 服务层
//!
//! 实现健身房业务逻辑，协调仓储层、缓存和指标。
//!
//! ## 模块结构
//!
//! - `policy`: 不依赖数据库的业务规则
//! - `dto`: 服务输入对象
//! - 其余模块按业务划分，每个服务只依赖仓储 trait

pub mod account_service;
pub mod activity_service;
pub mod attendance_service;
pub mod audit_service;
pub mod dto;
pub mod finance_service;
pub mod gym_service;
pub mod policy;
pub mod qr_service;
pub mod quota_service;
pub mod stats_service;

pub use account_service::{AccountService, LoginPolicy};
pub use activity_service::ActivityService;
pub use attendance_service::AttendanceService;
pub use audit_service::AuditService;
pub use dto::*;
pub use finance_service::FinanceService;
pub use gym_service::GymService;
pub use qr_service::QrCodeService;
pub use quota_service::QuotaService;
pub use stats_service::StatsService;
