//! 数据库仓储层
//!
//! 提供所有实体的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 所有查询都带 `gym_id` 条件，跨租户的 ID 与不存在的 ID 表现一致
//! - 额度变动统一经过 `QuotaRepository::apply_in_tx`，与业务记录同事务提交
//! - 定义 trait 接口以支持 mock 测试

mod account_repo;
mod activity_repo;
mod attendance_repo;
mod finance_repo;
mod gym_repo;
mod operation_log_repo;
pub mod params;
mod qr_code_repo;
mod quota_repo;
mod stats_repo;
#[cfg(test)]
mod test_support;
mod traits;

pub use account_repo::AccountRepository;
pub use activity_repo::ActivityRepository;
pub use attendance_repo::AttendanceRepository;
pub use finance_repo::FinanceRepository;
pub use gym_repo::GymRepository;
pub use operation_log_repo::OperationLogRepository;
pub use params::*;
pub use qr_code_repo::QrCodeRepository;
pub use quota_repo::QuotaRepository;
pub use stats_repo::StatsRepository;
pub use traits::*;
