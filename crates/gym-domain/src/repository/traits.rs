//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 测试。
//! 涉及额度的写操作在单个事务内完成，行锁与条件更新由实现负责。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::params::*;
use crate::error::Result;
use crate::models::{
    Account, AccountStatus, Activity, ActivityView, Attendance, AttendanceStatus,
    AttendanceView, CategoryTotal, FinancialRecord, Gym, OperationLog, OverviewStats, Page,
    Pagination, QrCode, QrScan, QuotaLedgerEntry,
};

/// 租户仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait GymRepositoryTrait: Send + Sync {
    /// 在同一事务中创建健身房及首个管理员
    async fn create_with_admin(&self, gym: &NewGym, admin: &NewAccount) -> Result<(Gym, Account)>;
    async fn get(&self, id: i64) -> Result<Option<Gym>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Gym>>;
    async fn update(&self, id: i64, changes: &GymChanges) -> Result<Option<Gym>>;
}

/// 账号仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    async fn create(&self, account: &NewAccount) -> Result<Account>;
    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<Account>>;
    async fn get_by_email(&self, gym_id: i64, email: &str) -> Result<Option<Account>>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &AccountFilter,
        page: Pagination,
    ) -> Result<Page<Account>>;
    async fn update(
        &self,
        gym_id: i64,
        id: i64,
        changes: &AccountChanges,
    ) -> Result<Option<Account>>;
    async fn set_status(&self, gym_id: i64, id: i64, status: AccountStatus) -> Result<bool>;
    async fn set_password(&self, gym_id: i64, id: i64, password_hash: &str) -> Result<bool>;

    /// 登录失败计数加一，达到阈值时锁定并清零计数；返回锁定截止时间
    async fn record_login_failure(
        &self,
        id: i64,
        max_attempts: i32,
        lock_minutes: i64,
    ) -> Result<Option<DateTime<Utc>>>;
    async fn record_login_success(&self, id: i64) -> Result<()>;

    async fn count_active_admins(&self, gym_id: i64) -> Result<i64>;
    /// 是否存在签到、扫码、账本记录或负责的活动
    async fn has_history(&self, gym_id: i64, id: i64) -> Result<bool>;
    async fn delete(&self, gym_id: i64, id: i64) -> Result<bool>;
}

/// 额度账本仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait QuotaRepositoryTrait: Send + Sync {
    /// 条件更新额度并写入账本，结果为负时返回 InsufficientQuota
    async fn apply(&self, change: &QuotaChange) -> Result<QuotaLedgerEntry>;
    async fn list_ledger(
        &self,
        gym_id: i64,
        account_id: i64,
        page: Pagination,
    ) -> Result<Page<QuotaLedgerEntry>>;
}

/// 活动仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ActivityRepositoryTrait: Send + Sync {
    /// 单次或按周重复创建，全部在一个事务中写入
    async fn create_many(&self, activities: &[NewActivity]) -> Result<Vec<Activity>>;
    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<ActivityView>>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &ActivityFilter,
        page: Pagination,
    ) -> Result<Page<ActivityView>>;
    /// 锁定活动行后校验状态和容量再更新
    async fn update(
        &self,
        gym_id: i64,
        id: i64,
        changes: &ActivityChanges,
    ) -> Result<ActivityView>;
    /// 取消活动并全额退还所有 registered 预约
    async fn cancel(&self, gym_id: i64, id: i64, operator_id: i64)
    -> Result<ActivityCancellation>;
    /// 仅在不存在任何签到记录时删除
    async fn delete(&self, gym_id: i64, id: i64) -> Result<()>;
}

/// 签到仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AttendanceRepositoryTrait: Send + Sync {
    /// 锁定活动行，校验重复与容量，扣减额度并写入签到记录和账本
    async fn book(&self, booking: &NewBooking) -> Result<Attendance>;
    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<AttendanceView>>;
    /// 取消 registered 记录，`refund` 为 true 时退还预约时扣减的额度
    async fn cancel(
        &self,
        gym_id: i64,
        id: i64,
        refund: bool,
        operator_id: i64,
    ) -> Result<Attendance>;
    /// 条件状态迁移：仅当当前状态为 `from` 时更新为 `to`
    async fn transition(
        &self,
        gym_id: i64,
        id: i64,
        from: AttendanceStatus,
        to: AttendanceStatus,
    ) -> Result<Attendance>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &AttendanceFilter,
        page: Pagination,
    ) -> Result<Page<AttendanceView>>;
}

/// 二维码仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait QrCodeRepositoryTrait: Send + Sync {
    async fn create(&self, qr_code: &NewQrCode) -> Result<QrCode>;
    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<QrCode>>;
    async fn get_by_code(&self, gym_id: i64, code: &str) -> Result<Option<QrCode>>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &QrCodeFilter,
        page: Pagination,
    ) -> Result<Page<QrCode>>;
    async fn set_active(&self, gym_id: i64, id: i64, active: bool) -> Result<Option<QrCode>>;
    /// 仅在从未被扫描时删除
    async fn delete(&self, gym_id: i64, id: i64) -> Result<()>;

    async fn find_scan_by_idempotency_key(&self, gym_id: i64, key: &str)
    -> Result<Option<QrScan>>;
    async fn count_member_scans(&self, gym_id: i64, qr_code_id: i64, member_id: i64)
    -> Result<i64>;
    /// 锁定二维码行，复核使用限制，变动额度并写入扫码记录、账本和可选的收入记录
    async fn apply_scan(&self, command: &ScanCommand) -> Result<QrScan>;
    async fn list_scans(
        &self,
        gym_id: i64,
        qr_code_id: i64,
        page: Pagination,
    ) -> Result<Page<QrScan>>;
}

/// 财务记录仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait FinanceRepositoryTrait: Send + Sync {
    async fn create(&self, record: &NewFinancialRecord) -> Result<FinancialRecord>;
    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<FinancialRecord>>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &FinanceFilter,
        page: Pagination,
    ) -> Result<Page<FinancialRecord>>;
    async fn update(
        &self,
        gym_id: i64,
        id: i64,
        changes: &FinanceChanges,
    ) -> Result<Option<FinancialRecord>>;
    async fn delete(&self, gym_id: i64, id: i64) -> Result<bool>;
    async fn totals(&self, gym_id: i64, from: NaiveDate, to: NaiveDate)
    -> Result<Vec<CategoryTotal>>;
}

/// 看板统计仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait StatsRepositoryTrait: Send + Sync {
    async fn overview(&self, gym_id: i64, window: StatsWindow) -> Result<OverviewStats>;
}

/// 操作日志仓储接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait OperationLogRepositoryTrait: Send + Sync {
    async fn create(&self, log: &NewOperationLog) -> Result<i64>;
    async fn list(
        &self,
        gym_id: i64,
        filter: &OperationLogFilter,
        page: Pagination,
    ) -> Result<Page<OperationLog>>;
}
