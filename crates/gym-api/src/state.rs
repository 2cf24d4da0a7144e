//! 应用状态定义
//!
//! 包含 Axum 路由共享的业务服务、JWT 管理器和基础设施客户端

use std::sync::Arc;

use sqlx::PgPool;

use gym_domain::repository::{
    AccountRepository, AccountRepositoryTrait, ActivityRepository, ActivityRepositoryTrait,
    AttendanceRepository, AttendanceRepositoryTrait, FinanceRepository, FinanceRepositoryTrait,
    GymRepository, GymRepositoryTrait, OperationLogRepository, OperationLogRepositoryTrait,
    QrCodeRepository, QrCodeRepositoryTrait, QuotaRepository, QuotaRepositoryTrait,
    StatsRepository, StatsRepositoryTrait,
};
use gym_domain::service::{
    AccountService, ActivityService, AttendanceService, AuditService, FinanceService, GymService,
    LoginPolicy, QrCodeService, QuotaService, StatsService,
};
use gym_shared::cache::Cache;
use gym_shared::config::AppConfig;
use gym_shared::database::Database;

use crate::auth::{JwtConfig, JwtManager};
use crate::middleware::RateLimitConfig;

/// 全部仓储实现
///
/// 生产环境使用 PostgreSQL 实现，测试中替换为 mock
#[derive(Clone)]
pub struct Repositories {
    pub gyms: Arc<dyn GymRepositoryTrait>,
    pub accounts: Arc<dyn AccountRepositoryTrait>,
    pub quota: Arc<dyn QuotaRepositoryTrait>,
    pub activities: Arc<dyn ActivityRepositoryTrait>,
    pub attendance: Arc<dyn AttendanceRepositoryTrait>,
    pub qr_codes: Arc<dyn QrCodeRepositoryTrait>,
    pub finance: Arc<dyn FinanceRepositoryTrait>,
    pub stats: Arc<dyn StatsRepositoryTrait>,
    pub operation_logs: Arc<dyn OperationLogRepositoryTrait>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            gyms: Arc::new(GymRepository::new(pool.clone())),
            accounts: Arc::new(AccountRepository::new(pool.clone())),
            quota: Arc::new(QuotaRepository::new(pool.clone())),
            activities: Arc::new(ActivityRepository::new(pool.clone())),
            attendance: Arc::new(AttendanceRepository::new(pool.clone())),
            qr_codes: Arc::new(QrCodeRepository::new(pool.clone())),
            finance: Arc::new(FinanceRepository::new(pool.clone())),
            stats: Arc::new(StatsRepository::new(pool.clone())),
            operation_logs: Arc::new(OperationLogRepository::new(pool)),
        }
    }
}

/// Axum 应用共享状态
///
/// 所有字段都是 Arc 或可廉价克隆的句柄
#[derive(Clone)]
pub struct AppState {
    pub gym_service: Arc<GymService>,
    pub account_service: Arc<AccountService>,
    pub quota_service: Arc<QuotaService>,
    pub activity_service: Arc<ActivityService>,
    pub attendance_service: Arc<AttendanceService>,
    pub qr_service: Arc<QrCodeService>,
    pub finance_service: Arc<FinanceService>,
    pub stats_service: Arc<StatsService>,
    pub audit_service: Arc<AuditService>,
    pub jwt_manager: Arc<JwtManager>,
    pub rate_limit: Arc<RateLimitConfig>,
    /// Redis 不可用时为空，统计缓存和限流随之跳过
    pub cache: Option<Arc<Cache>>,
    /// 就绪检查使用，路由测试中为空
    pub database: Option<Database>,
}

impl AppState {
    /// 用仓储和配置组装全部业务服务
    pub fn new(
        repos: Repositories,
        config: &AppConfig,
        cache: Option<Arc<Cache>>,
        database: Option<Database>,
    ) -> Self {
        let login_policy = LoginPolicy {
            max_failed_logins: config.auth.max_failed_logins,
            lock_minutes: config.auth.lock_minutes,
        };

        Self {
            gym_service: Arc::new(GymService::new(
                repos.gyms.clone(),
                config.business.default_currency.clone(),
            )),
            account_service: Arc::new(AccountService::new(
                repos.gyms.clone(),
                repos.accounts.clone(),
                login_policy,
            )),
            quota_service: Arc::new(QuotaService::new(
                repos.quota.clone(),
                repos.accounts.clone(),
            )),
            activity_service: Arc::new(ActivityService::new(
                repos.activities.clone(),
                repos.accounts.clone(),
            )),
            attendance_service: Arc::new(AttendanceService::new(
                repos.attendance.clone(),
                repos.activities.clone(),
                repos.accounts.clone(),
                config.business.check_in_open_minutes,
            )),
            qr_service: Arc::new(QrCodeService::new(
                repos.qr_codes.clone(),
                repos.accounts.clone(),
                repos.gyms.clone(),
            )),
            finance_service: Arc::new(FinanceService::new(
                repos.finance.clone(),
                repos.gyms.clone(),
                repos.accounts.clone(),
            )),
            stats_service: Arc::new(StatsService::new(
                repos.stats.clone(),
                cache.clone(),
                config.business.stats_cache_secs,
            )),
            audit_service: Arc::new(AuditService::new(repos.operation_logs.clone())),
            jwt_manager: Arc::new(JwtManager::new(JwtConfig::from(&config.auth))),
            rate_limit: Arc::new(RateLimitConfig::default()),
            cache,
            database,
        }
    }
}
