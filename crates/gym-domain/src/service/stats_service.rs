//! 看板统计服务
//!
//! ## 缓存策略
//!
//! - 按健身房缓存完整统计，TTL 由 `business.stats_cache_secs` 配置
//! - 写操作不主动失效，依赖短 TTL
//! - 非管理员读取时隐藏财务字段
//! - Redis 不可用时直接查库

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use gym_shared::cache::{Cache, CacheKey};

use crate::error::{GymError, Result};
use crate::models::{Actor, OverviewStats};
use crate::repository::{StatsRepositoryTrait, StatsWindow};

const UPCOMING_DAYS: i64 = 7;

pub struct StatsService {
    stats_repo: Arc<dyn StatsRepositoryTrait>,
    cache: Option<Arc<Cache>>,
    ttl: Duration,
}

impl StatsService {
    pub fn new(
        stats_repo: Arc<dyn StatsRepositoryTrait>,
        cache: Option<Arc<Cache>>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            stats_repo,
            cache,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub async fn overview(&self, actor: &Actor) -> Result<OverviewStats> {
        if !actor.is_staff() {
            return Err(GymError::Forbidden("无权查看统计数据".to_string()));
        }

        let stats = self.cached_overview(actor.gym_id).await?;
        if actor.is_admin() {
            Ok(stats)
        } else {
            Ok(stats.without_finance())
        }
    }

    async fn cached_overview(&self, gym_id: i64) -> Result<OverviewStats> {
        let key = CacheKey::stats_overview(gym_id);

        if let Some(cache) = &self.cache {
            match cache.get::<OverviewStats>(&key).await {
                Ok(Some(stats)) => {
                    debug!(gym_id, "统计缓存命中");
                    return Ok(stats);
                }
                Ok(None) => {}
                Err(e) => warn!(gym_id, error = %e, "读取统计缓存失败"),
            }
        }

        let stats = self
            .stats_repo
            .overview(gym_id, stats_window(Utc::now()))
            .await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &stats, self.ttl).await {
                warn!(gym_id, error = %e, "写入统计缓存失败");
            }
        }

        Ok(stats)
    }
}

/// 统计时间边界：未来 7 天与本自然月（UTC）
///
/// 月份区间左闭右开：`[本月 1 日, 下月 1 日)`
pub fn stats_window(now: DateTime<Utc>) -> StatsWindow {
    let today = now.date_naive();
    let month_start_date = today - chrono::Duration::days(today.day0() as i64);
    let month_end_date = month_start_date
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);

    StatsWindow {
        now,
        upcoming_until: now + chrono::Duration::days(UPCOMING_DAYS),
        month_start: month_start_date.and_time(NaiveTime::MIN).and_utc(),
        month_end: month_end_date.and_time(NaiveTime::MIN).and_utc(),
        month_start_date,
        month_end_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repository::MockStatsRepositoryTrait;
    use chrono::TimeZone;

    fn stats() -> OverviewStats {
        OverviewStats {
            upcoming_activities: 4,
            income_cents_this_month: 120_000,
            expense_cents_this_month: 80_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_window() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 15, 30, 0).unwrap();
        let window = stats_window(now);
        assert_eq!(
            window.month_start_date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert_eq!(
            window.month_start,
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.upcoming_until,
            Utc.with_ymd_and_hms(2024, 3, 7, 15, 30, 0).unwrap()
        );
        assert_eq!(
            window.month_end_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            window.month_end,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_stats_window_december_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let window = stats_window(now);
        assert_eq!(
            window.month_start_date,
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
        );
        assert_eq!(
            window.month_end_date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
        assert_eq!(
            window.month_end,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(window.now < window.month_end);
    }

    #[tokio::test]
    async fn test_admin_sees_finance_trainer_does_not() {
        let mut repo = MockStatsRepositoryTrait::new();
        repo.expect_overview()
            .withf(|gym_id, _| *gym_id == 1)
            .times(2)
            .returning(|_, _| Ok(stats()));

        let service = StatsService::new(Arc::new(repo), None, 60);

        let admin = Actor::new(1, 1, Role::Admin);
        let full = service.overview(&admin).await.unwrap();
        assert_eq!(full.income_cents_this_month, 120_000);

        let trainer = Actor::new(7, 1, Role::Trainer);
        let hidden = service.overview(&trainer).await.unwrap();
        assert_eq!(hidden.income_cents_this_month, 0);
        assert_eq!(hidden.expense_cents_this_month, 0);
        assert_eq!(hidden.upcoming_activities, 4);
    }

    #[tokio::test]
    async fn test_member_is_forbidden() {
        let mut repo = MockStatsRepositoryTrait::new();
        repo.expect_overview().never();
        let service = StatsService::new(Arc::new(repo), None, 60);

        let member = Actor::new(5, 1, Role::Member);
        assert!(matches!(
            service.overview(&member).await,
            Err(GymError::Forbidden(_))
        ));
    }
}
