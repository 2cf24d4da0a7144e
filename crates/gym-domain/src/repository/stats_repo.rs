//! 看板统计仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::params::StatsWindow;
use super::traits::StatsRepositoryTrait;
use crate::error::Result;
use crate::models::{AccountCount, OverviewStats};

/// 看板统计仓储
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepositoryTrait for StatsRepository {
    async fn overview(&self, gym_id: i64, window: StatsWindow) -> Result<OverviewStats> {
        let accounts = sqlx::query_as::<_, AccountCount>(
            r#"
            SELECT role, status, COUNT(*) AS count
            FROM accounts
            WHERE gym_id = $1
            GROUP BY role, status
            ORDER BY role, status
            "#,
        )
        .bind(gym_id)
        .fetch_all(&self.pool)
        .await?;

        let (upcoming_activities,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM activities
            WHERE gym_id = $1 AND status = 'scheduled'
              AND starts_at >= $2 AND starts_at < $3
            "#,
        )
        .bind(gym_id)
        .bind(window.now)
        .bind(window.upcoming_until)
        .fetch_one(&self.pool)
        .await?;

        let (bookings_this_month, check_ins_this_month): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE t.accessible),
                   COUNT(*) FILTER (WHERE t.status = 'attended')
            FROM attendance t
            JOIN activities a ON a.id = t.activity_id
            WHERE t.gym_id = $1 AND a.starts_at >= $2 AND a.starts_at < $3
            "#,
        )
        .bind(gym_id)
        .bind(window.month_start)
        .bind(window.month_end)
        .fetch_one(&self.pool)
        .await?;

        let (outstanding_quota,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(quota), 0)::bigint FROM accounts WHERE gym_id = $1",
        )
        .bind(gym_id)
        .fetch_one(&self.pool)
        .await?;

        let (income_cents_this_month, expense_cents_this_month): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents) FILTER (WHERE kind = 'income'), 0)::bigint,
                   COALESCE(SUM(amount_cents) FILTER (WHERE kind = 'expense'), 0)::bigint
            FROM financial_records
            WHERE gym_id = $1 AND occurred_on >= $2 AND occurred_on < $3
            "#,
        )
        .bind(gym_id)
        .bind(window.month_start_date)
        .bind(window.month_end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(OverviewStats {
            accounts,
            upcoming_activities,
            bookings_this_month,
            check_ins_this_month,
            outstanding_quota,
            income_cents_this_month,
            expense_cents_this_month,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinanceCategory, FinanceKind};
    use crate::repository::params::{NewBooking, NewFinancialRecord};
    use crate::repository::test_support::TestGym;
    use crate::repository::{
        AttendanceRepository, AttendanceRepositoryTrait, FinanceRepository,
        FinanceRepositoryTrait,
    };
    use crate::service::stats_service::stats_window;
    use chrono::{Duration, NaiveDate, Utc};

    async fn record(gym: &TestGym, kind: FinanceKind, amount_cents: i64, occurred_on: NaiveDate) {
        FinanceRepository::new(gym.pool.clone())
            .create(&NewFinancialRecord {
                gym_id: gym.gym_id,
                kind,
                category: FinanceCategory::Other,
                amount_cents,
                currency: "EUR".to_string(),
                description: None,
                account_id: None,
                recorded_by: gym.admin_id,
                occurred_on,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_overview_excludes_next_month() {
        let gym = TestGym::create().await;
        let window = stats_window(Utc::now());

        record(&gym, FinanceKind::Income, 1000, window.month_start_date).await;
        record(&gym, FinanceKind::Expense, 300, window.month_end_date - Duration::days(1)).await;
        record(&gym, FinanceKind::Income, 5000, window.month_end_date).await;

        let member = gym.member(1).await;
        let next_month = gym
            .activity_at(window.month_end + Duration::days(1), None, 0)
            .await;
        AttendanceRepository::new(gym.pool.clone())
            .book(&NewBooking {
                gym_id: gym.gym_id,
                activity_id: next_month,
                member_id: member,
                booked_by: member,
            })
            .await
            .unwrap();

        let stats = StatsRepository::new(gym.pool.clone())
            .overview(gym.gym_id, window)
            .await
            .unwrap();
        assert_eq!(stats.income_cents_this_month, 1000);
        assert_eq!(stats.expense_cents_this_month, 300);
        assert_eq!(stats.bookings_this_month, 0);
        assert_eq!(stats.outstanding_quota, 1);

        gym.cleanup().await;
    }
}
