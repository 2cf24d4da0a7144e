//! 活动仓储
//!
//! 预约、改容量、取消都会先对活动行加 FOR UPDATE 锁，
//! 名额统计在锁内进行，避免超卖

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::params::{ActivityCancellation, ActivityChanges, ActivityFilter, NewActivity, QuotaChange};
use super::quota_repo::QuotaRepository;
use super::traits::ActivityRepositoryTrait;
use crate::error::{GymError, Result};
use crate::models::{
    Activity, ActivityStatus, ActivityView, ChangeType, Page, Pagination, RefType,
};

const ACTIVITY_COLUMNS: &str = "id, gym_id, name, description, trainer_id, location, starts_at, \
     ends_at, capacity, quota_cost, status, series_id, created_by, created_at, updated_at";

const ACTIVITY_VIEW_SELECT: &str = r#"
    SELECT a.id, a.gym_id, a.name, a.description, a.trainer_id, a.location, a.starts_at,
           a.ends_at, a.capacity, a.quota_cost, a.status, a.series_id, a.created_by,
           a.created_at, a.updated_at,
           (SELECT COUNT(*) FROM attendance t WHERE t.activity_id = a.id AND t.accessible) AS booked_count
    FROM activities a
"#;

/// 活动仓储
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中锁定活动行
    pub async fn lock_in_tx(conn: &mut PgConnection, gym_id: i64, id: i64) -> Result<Activity> {
        sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE gym_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(GymError::ActivityNotFound(id))
    }

    /// 统计占用名额的签到记录数
    pub async fn count_booked_in_tx(conn: &mut PgConnection, activity_id: i64) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM attendance WHERE activity_id = $1 AND accessible")
                .bind(activity_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl ActivityRepositoryTrait for ActivityRepository {
    async fn create_many(&self, activities: &[NewActivity]) -> Result<Vec<Activity>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(activities.len());

        for activity in activities {
            let row = sqlx::query_as::<_, Activity>(&format!(
                r#"
                INSERT INTO activities
                    (gym_id, name, description, trainer_id, location, starts_at, ends_at,
                     capacity, quota_cost, status, series_id, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING {ACTIVITY_COLUMNS}
                "#
            ))
            .bind(activity.gym_id)
            .bind(&activity.name)
            .bind(&activity.description)
            .bind(activity.trainer_id)
            .bind(&activity.location)
            .bind(activity.starts_at)
            .bind(activity.ends_at)
            .bind(activity.capacity)
            .bind(activity.quota_cost)
            .bind(ActivityStatus::Scheduled)
            .bind(activity.series_id)
            .bind(activity.created_by)
            .fetch_one(&mut *tx)
            .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<ActivityView>> {
        let view = sqlx::query_as::<_, ActivityView>(&format!(
            "{ACTIVITY_VIEW_SELECT} WHERE a.gym_id = $1 AND a.id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(view)
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &ActivityFilter,
        page: Pagination,
    ) -> Result<Page<ActivityView>> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM activities a
            WHERE a.gym_id = $1
              AND ($2::timestamptz IS NULL OR a.starts_at >= $2)
              AND ($3::timestamptz IS NULL OR a.starts_at < $3)
              AND ($4::bigint IS NULL OR a.trainer_id = $4)
              AND ($5::varchar IS NULL OR a.status = $5)
            "#,
        )
        .bind(gym_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.trainer_id)
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, ActivityView>(&format!(
            r#"
            {ACTIVITY_VIEW_SELECT}
            WHERE a.gym_id = $1
              AND ($2::timestamptz IS NULL OR a.starts_at >= $2)
              AND ($3::timestamptz IS NULL OR a.starts_at < $3)
              AND ($4::bigint IS NULL OR a.trainer_id = $4)
              AND ($5::varchar IS NULL OR a.status = $5)
            ORDER BY a.starts_at ASC, a.id ASC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(gym_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.trainer_id)
        .bind(filter.status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total.0))
    }

    async fn update(
        &self,
        gym_id: i64,
        id: i64,
        changes: &ActivityChanges,
    ) -> Result<ActivityView> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_in_tx(&mut tx, gym_id, id).await?;
        if current.is_cancelled() {
            return Err(GymError::ActivityCancelled(id));
        }

        let booked = Self::count_booked_in_tx(&mut tx, id).await?;
        if let Some(capacity) = changes.capacity {
            if (capacity as i64) < booked {
                return Err(GymError::CapacityBelowBookings { capacity, booked });
            }
        }

        let activity = sqlx::query_as::<_, Activity>(&format!(
            r#"
            UPDATE activities
            SET name = $3, description = $4, trainer_id = $5, location = $6,
                starts_at = $7, ends_at = $8, capacity = $9, quota_cost = $10,
                updated_at = NOW()
            WHERE gym_id = $1 AND id = $2
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.trainer_id)
        .bind(&changes.location)
        .bind(changes.starts_at)
        .bind(changes.ends_at)
        .bind(changes.capacity)
        .bind(changes.quota_cost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ActivityView {
            activity,
            booked_count: booked,
        })
    }

    async fn cancel(
        &self,
        gym_id: i64,
        id: i64,
        operator_id: i64,
    ) -> Result<ActivityCancellation> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_in_tx(&mut tx, gym_id, id).await?;
        if current.is_cancelled() {
            return Err(GymError::ActivityCancelled(id));
        }

        sqlx::query("UPDATE activities SET status = $3, updated_at = NOW() WHERE gym_id = $1 AND id = $2")
            .bind(gym_id)
            .bind(id)
            .bind(ActivityStatus::Cancelled)
            .execute(&mut *tx)
            .await?;

        // 只有 registered 的预约随活动取消并退款，已签到和缺席记录保持不变
        let cancelled: Vec<(i64, i64, i32)> = sqlx::query_as(
            r#"
            UPDATE attendance
            SET status = 'cancelled', accessible = FALSE, cancelled_at = NOW(), updated_at = NOW()
            WHERE gym_id = $1 AND activity_id = $2 AND status = 'registered'
            RETURNING id, member_id, quota_charged
            "#,
        )
        .bind(gym_id)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut refunded_quota = 0i64;
        for (attendance_id, member_id, quota_charged) in &cancelled {
            if *quota_charged <= 0 {
                continue;
            }
            QuotaRepository::apply_in_tx(
                &mut tx,
                &QuotaChange {
                    gym_id,
                    account_id: *member_id,
                    change_type: ChangeType::AttendanceRefund,
                    delta: *quota_charged,
                    ref_type: Some(RefType::Attendance),
                    ref_id: Some(*attendance_id),
                    remark: Some("activity cancelled".to_string()),
                    operator_id: Some(operator_id),
                },
            )
            .await?;
            refunded_quota += *quota_charged as i64;
        }

        tx.commit().await?;

        Ok(ActivityCancellation {
            activity_id: id,
            cancelled_bookings: cancelled.len() as i64,
            refunded_quota,
        })
    }

    async fn delete(&self, gym_id: i64, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        Self::lock_in_tx(&mut tx, gym_id, id).await?;

        let has_attendance: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM attendance WHERE activity_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_attendance.0 {
            return Err(GymError::ActivityHasAttendance(id));
        }

        sqlx::query("DELETE FROM activities WHERE gym_id = $1 AND id = $2")
            .bind(gym_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
