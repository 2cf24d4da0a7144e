//! 签到仓储

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use super::activity_repo::ActivityRepository;
use super::params::{AttendanceFilter, NewBooking, QuotaChange};
use super::quota_repo::QuotaRepository;
use super::traits::AttendanceRepositoryTrait;
use crate::error::{GymError, Result, is_unique_violation};
use crate::models::{Attendance, AttendanceStatus, AttendanceView, ChangeType, Page, Pagination, RefType};

const ATTENDANCE_COLUMNS: &str = "id, gym_id, activity_id, member_id, status, accessible, \
     quota_charged, booked_by, checked_in_at, cancelled_at, created_at, updated_at";

const ATTENDANCE_VIEW_SELECT: &str = r#"
    SELECT t.id, t.gym_id, t.activity_id, t.member_id, t.status, t.accessible,
           t.quota_charged, t.booked_by, t.checked_in_at, t.cancelled_at,
           t.created_at, t.updated_at,
           a.name AS activity_name, a.starts_at, a.ends_at, a.trainer_id,
           m.full_name AS member_name
    FROM attendance t
    JOIN activities a ON a.id = t.activity_id
    JOIN accounts m ON m.id = t.member_id
"#;

const ACCESSIBLE_INDEX: &str = "uq_attendance_accessible";

/// 签到仓储
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_in_tx(conn: &mut PgConnection, gym_id: i64, id: i64) -> Result<Attendance> {
        sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE gym_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(GymError::AttendanceNotFound(id))
    }
}

fn invalid_state(attendance: &Attendance) -> GymError {
    GymError::InvalidAttendanceState {
        attendance_id: attendance.id,
        current_status: attendance.status.as_str().to_string(),
    }
}

#[async_trait]
impl AttendanceRepositoryTrait for AttendanceRepository {
    async fn book(&self, booking: &NewBooking) -> Result<Attendance> {
        let mut tx = self.pool.begin().await?;

        let activity =
            ActivityRepository::lock_in_tx(&mut tx, booking.gym_id, booking.activity_id).await?;
        if activity.is_cancelled() {
            return Err(GymError::ActivityCancelled(activity.id));
        }
        if activity.has_started(Utc::now()) {
            return Err(GymError::ActivityStarted(activity.id));
        }

        let already: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM attendance
                WHERE activity_id = $1 AND member_id = $2 AND accessible
            )
            "#,
        )
        .bind(booking.activity_id)
        .bind(booking.member_id)
        .fetch_one(&mut *tx)
        .await?;
        if already.0 {
            return Err(GymError::AlreadyBooked {
                activity_id: booking.activity_id,
                member_id: booking.member_id,
            });
        }

        if let Some(capacity) = activity.capacity {
            let booked = ActivityRepository::count_booked_in_tx(&mut tx, activity.id).await?;
            if booked >= capacity as i64 {
                return Err(GymError::ActivityFull(activity.id));
            }
        }

        let attendance = sqlx::query_as::<_, Attendance>(&format!(
            r#"
            INSERT INTO attendance
                (gym_id, activity_id, member_id, status, accessible, quota_charged, booked_by)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6)
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(booking.gym_id)
        .bind(booking.activity_id)
        .bind(booking.member_id)
        .bind(AttendanceStatus::Registered)
        .bind(activity.quota_cost)
        .bind(booking.booked_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ACCESSIBLE_INDEX) {
                GymError::AlreadyBooked {
                    activity_id: booking.activity_id,
                    member_id: booking.member_id,
                }
            } else {
                GymError::Database(e)
            }
        })?;

        if activity.quota_cost > 0 {
            QuotaRepository::apply_in_tx(
                &mut tx,
                &QuotaChange {
                    gym_id: booking.gym_id,
                    account_id: booking.member_id,
                    change_type: ChangeType::AttendanceCharge,
                    delta: -activity.quota_cost,
                    ref_type: Some(RefType::Attendance),
                    ref_id: Some(attendance.id),
                    remark: Some(activity.name.clone()),
                    operator_id: Some(booking.booked_by),
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(attendance)
    }

    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<AttendanceView>> {
        let view = sqlx::query_as::<_, AttendanceView>(&format!(
            "{ATTENDANCE_VIEW_SELECT} WHERE t.gym_id = $1 AND t.id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(view)
    }

    async fn cancel(
        &self,
        gym_id: i64,
        id: i64,
        refund: bool,
        operator_id: i64,
    ) -> Result<Attendance> {
        let mut tx = self.pool.begin().await?;

        let current = Self::lock_in_tx(&mut tx, gym_id, id).await?;
        if current.status != AttendanceStatus::Registered {
            return Err(invalid_state(&current));
        }

        let cancelled = sqlx::query_as::<_, Attendance>(&format!(
            r#"
            UPDATE attendance
            SET status = $3, accessible = FALSE, cancelled_at = NOW(), updated_at = NOW()
            WHERE gym_id = $1 AND id = $2
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(AttendanceStatus::Cancelled)
        .fetch_one(&mut *tx)
        .await?;

        if refund && current.quota_charged > 0 {
            QuotaRepository::apply_in_tx(
                &mut tx,
                &QuotaChange {
                    gym_id,
                    account_id: current.member_id,
                    change_type: ChangeType::AttendanceRefund,
                    delta: current.quota_charged,
                    ref_type: Some(RefType::Attendance),
                    ref_id: Some(id),
                    remark: None,
                    operator_id: Some(operator_id),
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(cancelled)
    }

    async fn transition(
        &self,
        gym_id: i64,
        id: i64,
        from: AttendanceStatus,
        to: AttendanceStatus,
    ) -> Result<Attendance> {
        let updated = sqlx::query_as::<_, Attendance>(&format!(
            r#"
            UPDATE attendance
            SET status = $4,
                accessible = $5,
                checked_in_at = CASE WHEN $4 = 'attended' THEN NOW() ELSE checked_in_at END,
                updated_at = NOW()
            WHERE gym_id = $1 AND id = $2 AND status = $3
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(to.is_accessible())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attendance) = updated {
            return Ok(attendance);
        }

        let current = sqlx::query_as::<_, Attendance>(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE gym_id = $1 AND id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(GymError::AttendanceNotFound(id))?;

        Err(invalid_state(&current))
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &AttendanceFilter,
        page: Pagination,
    ) -> Result<Page<AttendanceView>> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM attendance t
            JOIN activities a ON a.id = t.activity_id
            WHERE t.gym_id = $1
              AND ($2::bigint IS NULL OR t.activity_id = $2)
              AND ($3::bigint IS NULL OR t.member_id = $3)
              AND ($4::varchar IS NULL OR t.status = $4)
              AND ($5::timestamptz IS NULL OR a.starts_at >= $5)
              AND ($6::timestamptz IS NULL OR a.starts_at < $6)
            "#,
        )
        .bind(gym_id)
        .bind(filter.activity_id)
        .bind(filter.member_id)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, AttendanceView>(&format!(
            r#"
            {ATTENDANCE_VIEW_SELECT}
            WHERE t.gym_id = $1
              AND ($2::bigint IS NULL OR t.activity_id = $2)
              AND ($3::bigint IS NULL OR t.member_id = $3)
              AND ($4::varchar IS NULL OR t.status = $4)
              AND ($5::timestamptz IS NULL OR a.starts_at >= $5)
              AND ($6::timestamptz IS NULL OR a.starts_at < $6)
            ORDER BY a.starts_at DESC, t.id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(gym_id)
        .bind(filter.activity_id)
        .bind(filter.member_id)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total.0))
    }
}
