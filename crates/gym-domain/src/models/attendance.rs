//! 签到记录实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AttendanceStatus;

/// 签到记录
///
/// `accessible` 与状态保持一致：非 cancelled 即为 true。
/// 同一活动同一会员最多一条 accessible 记录（部分唯一索引）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i64,
    pub gym_id: i64,
    pub activity_id: i64,
    pub member_id: i64,
    pub status: AttendanceStatus,
    pub accessible: bool,
    /// 预约时实际扣减的额度，退款以此为准
    pub quota_charged: i32,
    pub booked_by: i64,
    #[sqlx(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 签到记录视图，附带活动和会员信息
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attendance: Attendance,
    pub activity_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[sqlx(default)]
    pub trainer_id: Option<i64>,
    pub member_name: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::Activity;

    pub fn attendance(id: i64, activity_id: i64, member_id: i64) -> Attendance {
        let now = Utc::now();
        Attendance {
            id,
            gym_id: 1,
            activity_id,
            member_id,
            status: AttendanceStatus::Registered,
            accessible: true,
            quota_charged: 1,
            booked_by: member_id,
            checked_in_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(attendance: Attendance, activity: &Activity) -> AttendanceView {
        AttendanceView {
            attendance,
            activity_name: activity.name.clone(),
            starts_at: activity.starts_at,
            ends_at: activity.ends_at,
            trainer_id: activity.trainer_id,
            member_name: "Member".to_string(),
        }
    }
}
