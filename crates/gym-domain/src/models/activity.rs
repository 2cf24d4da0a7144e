//! 课程活动实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ActivityStatus;

/// 课程活动
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub gym_id: i64,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 负责教练（有效的教练或管理员）
    #[sqlx(default)]
    pub trainer_id: Option<i64>,
    #[sqlx(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// 容量上限，None 表示不限
    #[sqlx(default)]
    pub capacity: Option<i32>,
    /// 每次预约扣减的额度
    pub quota_cost: i32,
    pub status: ActivityStatus,
    /// 按周重复创建的同一系列共享此 ID
    #[sqlx(default)]
    pub series_id: Option<Uuid>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn is_cancelled(&self) -> bool {
        self.status == ActivityStatus::Cancelled
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at
    }

    /// 指定账号是否为该活动的负责教练
    pub fn is_trained_by(&self, account_id: i64) -> bool {
        self.trainer_id == Some(account_id)
    }
}

/// 活动视图，附带已占用名额
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub activity: Activity,
    /// registered / attended / absent 记录数
    pub booked_count: i64,
}

impl ActivityView {
    /// 剩余名额，不限容量时为 None
    pub fn remaining(&self) -> Option<i64> {
        self.activity
            .capacity
            .map(|c| (c as i64 - self.booked_count).max(0))
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == Some(0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_capacity() {
        let mut activity = fixtures::activity(1);
        activity.capacity = Some(3);
        let view = fixtures::view(activity.clone(), 2);
        assert_eq!(view.remaining(), Some(1));
        assert!(!view.is_full());

        let view = fixtures::view(activity.clone(), 3);
        assert!(view.is_full());

        activity.capacity = None;
        let view = fixtures::view(activity, 1000);
        assert_eq!(view.remaining(), None);
        assert!(!view.is_full());
    }

    #[test]
    fn test_view_serializes_flat() {
        let view = fixtures::view(fixtures::activity(4), 2);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["bookedCount"], 2);
        assert_eq!(json["quotaCost"], 1);
    }
}
