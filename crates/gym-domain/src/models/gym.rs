//! 租户（健身房）实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 健身房
///
/// 数据隔离单元，其余实体都带有 `gym_id`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gym {
    pub id: i64,
    pub name: String,
    /// 登录时使用的唯一标识
    pub slug: String,
    /// ISO 4217 货币代码
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
