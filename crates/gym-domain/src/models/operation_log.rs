//! 操作日志实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 操作日志
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperationLog {
    pub id: i64,
    pub gym_id: i64,
    pub operator_id: i64,
    #[sqlx(default)]
    pub operator_name: Option<String>,
    pub module: String,
    pub action: String,
    #[sqlx(default)]
    pub target_type: Option<String>,
    #[sqlx(default)]
    pub target_id: Option<String>,
    #[sqlx(default)]
    pub ip_address: Option<String>,
    #[sqlx(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
