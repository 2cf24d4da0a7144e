//! 额度账本实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ChangeType, RefType};

/// 额度账本记录
///
/// 每一次额度变动都落一条记录，账号额度恒等于其账本 delta 之和
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLedgerEntry {
    pub id: i64,
    pub gym_id: i64,
    pub account_id: i64,
    pub change_type: ChangeType,
    /// 带符号的变动量，非零
    pub delta: i32,
    pub balance_after: i32,
    #[sqlx(default)]
    pub ref_type: Option<RefType>,
    #[sqlx(default)]
    pub ref_id: Option<i64>,
    #[sqlx(default)]
    pub remark: Option<String>,
    #[sqlx(default)]
    pub operator_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
