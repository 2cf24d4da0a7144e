//! 看板统计模型

use serde::{Deserialize, Serialize};

use super::enums::{AccountStatus, Role};

/// 按角色和状态统计的账号数
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountCount {
    pub role: Role,
    pub status: AccountStatus,
    pub count: i64,
}

/// 看板概览
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub accounts: Vec<AccountCount>,
    /// 未来 7 天内的活动数
    pub upcoming_activities: i64,
    /// 本月预约数（不含已取消）
    pub bookings_this_month: i64,
    pub check_ins_this_month: i64,
    /// 所有会员剩余额度合计
    pub outstanding_quota: i64,
    /// 以下两项仅管理员可见，其他角色为 0
    pub income_cents_this_month: i64,
    pub expense_cents_this_month: i64,
}

impl OverviewStats {
    /// 隐藏财务字段
    pub fn without_finance(mut self) -> Self {
        self.income_cents_this_month = 0;
        self.expense_cents_this_month = 0;
        self
    }
}
