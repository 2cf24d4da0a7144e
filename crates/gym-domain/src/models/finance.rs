//! 财务记录实体

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{FinanceCategory, FinanceKind};

/// 财务记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRecord {
    pub id: i64,
    pub gym_id: i64,
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    /// 金额（分），恒为正
    pub amount_cents: i64,
    pub currency: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 关联会员
    #[sqlx(default)]
    pub account_id: Option<i64>,
    /// 由扫码生成时指向对应的扫码记录
    #[sqlx(default)]
    pub qr_scan_id: Option<i64>,
    pub recorded_by: i64,
    pub occurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancialRecord {
    /// 扫码生成的记录不可修改或删除
    pub fn is_locked(&self) -> bool {
        self.qr_scan_id.is_some()
    }
}

/// 按 (收支类型, 分类) 汇总
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub kind: FinanceKind,
    pub category: FinanceCategory,
    pub total_cents: i64,
    pub count: i64,
}

/// 财务汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub income_cents: i64,
    pub expense_cents: i64,
    pub net_cents: i64,
    pub by_category: Vec<CategoryTotal>,
}

impl FinanceSummary {
    pub fn from_totals(from: NaiveDate, to: NaiveDate, by_category: Vec<CategoryTotal>) -> Self {
        let sum = |kind: FinanceKind| -> i64 {
            by_category
                .iter()
                .filter(|t| t.kind == kind)
                .map(|t| t.total_cents)
                .sum()
        };
        let income_cents = sum(FinanceKind::Income);
        let expense_cents = sum(FinanceKind::Expense);

        Self {
            from,
            to,
            income_cents,
            expense_cents,
            net_cents: income_cents - expense_cents,
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_totals() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let totals = vec![
            CategoryTotal {
                kind: FinanceKind::Income,
                category: FinanceCategory::Membership,
                total_cents: 50_000,
                count: 5,
            },
            CategoryTotal {
                kind: FinanceKind::Income,
                category: FinanceCategory::QuotaPack,
                total_cents: 12_000,
                count: 3,
            },
            CategoryTotal {
                kind: FinanceKind::Expense,
                category: FinanceCategory::Rent,
                total_cents: 80_000,
                count: 1,
            },
        ];

        let summary = FinanceSummary::from_totals(day, day, totals);
        assert_eq!(summary.income_cents, 62_000);
        assert_eq!(summary.expense_cents, 80_000);
        assert_eq!(summary.net_cents, -18_000);
        assert_eq!(summary.by_category.len(), 3);
    }
}
