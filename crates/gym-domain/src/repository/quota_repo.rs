//! 额度账本仓储
//!
//! 额度只通过条件更新变动，同一事务内写入账本记录，保证
//! `accounts.quota == Σ quota_ledger.delta`

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::params::QuotaChange;
use super::traits::QuotaRepositoryTrait;
use crate::error::{GymError, Result};
use crate::models::{Page, Pagination, QuotaLedgerEntry};

const LEDGER_COLUMNS: &str = "id, gym_id, account_id, change_type, delta, balance_after, \
     ref_type, ref_id, remark, operator_id, created_at";

/// 额度账本仓储
pub struct QuotaRepository {
    pool: PgPool,
}

impl QuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中变动额度并写入账本
    ///
    /// 额度更新是单条条件语句，结果为负时不更新任何行。
    /// 失败时再读一次余额用于区分账号不存在和额度不足。
    pub async fn apply_in_tx(
        conn: &mut PgConnection,
        change: &QuotaChange,
    ) -> Result<QuotaLedgerEntry> {
        if change.delta == 0 {
            return Err(GymError::Validation("额度变动不能为 0".to_string()));
        }
        let sign = change.change_type.sign();
        if sign != 0 && change.delta.signum() != sign {
            return Err(GymError::Internal(format!(
                "额度变动方向与类型不符: {} {}",
                change.change_type.as_str(),
                change.delta
            )));
        }

        let balance: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET quota = quota + $3, updated_at = NOW()
            WHERE gym_id = $1 AND id = $2 AND quota + $3 >= 0
            RETURNING quota
            "#,
        )
        .bind(change.gym_id)
        .bind(change.account_id)
        .bind(change.delta)
        .fetch_optional(&mut *conn)
        .await?;

        let balance_after = match balance {
            Some((quota,)) => quota,
            None => {
                let current: Option<(i32,)> =
                    sqlx::query_as("SELECT quota FROM accounts WHERE gym_id = $1 AND id = $2")
                        .bind(change.gym_id)
                        .bind(change.account_id)
                        .fetch_optional(&mut *conn)
                        .await?;

                return Err(match current {
                    Some((available,)) => GymError::InsufficientQuota {
                        required: -change.delta,
                        available,
                    },
                    None => GymError::AccountNotFound(change.account_id),
                });
            }
        };

        let entry = sqlx::query_as::<_, QuotaLedgerEntry>(&format!(
            r#"
            INSERT INTO quota_ledger
                (gym_id, account_id, change_type, delta, balance_after, ref_type, ref_id, remark, operator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LEDGER_COLUMNS}
            "#
        ))
        .bind(change.gym_id)
        .bind(change.account_id)
        .bind(change.change_type)
        .bind(change.delta)
        .bind(balance_after)
        .bind(change.ref_type)
        .bind(change.ref_id)
        .bind(&change.remark)
        .bind(change.operator_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(entry)
    }
}

#[async_trait]
impl QuotaRepositoryTrait for QuotaRepository {
    async fn apply(&self, change: &QuotaChange) -> Result<QuotaLedgerEntry> {
        let mut tx = self.pool.begin().await?;
        let entry = Self::apply_in_tx(&mut tx, change).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn list_ledger(
        &self,
        gym_id: i64,
        account_id: i64,
        page: Pagination,
    ) -> Result<Page<QuotaLedgerEntry>> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM quota_ledger WHERE gym_id = $1 AND account_id = $2",
        )
        .bind(gym_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, QuotaLedgerEntry>(&format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM quota_ledger
            WHERE gym_id = $1 AND account_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(gym_id)
        .bind(account_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeType, RefType};
    use crate::repository::test_support::TestGym;

    fn adjust(gym_id: i64, account_id: i64, delta: i32) -> QuotaChange {
        QuotaChange {
            gym_id,
            account_id,
            change_type: ChangeType::ManualAdjust,
            delta,
            ref_type: Some(RefType::Manual),
            ref_id: None,
            remark: None,
            operator_id: None,
        }
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_apply_keeps_quota_equal_to_ledger_sum() {
        let gym = TestGym::create().await;
        let member = gym.member(5).await;
        let repo = QuotaRepository::new(gym.pool.clone());

        repo.apply(&adjust(gym.gym_id, member, 3)).await.unwrap();
        let entry = repo.apply(&adjust(gym.gym_id, member, -2)).await.unwrap();

        assert_eq!(entry.balance_after, 6);
        assert_eq!(gym.assert_balanced(member).await, 6);

        gym.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_apply_rejects_negative_balance() {
        let gym = TestGym::create().await;
        let member = gym.member(2).await;
        let repo = QuotaRepository::new(gym.pool.clone());

        let err = repo.apply(&adjust(gym.gym_id, member, -3)).await.unwrap_err();
        assert!(matches!(
            err,
            GymError::InsufficientQuota {
                required: 3,
                available: 2
            }
        ));
        // 条件更新未命中时不写账本
        assert_eq!(gym.assert_balanced(member).await, 2);

        // 恰好扣到 0 是允许的
        let entry = repo.apply(&adjust(gym.gym_id, member, -2)).await.unwrap();
        assert_eq!(entry.balance_after, 0);
        assert_eq!(gym.assert_balanced(member).await, 0);

        gym.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_apply_does_not_touch_other_gym_account() {
        let gym = TestGym::create().await;
        let other = TestGym::create().await;
        let member = other.member(4).await;
        let repo = QuotaRepository::new(gym.pool.clone());

        let err = repo.apply(&adjust(gym.gym_id, member, 1)).await.unwrap_err();
        assert!(matches!(err, GymError::AccountNotFound(id) if id == member));
        assert_eq!(other.assert_balanced(member).await, 4);

        gym.cleanup().await;
        other.cleanup().await;
    }
}
