//! 账号仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::params::{AccountChanges, AccountFilter, NewAccount, QuotaChange};
use super::quota_repo::QuotaRepository;
use super::traits::AccountRepositoryTrait;
use crate::error::{GymError, Result, is_unique_violation};
use crate::models::{Account, AccountStatus, ChangeType, Page, Pagination, RefType, Role};

const ACCOUNT_COLUMNS: &str = "id, gym_id, email, password_hash, full_name, phone, role, status, \
     quota, failed_login_attempts, locked_until, last_login_at, created_at, updated_at";

const EMAIL_CONSTRAINT: &str = "uq_accounts_gym_email";

/// 账号仓储
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中创建账号，初始额度通过账本写入
    pub async fn create_in_tx(conn: &mut PgConnection, account: &NewAccount) -> Result<Account> {
        let mut created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (gym_id, email, password_hash, full_name, phone, role, status, quota)
            VALUES ($1, $2, $3, $4, $5, $6, 'active', 0)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.gym_id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.full_name)
        .bind(&account.phone)
        .bind(account.role)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_email_conflict(e, &account.email))?;

        if account.initial_quota > 0 {
            let entry = QuotaRepository::apply_in_tx(
                conn,
                &QuotaChange {
                    gym_id: account.gym_id,
                    account_id: created.id,
                    change_type: ChangeType::InitialGrant,
                    delta: account.initial_quota,
                    ref_type: Some(RefType::Manual),
                    ref_id: None,
                    remark: Some("initial grant".to_string()),
                    operator_id: account.operator_id,
                },
            )
            .await?;
            created.quota = entry.balance_after;
        }

        Ok(created)
    }
}

fn map_email_conflict(err: sqlx::Error, email: &str) -> GymError {
    if is_unique_violation(&err, EMAIL_CONSTRAINT) {
        GymError::EmailTaken(email.to_string())
    } else {
        GymError::Database(err)
    }
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    async fn create(&self, account: &NewAccount) -> Result<Account> {
        let mut tx = self.pool.begin().await?;
        let created = Self::create_in_tx(&mut tx, account).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE gym_id = $1 AND id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn get_by_email(&self, gym_id: i64, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE gym_id = $1 AND email = $2"
        ))
        .bind(gym_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &AccountFilter,
        page: Pagination,
    ) -> Result<Page<Account>> {
        let keyword = filter.keyword.as_ref().map(|k| format!("%{}%", k));

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM accounts
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR role = $2)
              AND ($3::varchar IS NULL OR status = $3)
              AND ($4::text IS NULL OR full_name ILIKE $4 OR email ILIKE $4)
            "#,
        )
        .bind(gym_id)
        .bind(filter.role)
        .bind(filter.status)
        .bind(&keyword)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR role = $2)
              AND ($3::varchar IS NULL OR status = $3)
              AND ($4::text IS NULL OR full_name ILIKE $4 OR email ILIKE $4)
            ORDER BY created_at DESC, id DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(gym_id)
        .bind(filter.role)
        .bind(filter.status)
        .bind(&keyword)
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
        changes: &AccountChanges,
    ) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET full_name = COALESCE($3, full_name),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                role = COALESCE($6, role),
                updated_at = NOW()
            WHERE gym_id = $1 AND id = $2
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(&changes.full_name)
        .bind(&changes.phone)
        .bind(&changes.email)
        .bind(changes.role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_email_conflict(e, changes.email.as_deref().unwrap_or_default()))?;
        Ok(account)
    }

    async fn set_status(&self, gym_id: i64, id: i64, status: AccountStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET status = $3, updated_at = NOW() WHERE gym_id = $1 AND id = $2",
        )
        .bind(gym_id)
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password(&self, gym_id: i64, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $3, failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
            WHERE gym_id = $1 AND id = $2
            "#,
        )
        .bind(gym_id)
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login_failure(
        &self,
        id: i64,
        max_attempts: i32,
        lock_minutes: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2
                    THEN NOW() + make_interval(mins => $3::int)
                    ELSE locked_until
                END,
                failed_login_attempts = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN 0
                    ELSE failed_login_attempts + 1
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING locked_until
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_minutes as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(until,)| until).filter(|until| *until > Utc::now()))
    }

    async fn record_login_success(&self, id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, locked_until = NULL, last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_active_admins(&self, gym_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM accounts WHERE gym_id = $1 AND role = $2 AND status = $3",
        )
        .bind(gym_id)
        .bind(Role::Admin)
        .bind(AccountStatus::Active)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn has_history(&self, gym_id: i64, id: i64) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM attendance WHERE gym_id = $1 AND (member_id = $2 OR booked_by = $2))
                OR EXISTS (SELECT 1 FROM qr_scans WHERE gym_id = $1 AND member_id = $2)
                OR EXISTS (SELECT 1 FROM quota_ledger WHERE gym_id = $1 AND (account_id = $2 OR operator_id = $2))
                OR EXISTS (SELECT 1 FROM activities WHERE gym_id = $1 AND (trainer_id = $2 OR created_by = $2))
                OR EXISTS (SELECT 1 FROM qr_codes WHERE gym_id = $1 AND created_by = $2)
                OR EXISTS (SELECT 1 FROM financial_records WHERE gym_id = $1 AND (account_id = $2 OR recorded_by = $2))
            "#,
        )
        .bind(gym_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn delete(&self, gym_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE gym_id = $1 AND id = $2")
            .bind(gym_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
