//! 二维码仓储
//!
//! 扫码在单个事务内完成：锁定二维码行、复核使用限制、变动额度、
//! 累加使用次数、写入扫码记录、账本以及充值码的收入记录

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::finance_repo::FinanceRepository;
use super::params::{NewFinancialRecord, NewQrCode, QrCodeFilter, QuotaChange, ScanCommand};
use super::quota_repo::QuotaRepository;
use super::traits::QrCodeRepositoryTrait;
use crate::error::{GymError, Result, is_unique_violation};
use crate::models::{
    FinanceCategory, FinanceKind, Page, Pagination, QrCode, QrCodeKind, QrScan, RefType,
};

const QR_COLUMNS: &str = "id, gym_id, code, label, kind, quota_amount, price_cents, max_uses, \
     uses_count, per_member_limit, expires_at, active, created_by, created_at, updated_at";

const SCAN_COLUMNS: &str =
    "id, gym_id, qr_code_id, member_id, quota_delta, balance_after, idempotency_key, scanned_at";

const IDEMPOTENCY_CONSTRAINT: &str = "uq_qr_scans_idempotency";

/// 二维码仓储
pub struct QrCodeRepository {
    pool: PgPool,
}

impl QrCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QrCodeRepositoryTrait for QrCodeRepository {
    async fn create(&self, qr_code: &NewQrCode) -> Result<QrCode> {
        let created = sqlx::query_as::<_, QrCode>(&format!(
            r#"
            INSERT INTO qr_codes
                (gym_id, code, label, kind, quota_amount, price_cents, max_uses,
                 per_member_limit, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {QR_COLUMNS}
            "#
        ))
        .bind(qr_code.gym_id)
        .bind(&qr_code.code)
        .bind(&qr_code.label)
        .bind(qr_code.kind)
        .bind(qr_code.quota_amount)
        .bind(qr_code.price_cents)
        .bind(qr_code.max_uses)
        .bind(qr_code.per_member_limit)
        .bind(qr_code.expires_at)
        .bind(qr_code.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(&format!(
            "SELECT {QR_COLUMNS} FROM qr_codes WHERE gym_id = $1 AND id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(qr)
    }

    async fn get_by_code(&self, gym_id: i64, code: &str) -> Result<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(&format!(
            "SELECT {QR_COLUMNS} FROM qr_codes WHERE gym_id = $1 AND code = $2"
        ))
        .bind(gym_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(qr)
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &QrCodeFilter,
        page: Pagination,
    ) -> Result<Page<QrCode>> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM qr_codes
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR kind = $2)
              AND ($3::boolean IS NULL OR active = $3)
            "#,
        )
        .bind(gym_id)
        .bind(filter.kind)
        .bind(filter.active)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, QrCode>(&format!(
            r#"
            SELECT {QR_COLUMNS}
            FROM qr_codes
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR kind = $2)
              AND ($3::boolean IS NULL OR active = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(gym_id)
        .bind(filter.kind)
        .bind(filter.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total.0))
    }

    async fn set_active(&self, gym_id: i64, id: i64, active: bool) -> Result<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(&format!(
            r#"
            UPDATE qr_codes SET active = $3, updated_at = NOW()
            WHERE gym_id = $1 AND id = $2
            RETURNING {QR_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(qr)
    }

    async fn delete(&self, gym_id: i64, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i32,)> = sqlx::query_as(
            "SELECT uses_count FROM qr_codes WHERE gym_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(GymError::QrCodeNotFound(id.to_string()));
        }

        let scanned: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM qr_scans WHERE qr_code_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if scanned.0 {
            return Err(GymError::QrCodeInUse(id));
        }

        sqlx::query("DELETE FROM qr_codes WHERE gym_id = $1 AND id = $2")
            .bind(gym_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_scan_by_idempotency_key(
        &self,
        gym_id: i64,
        key: &str,
    ) -> Result<Option<QrScan>> {
        let scan = sqlx::query_as::<_, QrScan>(&format!(
            "SELECT {SCAN_COLUMNS} FROM qr_scans WHERE gym_id = $1 AND idempotency_key = $2"
        ))
        .bind(gym_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scan)
    }

    async fn count_member_scans(
        &self,
        gym_id: i64,
        qr_code_id: i64,
        member_id: i64,
    ) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM qr_scans WHERE gym_id = $1 AND qr_code_id = $2 AND member_id = $3",
        )
        .bind(gym_id)
        .bind(qr_code_id)
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn apply_scan(&self, command: &ScanCommand) -> Result<QrScan> {
        let mut tx = self.pool.begin().await?;

        let qr = sqlx::query_as::<_, QrCode>(&format!(
            "SELECT {QR_COLUMNS} FROM qr_codes WHERE gym_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(command.gym_id)
        .bind(command.qr_code_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| GymError::QrCodeNotFound(command.qr_code_id.to_string()))?;

        let member_scans: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM qr_scans WHERE qr_code_id = $1 AND member_id = $2",
        )
        .bind(qr.id)
        .bind(command.member_id)
        .fetch_one(&mut *tx)
        .await?;
        qr.check_scannable(member_scans.0, Utc::now())?;

        let delta = qr.quota_delta();
        let entry = QuotaRepository::apply_in_tx(
            &mut tx,
            &QuotaChange {
                gym_id: command.gym_id,
                account_id: command.member_id,
                change_type: qr.kind.change_type(),
                delta,
                ref_type: Some(RefType::QrScan),
                ref_id: None,
                remark: Some(qr.label.clone()),
                operator_id: Some(command.operator_id),
            },
        )
        .await?;

        let scan = sqlx::query_as::<_, QrScan>(&format!(
            r#"
            INSERT INTO qr_scans
                (gym_id, qr_code_id, member_id, quota_delta, balance_after, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SCAN_COLUMNS}
            "#
        ))
        .bind(command.gym_id)
        .bind(qr.id)
        .bind(command.member_id)
        .bind(delta)
        .bind(entry.balance_after)
        .bind(&command.idempotency_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, IDEMPOTENCY_CONSTRAINT) {
                GymError::DuplicateScan(command.idempotency_key.clone().unwrap_or_default())
            } else {
                GymError::Database(e)
            }
        })?;

        sqlx::query("UPDATE quota_ledger SET ref_id = $2 WHERE id = $1")
            .bind(entry.id)
            .bind(scan.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE qr_codes SET uses_count = uses_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(qr.id)
            .execute(&mut *tx)
            .await?;

        if let (QrCodeKind::TopUp, Some(price_cents)) = (qr.kind, qr.price_cents) {
            FinanceRepository::create_in_tx(
                &mut tx,
                &NewFinancialRecord {
                    gym_id: command.gym_id,
                    kind: FinanceKind::Income,
                    category: FinanceCategory::QuotaPack,
                    amount_cents: price_cents,
                    currency: command.currency.clone(),
                    description: Some(qr.label.clone()),
                    account_id: Some(command.member_id),
                    recorded_by: command.operator_id,
                    occurred_on: scan.scanned_at.date_naive(),
                },
                Some(scan.id),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(scan)
    }

    async fn list_scans(
        &self,
        gym_id: i64,
        qr_code_id: i64,
        page: Pagination,
    ) -> Result<Page<QrScan>> {
        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM qr_scans WHERE gym_id = $1 AND qr_code_id = $2")
                .bind(gym_id)
                .bind(qr_code_id)
                .fetch_one(&self.pool)
                .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, QrScan>(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
            FROM qr_scans
            WHERE gym_id = $1 AND qr_code_id = $2
            ORDER BY scanned_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(gym_id)
        .bind(qr_code_id)
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
    use crate::repository::test_support::TestGym;
    use uuid::Uuid;

    async fn qr_code(
        gym: &TestGym,
        kind: QrCodeKind,
        price_cents: Option<i64>,
        max_uses: Option<i32>,
        per_member_limit: Option<i32>,
    ) -> QrCode {
        QrCodeRepository::new(gym.pool.clone())
            .create(&NewQrCode {
                gym_id: gym.gym_id,
                code: Uuid::new_v4().simple().to_string(),
                label: "Smoothie".to_string(),
                kind,
                quota_amount: 1,
                price_cents,
                max_uses,
                per_member_limit,
                expires_at: None,
                created_by: gym.admin_id,
            })
            .await
            .unwrap()
    }

    fn scan(gym: &TestGym, qr_code_id: i64, member_id: i64, key: Option<&str>) -> ScanCommand {
        ScanCommand {
            gym_id: gym.gym_id,
            qr_code_id,
            member_id,
            operator_id: member_id,
            idempotency_key: key.map(str::to_string),
            currency: "EUR".to_string(),
        }
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_apply_scan_enforces_limits_under_lock() {
        let gym = TestGym::create().await;
        let a = gym.member(3).await;
        let b = gym.member(3).await;
        let c = gym.member(3).await;
        let qr = qr_code(&gym, QrCodeKind::Purchase, None, Some(2), Some(1)).await;
        let repo = QrCodeRepository::new(gym.pool.clone());

        let first = repo.apply_scan(&scan(&gym, qr.id, a, None)).await.unwrap();
        assert_eq!(first.quota_delta, -1);
        assert_eq!(first.balance_after, 2);

        let err = repo.apply_scan(&scan(&gym, qr.id, a, None)).await.unwrap_err();
        assert!(matches!(err, GymError::QrCodeLimitReached));

        repo.apply_scan(&scan(&gym, qr.id, b, None)).await.unwrap();

        let err = repo.apply_scan(&scan(&gym, qr.id, c, None)).await.unwrap_err();
        assert!(matches!(err, GymError::QrCodeExhausted));

        let stored = repo.get(gym.gym_id, qr.id).await.unwrap().unwrap();
        assert_eq!(stored.uses_count, 2);
        assert_eq!(gym.assert_balanced(a).await, 2);
        assert_eq!(gym.assert_balanced(b).await, 2);
        assert_eq!(gym.assert_balanced(c).await, 3);

        gym.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_apply_scan_rejects_purchase_without_quota() {
        let gym = TestGym::create().await;
        let member = gym.member(0).await;
        let qr = qr_code(&gym, QrCodeKind::Purchase, None, None, None).await;
        let repo = QrCodeRepository::new(gym.pool.clone());

        let err = repo
            .apply_scan(&scan(&gym, qr.id, member, None))
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::InsufficientQuota { .. }));

        let stored = repo.get(gym.gym_id, qr.id).await.unwrap().unwrap();
        assert_eq!(stored.uses_count, 0);

        gym.cleanup().await;
    }

    #[tokio::test]
    #[ignore = "需要 PostgreSQL 数据库连接"]
    async fn test_top_up_scan_records_income_once_per_key() {
        let gym = TestGym::create().await;
        let member = gym.member(0).await;
        let qr = qr_code(&gym, QrCodeKind::TopUp, Some(1500), None, None).await;
        let repo = QrCodeRepository::new(gym.pool.clone());

        let scanned = repo
            .apply_scan(&scan(&gym, qr.id, member, Some("scan-1")))
            .await
            .unwrap();
        assert_eq!(scanned.balance_after, 1);

        let income: i64 = sqlx::query_scalar(
            "SELECT amount_cents FROM financial_records WHERE qr_scan_id = $1",
        )
        .bind(scanned.id)
        .fetch_one(&gym.pool)
        .await
        .unwrap();
        assert_eq!(income, 1500);

        let err = repo
            .apply_scan(&scan(&gym, qr.id, member, Some("scan-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::DuplicateScan(key) if key == "scan-1"));

        // 冲突时整个事务回滚，额度、计数和收入都不重复
        assert_eq!(gym.assert_balanced(member).await, 1);
        let stored = repo.get(gym.gym_id, qr.id).await.unwrap().unwrap();
        assert_eq!(stored.uses_count, 1);
        let records: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM financial_records WHERE gym_id = $1")
                .bind(gym.gym_id)
                .fetch_one(&gym.pool)
                .await
                .unwrap();
        assert_eq!(records, 1);

        gym.cleanup().await;
    }
}
