//! 财务记录仓储

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use super::params::{FinanceChanges, FinanceFilter, NewFinancialRecord};
use super::traits::FinanceRepositoryTrait;
use crate::error::Result;
use crate::models::{CategoryTotal, FinancialRecord, Page, Pagination};

const RECORD_COLUMNS: &str = "id, gym_id, kind, category, amount_cents, currency, description, \
     account_id, qr_scan_id, recorded_by, occurred_on, created_at, updated_at";

/// 财务记录仓储
pub struct FinanceRepository {
    pool: PgPool,
}

impl FinanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中写入财务记录，扫码生成的记录带上 `qr_scan_id`
    pub async fn create_in_tx(
        conn: &mut PgConnection,
        record: &NewFinancialRecord,
        qr_scan_id: Option<i64>,
    ) -> Result<FinancialRecord> {
        let created = sqlx::query_as::<_, FinancialRecord>(&format!(
            r#"
            INSERT INTO financial_records
                (gym_id, kind, category, amount_cents, currency, description,
                 account_id, qr_scan_id, recorded_by, occurred_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(record.gym_id)
        .bind(record.kind)
        .bind(record.category)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(&record.description)
        .bind(record.account_id)
        .bind(qr_scan_id)
        .bind(record.recorded_by)
        .bind(record.occurred_on)
        .fetch_one(&mut *conn)
        .await?;
        Ok(created)
    }
}

#[async_trait]
impl FinanceRepositoryTrait for FinanceRepository {
    async fn create(&self, record: &NewFinancialRecord) -> Result<FinancialRecord> {
        let mut conn = self.pool.acquire().await?;
        Self::create_in_tx(&mut conn, record, None).await
    }

    async fn get(&self, gym_id: i64, id: i64) -> Result<Option<FinancialRecord>> {
        let record = sqlx::query_as::<_, FinancialRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM financial_records WHERE gym_id = $1 AND id = $2"
        ))
        .bind(gym_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &FinanceFilter,
        page: Pagination,
    ) -> Result<Page<FinancialRecord>> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM financial_records
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR kind = $2)
              AND ($3::varchar IS NULL OR category = $3)
              AND ($4::date IS NULL OR occurred_on >= $4)
              AND ($5::date IS NULL OR occurred_on <= $5)
              AND ($6::bigint IS NULL OR account_id = $6)
            "#,
        )
        .bind(gym_id)
        .bind(filter.kind)
        .bind(filter.category)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.account_id)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, FinancialRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM financial_records
            WHERE gym_id = $1
              AND ($2::varchar IS NULL OR kind = $2)
              AND ($3::varchar IS NULL OR category = $3)
              AND ($4::date IS NULL OR occurred_on >= $4)
              AND ($5::date IS NULL OR occurred_on <= $5)
              AND ($6::bigint IS NULL OR account_id = $6)
            ORDER BY occurred_on DESC, id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(gym_id)
        .bind(filter.kind)
        .bind(filter.category)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.account_id)
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
        changes: &FinanceChanges,
    ) -> Result<Option<FinancialRecord>> {
        // qr_scan_id 条件防止并发下修改扫码生成的记录
        let record = sqlx::query_as::<_, FinancialRecord>(&format!(
            r#"
            UPDATE financial_records
            SET kind = $3, category = $4, amount_cents = $5, currency = $6,
                description = $7, account_id = $8, occurred_on = $9, updated_at = NOW()
            WHERE gym_id = $1 AND id = $2 AND qr_scan_id IS NULL
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(gym_id)
        .bind(id)
        .bind(changes.kind)
        .bind(changes.category)
        .bind(changes.amount_cents)
        .bind(&changes.currency)
        .bind(&changes.description)
        .bind(changes.account_id)
        .bind(changes.occurred_on)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, gym_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM financial_records WHERE gym_id = $1 AND id = $2 AND qr_scan_id IS NULL",
        )
        .bind(gym_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn totals(
        &self,
        gym_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>> {
        let totals = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT kind, category,
                   COALESCE(SUM(amount_cents), 0)::bigint AS total_cents,
                   COUNT(*) AS count
            FROM financial_records
            WHERE gym_id = $1 AND occurred_on BETWEEN $2 AND $3
            GROUP BY kind, category
            ORDER BY kind, category
            "#,
        )
        .bind(gym_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(totals)
    }
}
