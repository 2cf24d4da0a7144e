//! 操作日志仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::params::{NewOperationLog, OperationLogFilter};
use super::traits::OperationLogRepositoryTrait;
use crate::error::Result;
use crate::models::{OperationLog, Page, Pagination};

/// 操作日志仓储
pub struct OperationLogRepository {
    pool: PgPool,
}

impl OperationLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationLogRepositoryTrait for OperationLogRepository {
    async fn create(&self, log: &NewOperationLog) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO operation_logs
                (gym_id, operator_id, operator_name, module, action, target_type, target_id,
                 ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(log.gym_id)
        .bind(log.operator_id)
        .bind(&log.operator_name)
        .bind(&log.module)
        .bind(&log.action)
        .bind(&log.target_type)
        .bind(&log.target_id)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list(
        &self,
        gym_id: i64,
        filter: &OperationLogFilter,
        page: Pagination,
    ) -> Result<Page<OperationLog>> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM operation_logs
            WHERE gym_id = $1
              AND ($2::text IS NULL OR module = $2)
              AND ($3::bigint IS NULL OR operator_id = $3)
            "#,
        )
        .bind(gym_id)
        .bind(&filter.module)
        .bind(filter.operator_id)
        .fetch_one(&self.pool)
        .await?;

        if total.0 == 0 {
            return Ok(Page::empty());
        }

        let items = sqlx::query_as::<_, OperationLog>(
            r#"
            SELECT id, gym_id, operator_id, operator_name, module, action, target_type,
                   target_id, ip_address, user_agent, created_at
            FROM operation_logs
            WHERE gym_id = $1
              AND ($2::text IS NULL OR module = $2)
              AND ($3::bigint IS NULL OR operator_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(gym_id)
        .bind(&filter.module)
        .bind(filter.operator_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total.0))
    }
}
