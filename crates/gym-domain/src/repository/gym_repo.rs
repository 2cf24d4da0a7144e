//! 租户仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::account_repo::AccountRepository;
use super::params::{GymChanges, NewAccount, NewGym};
use super::traits::GymRepositoryTrait;
use crate::error::{GymError, Result, is_unique_violation};
use crate::models::{Account, Gym};

const GYM_COLUMNS: &str = "id, name, slug, currency, created_at, updated_at";

/// 租户仓储
pub struct GymRepository {
    pool: PgPool,
}

impl GymRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GymRepositoryTrait for GymRepository {
    async fn create_with_admin(&self, gym: &NewGym, admin: &NewAccount) -> Result<(Gym, Account)> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Gym>(&format!(
            r#"
            INSERT INTO gyms (name, slug, currency)
            VALUES ($1, $2, $3)
            RETURNING {GYM_COLUMNS}
            "#
        ))
        .bind(&gym.name)
        .bind(&gym.slug)
        .bind(&gym.currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "uq_gyms_slug") {
                GymError::SlugTaken(gym.slug.clone())
            } else {
                GymError::Database(e)
            }
        })?;

        let admin = NewAccount {
            gym_id: created.id,
            ..admin.clone()
        };
        let account = AccountRepository::create_in_tx(&mut tx, &admin).await?;

        tx.commit().await?;
        Ok((created, account))
    }

    async fn get(&self, id: i64) -> Result<Option<Gym>> {
        let gym = sqlx::query_as::<_, Gym>(&format!("SELECT {GYM_COLUMNS} FROM gyms WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(gym)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Gym>> {
        let gym =
            sqlx::query_as::<_, Gym>(&format!("SELECT {GYM_COLUMNS} FROM gyms WHERE slug = $1"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(gym)
    }

    async fn update(&self, id: i64, changes: &GymChanges) -> Result<Option<Gym>> {
        let gym = sqlx::query_as::<_, Gym>(&format!(
            r#"
            UPDATE gyms
            SET name = COALESCE($2, name),
                currency = COALESCE($3, currency),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {GYM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.currency)
        .fetch_optional(&self.pool)
        .await?;
        Ok(gym)
    }
}
