//! 仓储数据库测试的公共夹具
//!
//! 每个测试注册独立的健身房，结束时按外键顺序清理该租户的数据。

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::params::{NewAccount, NewActivity, NewGym};
use super::traits::{AccountRepositoryTrait, ActivityRepositoryTrait, GymRepositoryTrait};
use super::{AccountRepository, ActivityRepository, GymRepository};
use crate::models::Role;

pub(crate) fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL 未设置")
}

/// 连接数据库并执行迁移
pub(crate) async fn connect() -> PgPool {
    let pool = PgPool::connect(&database_url())
        .await
        .expect("连接数据库失败");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("执行迁移失败");
    pool
}

pub(crate) struct TestGym {
    pub pool: PgPool,
    pub gym_id: i64,
    pub admin_id: i64,
}

impl TestGym {
    pub async fn create() -> Self {
        let pool = connect().await;
        let slug = format!("t-{}", Uuid::new_v4().simple());
        let (gym, admin) = GymRepository::new(pool.clone())
            .create_with_admin(
                &NewGym {
                    name: "Test Gym".to_string(),
                    slug: slug.clone(),
                    currency: "EUR".to_string(),
                },
                &account(0, &format!("admin@{slug}.test"), Role::Admin, 0),
            )
            .await
            .expect("注册健身房失败");
        Self {
            pool,
            gym_id: gym.id,
            admin_id: admin.id,
        }
    }

    pub async fn member(&self, initial_quota: i32) -> i64 {
        let email = format!("m-{}@gym.test", Uuid::new_v4().simple());
        AccountRepository::new(self.pool.clone())
            .create(&NewAccount {
                operator_id: Some(self.admin_id),
                ..account(self.gym_id, &email, Role::Member, initial_quota)
            })
            .await
            .expect("创建会员失败")
            .id
    }

    /// 明天开始的活动
    pub async fn activity(&self, capacity: Option<i32>, quota_cost: i32) -> i64 {
        self.activity_at(Utc::now() + Duration::days(1), capacity, quota_cost)
            .await
    }

    pub async fn activity_at(
        &self,
        starts_at: DateTime<Utc>,
        capacity: Option<i32>,
        quota_cost: i32,
    ) -> i64 {
        let created = ActivityRepository::new(self.pool.clone())
            .create_many(&[NewActivity {
                gym_id: self.gym_id,
                name: "Spinning".to_string(),
                description: None,
                trainer_id: None,
                location: None,
                starts_at,
                ends_at: starts_at + Duration::hours(1),
                capacity,
                quota_cost,
                series_id: None,
                created_by: self.admin_id,
            }])
            .await
            .expect("创建活动失败");
        created[0].id
    }

    pub async fn quota(&self, account_id: i64) -> i64 {
        sqlx::query_scalar::<_, i32>("SELECT quota FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .expect("查询额度失败") as i64
    }

    pub async fn ledger_sum(&self, account_id: i64) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(delta), 0)::bigint FROM quota_ledger WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .expect("查询账本失败")
    }

    /// 断言额度与账本累计一致，并返回当前额度
    pub async fn assert_balanced(&self, account_id: i64) -> i64 {
        let quota = self.quota(account_id).await;
        assert_eq!(quota, self.ledger_sum(account_id).await);
        quota
    }

    pub async fn cleanup(self) {
        for table in [
            "financial_records",
            "qr_scans",
            "qr_codes",
            "attendance",
            "activities",
            "quota_ledger",
            "operation_logs",
            "accounts",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE gym_id = $1"))
                .bind(self.gym_id)
                .execute(&self.pool)
                .await
                .expect("清理测试数据失败");
        }
        sqlx::query("DELETE FROM gyms WHERE id = $1")
            .bind(self.gym_id)
            .execute(&self.pool)
            .await
            .expect("清理健身房失败");
    }
}

fn account(gym_id: i64, email: &str, role: Role, initial_quota: i32) -> NewAccount {
    NewAccount {
        gym_id,
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
        full_name: "Test User".to_string(),
        phone: None,
        role,
        initial_quota,
        operator_id: None,
    }
}
