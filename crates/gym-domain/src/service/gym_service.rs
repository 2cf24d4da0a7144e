//! 租户服务
//!
//! 健身房注册、查询与设置修改

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{GymError, Result};
use crate::models::{Actor, Gym, Role};
use crate::password::hash_password;
use crate::repository::{GymChanges, GymRepositoryTrait, NewAccount, NewGym};
use crate::service::dto::{AuthenticatedAccount, RegisterGymInput};
use crate::service::policy;

pub struct GymService {
    gym_repo: Arc<dyn GymRepositoryTrait>,
    default_currency: String,
}

impl GymService {
    pub fn new(gym_repo: Arc<dyn GymRepositoryTrait>, default_currency: impl Into<String>) -> Self {
        Self {
            gym_repo,
            default_currency: default_currency.into(),
        }
    }

    /// 注册健身房并创建首个管理员
    ///
    /// 两者在同一事务中写入，标识冲突时返回 `SlugTaken`
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn register_gym(&self, input: RegisterGymInput) -> Result<AuthenticatedAccount> {
        let name = policy::required_text("健身房名称", &input.name, 100)?;
        let slug = input.slug.trim().to_string();
        policy::validate_slug(&slug)?;

        let currency = input
            .currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| self.default_currency.clone());
        policy::validate_currency(&currency)?;

        let full_name = policy::required_text("姓名", &input.admin_full_name, 100)?;
        policy::validate_password(&input.admin_password)?;
        let password_hash = hash_password(&input.admin_password)?;

        let (gym, account) = self
            .gym_repo
            .create_with_admin(
                &NewGym {
                    name,
                    slug,
                    currency,
                },
                &NewAccount {
                    gym_id: 0,
                    email: policy::normalize_email(&input.admin_email),
                    password_hash,
                    full_name,
                    phone: None,
                    role: Role::Admin,
                    initial_quota: 0,
                    operator_id: None,
                },
            )
            .await?;

        info!(gym_id = gym.id, admin_id = account.id, "健身房注册成功");
        Ok(AuthenticatedAccount { gym, account })
    }

    /// 当前账号所属的健身房
    pub async fn get_current(&self, actor: &Actor) -> Result<Gym> {
        self.gym_repo
            .get(actor.gym_id)
            .await?
            .ok_or_else(|| GymError::GymNotFound(actor.gym_id.to_string()))
    }

    #[instrument(skip(self, name, currency), fields(gym_id = actor.gym_id))]
    pub async fn update_gym(
        &self,
        actor: &Actor,
        name: Option<String>,
        currency: Option<String>,
    ) -> Result<Gym> {
        if !actor.is_admin() {
            return Err(GymError::Forbidden("只有管理员可以修改健身房设置".to_string()));
        }

        let name = name
            .map(|n| policy::required_text("健身房名称", &n, 100))
            .transpose()?;
        let currency = currency.map(|c| c.trim().to_uppercase());
        if let Some(c) = &currency {
            policy::validate_currency(c)?;
        }

        let gym = self
            .gym_repo
            .update(actor.gym_id, &GymChanges { name, currency })
            .await?
            .ok_or_else(|| GymError::GymNotFound(actor.gym_id.to_string()))?;

        info!(gym_id = gym.id, "健身房设置已更新");
        Ok(gym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::fixtures::account;
    use crate::repository::MockGymRepositoryTrait;
    use chrono::Utc;

    fn gym(id: i64) -> Gym {
        let now = Utc::now();
        Gym {
            id,
            name: "Iron Temple".to_string(),
            slug: "iron-temple".to_string(),
            currency: "EUR".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn register_input() -> RegisterGymInput {
        RegisterGymInput {
            name: "Iron Temple".to_string(),
            slug: "iron-temple".to_string(),
            currency: None,
            admin_email: " Owner@Example.com ".to_string(),
            admin_password: "supersecret".to_string(),
            admin_full_name: "Owner".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_gym_uses_default_currency_and_admin_role() {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_create_with_admin()
            .withf(|g: &NewGym, a: &NewAccount| {
                g.currency == "EUR"
                    && a.role == Role::Admin
                    && a.email == "owner@example.com"
                    && a.password_hash.starts_with("$2")
                    && a.initial_quota == 0
            })
            .times(1)
            .returning(|_, _| Ok((gym(1), account(1, Role::Admin))));

        let service = GymService::new(Arc::new(repo), "EUR");
        let result = service.register_gym(register_input()).await.unwrap();
        assert_eq!(result.gym.id, 1);
        assert_eq!(result.account.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_register_gym_rejects_bad_slug_before_repository() {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_create_with_admin().never();

        let service = GymService::new(Arc::new(repo), "EUR");
        let mut input = register_input();
        input.slug = "Iron Temple".to_string();

        let err = service.register_gym(input).await.unwrap_err();
        assert!(matches!(err, GymError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_gym_propagates_slug_conflict() {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_create_with_admin()
            .returning(|g, _| Err(GymError::SlugTaken(g.slug.clone())));

        let service = GymService::new(Arc::new(repo), "EUR");
        let err = service.register_gym(register_input()).await.unwrap_err();
        assert_eq!(err.error_code(), "SLUG_TAKEN");
    }

    #[tokio::test]
    async fn test_update_gym_requires_admin() {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_update().never();

        let service = GymService::new(Arc::new(repo), "EUR");
        let trainer = Actor::new(7, 1, Role::Trainer);
        let err = service
            .update_gym(&trainer, Some("New".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_gym_normalizes_currency() {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_update()
            .withf(|id, c: &GymChanges| *id == 1 && c.currency.as_deref() == Some("USD"))
            .returning(|_, _| {
                let mut g = gym(1);
                g.currency = "USD".to_string();
                Ok(Some(g))
            });

        let service = GymService::new(Arc::new(repo), "EUR");
        let admin = Actor::new(1, 1, Role::Admin);
        let updated = service
            .update_gym(&admin, None, Some("usd".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.currency, "USD");
    }
}
