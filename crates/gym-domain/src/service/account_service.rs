//! 账号服务
//!
//! 处理注册、登录以及管理员对账号的维护操作。
//!
//! ## 登录流程
//!
//! 1. 健身房标识 -> 2. 邮箱 -> 3. 禁用状态 -> 4. 锁定状态 -> 5. 密码
//!
//! 未知健身房、未知邮箱和错误密码返回同一个错误，避免枚举账号。
//! 密码错误累计到阈值后锁定账号，登录成功清零计数。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use gym_shared::observability::metrics;

use crate::error::{GymError, Result};
use crate::models::{Account, AccountStatus, Actor, Page, Pagination, Role};
use crate::password::{hash_password, verify_password};
use crate::repository::{
    AccountChanges, AccountFilter, AccountRepositoryTrait, GymRepositoryTrait, NewAccount,
};
use crate::service::dto::{
    AuthenticatedAccount, CreateAccountInput, LoginInput, SignupInput, UpdateAccountInput,
};
use crate::service::policy;

/// 登录失败锁定策略
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy {
    pub max_failed_logins: i32,
    pub lock_minutes: i64,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lock_minutes: 30,
        }
    }
}

pub struct AccountService {
    gym_repo: Arc<dyn GymRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
    login_policy: LoginPolicy,
}

impl AccountService {
    pub fn new(
        gym_repo: Arc<dyn GymRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
        login_policy: LoginPolicy,
    ) -> Self {
        Self {
            gym_repo,
            account_repo,
            login_policy,
        }
    }

    /// 会员自助注册，创建待审核会员，额度为 0
    #[instrument(skip(self, input), fields(gym_slug = %input.gym_slug))]
    pub async fn signup(&self, input: SignupInput) -> Result<AuthenticatedAccount> {
        let gym = self
            .gym_repo
            .get_by_slug(input.gym_slug.trim())
            .await?
            .ok_or_else(|| GymError::GymNotFound(input.gym_slug.clone()))?;

        let full_name = policy::required_text("姓名", &input.full_name, 100)?;
        policy::validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;

        let account = self
            .account_repo
            .create(&NewAccount {
                gym_id: gym.id,
                email: policy::normalize_email(&input.email),
                password_hash,
                full_name,
                phone: input.phone,
                role: Role::PendingMember,
                initial_quota: 0,
                operator_id: None,
            })
            .await?;

        info!(gym_id = gym.id, account_id = account.id, "会员自助注册成功");
        Ok(AuthenticatedAccount { gym, account })
    }

    /// 登录校验
    #[instrument(skip(self, input), fields(gym_slug = %input.gym_slug))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthenticatedAccount> {
        let result = self.authenticate(&input).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(GymError::AccountDisabled) => "disabled",
            Err(GymError::AccountLocked) => "locked",
            Err(GymError::InvalidCredentials) => "invalid_credentials",
            Err(_) => "error",
        };
        metrics::record_login_attempt(outcome);
        result
    }

    async fn authenticate(&self, input: &LoginInput) -> Result<AuthenticatedAccount> {
        let Some(gym) = self.gym_repo.get_by_slug(input.gym_slug.trim()).await? else {
            return Err(GymError::InvalidCredentials);
        };

        let email = policy::normalize_email(&input.email);
        let Some(account) = self.account_repo.get_by_email(gym.id, &email).await? else {
            return Err(GymError::InvalidCredentials);
        };

        if !account.is_active() {
            return Err(GymError::AccountDisabled);
        }
        if account.is_locked(Utc::now()) {
            return Err(GymError::AccountLocked);
        }

        if !verify_password(&input.password, &account.password_hash)? {
            let locked_until = self
                .account_repo
                .record_login_failure(
                    account.id,
                    self.login_policy.max_failed_logins,
                    self.login_policy.lock_minutes,
                )
                .await?;
            if let Some(until) = locked_until {
                warn!(account_id = account.id, locked_until = %until, "连续登录失败，账号已锁定");
            }
            return Err(GymError::InvalidCredentials);
        }

        self.account_repo.record_login_success(account.id).await?;
        info!(gym_id = gym.id, account_id = account.id, "登录成功");

        Ok(AuthenticatedAccount { gym, account })
    }

    /// 当前账号资料
    pub async fn me(&self, actor: &Actor) -> Result<Account> {
        self.load(actor.gym_id, actor.account_id).await
    }

    /// 令牌刷新前确认账号仍然有效
    pub async fn ensure_active(&self, actor: &Actor) -> Result<Account> {
        let account = self.load(actor.gym_id, actor.account_id).await?;
        if !account.is_active() {
            return Err(GymError::AccountDisabled);
        }
        Ok(account)
    }

    #[instrument(skip(self, old_password, new_password), fields(account_id = actor.account_id))]
    pub async fn change_password(
        &self,
        actor: &Actor,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let account = self.load(actor.gym_id, actor.account_id).await?;
        if !verify_password(old_password, &account.password_hash)? {
            return Err(GymError::InvalidCredentials);
        }
        policy::validate_password(new_password)?;

        let hash = hash_password(new_password)?;
        self.account_repo
            .set_password(actor.gym_id, actor.account_id, &hash)
            .await?;

        info!(account_id = actor.account_id, "密码已修改");
        Ok(())
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: AccountFilter,
        page: Pagination,
    ) -> Result<Page<Account>> {
        if !actor.is_staff() {
            return Err(GymError::Forbidden("无权查看账号列表".to_string()));
        }
        self.account_repo.list(actor.gym_id, &filter, page).await
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Account> {
        if !actor.is_self_or_staff(id) {
            return Err(GymError::Forbidden("无权查看该账号".to_string()));
        }
        self.load(actor.gym_id, id).await
    }

    /// 管理员创建账号，初始额度通过账本写入
    #[instrument(skip(self, input), fields(gym_id = actor.gym_id, role = %input.role))]
    pub async fn create(&self, actor: &Actor, input: CreateAccountInput) -> Result<Account> {
        self.require_admin(actor)?;

        let full_name = policy::required_text("姓名", &input.full_name, 100)?;
        policy::validate_password(&input.password)?;
        let initial_quota = input.initial_quota.unwrap_or(0);
        if !(0..=policy::MAX_MANUAL_ADJUST).contains(&initial_quota) {
            return Err(GymError::Validation(format!(
                "初始额度必须在 0-{} 之间",
                policy::MAX_MANUAL_ADJUST
            )));
        }
        let password_hash = hash_password(&input.password)?;

        let account = self
            .account_repo
            .create(&NewAccount {
                gym_id: actor.gym_id,
                email: policy::normalize_email(&input.email),
                password_hash,
                full_name,
                phone: input.phone,
                role: input.role,
                initial_quota,
                operator_id: Some(actor.account_id),
            })
            .await?;

        if initial_quota > 0 {
            metrics::record_quota_change("initial_grant");
        }
        info!(account_id = account.id, operator_id = actor.account_id, "账号已创建");
        Ok(account)
    }

    /// 修改资料或角色
    ///
    /// 管理员不能修改自己的角色；降级最后一名有效管理员返回 `LastAdmin`
    #[instrument(skip(self, input), fields(gym_id = actor.gym_id, account_id = id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateAccountInput,
    ) -> Result<Account> {
        self.require_admin(actor)?;
        let target = self.load(actor.gym_id, id).await?;

        let demoting = target.role == Role::Admin
            && input.role.is_some_and(|role| role != Role::Admin);
        if demoting {
            if id == actor.account_id {
                return Err(GymError::SelfModification("不能修改自己的角色".to_string()));
            }
            self.ensure_not_last_admin(&target).await?;
        }

        let changes = AccountChanges {
            full_name: input
                .full_name
                .map(|n| policy::required_text("姓名", &n, 100))
                .transpose()?,
            phone: input.phone,
            email: input.email.map(|e| policy::normalize_email(&e)),
            role: input.role,
        };

        let account = self
            .account_repo
            .update(actor.gym_id, id, &changes)
            .await?
            .ok_or(GymError::AccountNotFound(id))?;

        info!(account_id = id, operator_id = actor.account_id, "账号已更新");
        Ok(account)
    }

    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn set_status(&self, actor: &Actor, id: i64, status: AccountStatus) -> Result<Account> {
        self.require_admin(actor)?;
        let target = self.load(actor.gym_id, id).await?;

        if status == AccountStatus::Disabled {
            if id == actor.account_id {
                return Err(GymError::SelfModification("不能禁用自己的账号".to_string()));
            }
            if target.role == Role::Admin {
                self.ensure_not_last_admin(&target).await?;
            }
        }

        if !self.account_repo.set_status(actor.gym_id, id, status).await? {
            return Err(GymError::AccountNotFound(id));
        }

        info!(account_id = id, status = ?status, operator_id = actor.account_id, "账号状态已变更");
        self.load(actor.gym_id, id).await
    }

    #[instrument(skip(self, new_password), fields(gym_id = actor.gym_id))]
    pub async fn reset_password(&self, actor: &Actor, id: i64, new_password: &str) -> Result<()> {
        self.require_admin(actor)?;
        policy::validate_password(new_password)?;

        let hash = hash_password(new_password)?;
        if !self.account_repo.set_password(actor.gym_id, id, &hash).await? {
            return Err(GymError::AccountNotFound(id));
        }

        info!(account_id = id, operator_id = actor.account_id, "密码已重置");
        Ok(())
    }

    /// 删除账号，存在业务记录时拒绝
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        self.require_admin(actor)?;
        if id == actor.account_id {
            return Err(GymError::SelfModification("不能删除自己的账号".to_string()));
        }

        let target = self.load(actor.gym_id, id).await?;
        if target.role == Role::Admin {
            self.ensure_not_last_admin(&target).await?;
        }
        if self.account_repo.has_history(actor.gym_id, id).await? {
            return Err(GymError::AccountInUse(id));
        }

        if !self.account_repo.delete(actor.gym_id, id).await? {
            return Err(GymError::AccountNotFound(id));
        }

        info!(account_id = id, operator_id = actor.account_id, "账号已删除");
        Ok(())
    }

    async fn load(&self, gym_id: i64, id: i64) -> Result<Account> {
        self.account_repo
            .get(gym_id, id)
            .await?
            .ok_or(GymError::AccountNotFound(id))
    }

    fn require_admin(&self, actor: &Actor) -> Result<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(GymError::Forbidden("需要管理员权限".to_string()))
        }
    }

    /// 目标是有效管理员且为最后一名时拒绝
    async fn ensure_not_last_admin(&self, target: &Account) -> Result<()> {
        if !target.is_active() {
            return Ok(());
        }
        if self.account_repo.count_active_admins(target.gym_id).await? <= 1 {
            return Err(GymError::LastAdmin);
        }
        Ok(())
    }
}
