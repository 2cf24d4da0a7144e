//! 财务服务
//!
//! 收支记录维护与区间汇总，仅管理员可用。
//! 扫码生成的记录被锁定，不能修改或删除。

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::error::{GymError, Result};
use crate::models::{Actor, FinanceSummary, FinancialRecord, Page, Pagination};
use crate::repository::{
    AccountRepositoryTrait, FinanceChanges, FinanceFilter, FinanceRepositoryTrait,
    GymRepositoryTrait, NewFinancialRecord,
};
use crate::service::dto::{CreateRecordInput, UpdateRecordInput};
use crate::service::policy;

pub struct FinanceService {
    finance_repo: Arc<dyn FinanceRepositoryTrait>,
    gym_repo: Arc<dyn GymRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
}

impl FinanceService {
    pub fn new(
        finance_repo: Arc<dyn FinanceRepositoryTrait>,
        gym_repo: Arc<dyn GymRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
    ) -> Self {
        Self {
            finance_repo,
            gym_repo,
            account_repo,
        }
    }

    #[instrument(skip(self, input), fields(gym_id = actor.gym_id))]
    pub async fn create(&self, actor: &Actor, input: CreateRecordInput) -> Result<FinancialRecord> {
        require_admin(actor)?;
        validate_amount(input.amount_cents)?;

        let currency = match input.currency {
            Some(c) => c.trim().to_uppercase(),
            None => self.gym_currency(actor.gym_id).await?,
        };
        policy::validate_currency(&currency)?;
        if let Some(account_id) = input.account_id {
            self.ensure_account(actor.gym_id, account_id).await?;
        }

        let record = self
            .finance_repo
            .create(&NewFinancialRecord {
                gym_id: actor.gym_id,
                kind: input.kind,
                category: input.category,
                amount_cents: input.amount_cents,
                currency,
                description: input.description,
                account_id: input.account_id,
                recorded_by: actor.account_id,
                occurred_on: input.occurred_on,
            })
            .await?;

        info!(record_id = record.id, operator_id = actor.account_id, "财务记录已创建");
        Ok(record)
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<FinancialRecord> {
        require_admin(actor)?;
        self.load(actor.gym_id, id).await
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: FinanceFilter,
        page: Pagination,
    ) -> Result<Page<FinancialRecord>> {
        require_admin(actor)?;
        self.finance_repo.list(actor.gym_id, &filter, page).await
    }

    #[instrument(skip(self, input), fields(gym_id = actor.gym_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateRecordInput,
    ) -> Result<FinancialRecord> {
        require_admin(actor)?;
        let current = self.load(actor.gym_id, id).await?;
        if current.is_locked() {
            return Err(GymError::RecordLocked(id));
        }

        let changes = FinanceChanges {
            kind: input.kind.unwrap_or(current.kind),
            category: input.category.unwrap_or(current.category),
            amount_cents: input.amount_cents.unwrap_or(current.amount_cents),
            currency: input
                .currency
                .map(|c| c.trim().to_uppercase())
                .unwrap_or(current.currency),
            description: input.description.or(current.description),
            account_id: input.account_id.or(current.account_id),
            occurred_on: input.occurred_on.unwrap_or(current.occurred_on),
        };
        validate_amount(changes.amount_cents)?;
        policy::validate_currency(&changes.currency)?;
        if let Some(account_id) = input.account_id {
            self.ensure_account(actor.gym_id, account_id).await?;
        }

        // 读取与更新之间被锁定的记录不会被更新，仓储返回 None
        let record = self
            .finance_repo
            .update(actor.gym_id, id, &changes)
            .await?
            .ok_or(GymError::RecordLocked(id))?;

        info!(record_id = id, operator_id = actor.account_id, "财务记录已更新");
        Ok(record)
    }

    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        require_admin(actor)?;
        let current = self.load(actor.gym_id, id).await?;
        if current.is_locked() || !self.finance_repo.delete(actor.gym_id, id).await? {
            return Err(GymError::RecordLocked(id));
        }

        info!(record_id = id, operator_id = actor.account_id, "财务记录已删除");
        Ok(())
    }

    /// 区间汇总，起止日期均包含在内
    pub async fn summary(&self, actor: &Actor, from: NaiveDate, to: NaiveDate) -> Result<FinanceSummary> {
        require_admin(actor)?;
        policy::validate_summary_range(from, to)?;

        let totals = self.finance_repo.totals(actor.gym_id, from, to).await?;
        Ok(FinanceSummary::from_totals(from, to, totals))
    }

    async fn load(&self, gym_id: i64, id: i64) -> Result<FinancialRecord> {
        self.finance_repo
            .get(gym_id, id)
            .await?
            .ok_or(GymError::RecordNotFound(id))
    }

    /// 关联账号必须属于本健身房，其他健身房的账号视为不存在
    async fn ensure_account(&self, gym_id: i64, account_id: i64) -> Result<()> {
        self.account_repo
            .get(gym_id, account_id)
            .await?
            .map(|_| ())
            .ok_or(GymError::AccountNotFound(account_id))
    }

    async fn gym_currency(&self, gym_id: i64) -> Result<String> {
        self.gym_repo
            .get(gym_id)
            .await?
            .map(|gym| gym.currency)
            .ok_or_else(|| GymError::GymNotFound(gym_id.to_string()))
    }
}

fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(GymError::Forbidden("只有管理员可以管理财务记录".to_string()))
    }
}

fn validate_amount(amount_cents: i64) -> Result<()> {
    if amount_cents > 0 {
        Ok(())
    } else {
        Err(GymError::Validation("金额必须大于 0".to_string()))
    }
}
