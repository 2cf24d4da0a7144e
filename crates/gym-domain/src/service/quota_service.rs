//! 额度服务
//!
//! 管理员手动调整与账本查询。其他额度变动由预约和扫码在各自事务内完成。

use std::sync::Arc;

use tracing::{info, instrument};

use gym_shared::observability::metrics;

use crate::error::{GymError, Result};
use crate::models::{Actor, ChangeType, Page, Pagination, QuotaLedgerEntry, RefType};
use crate::repository::{AccountRepositoryTrait, QuotaChange, QuotaRepositoryTrait};
use crate::service::policy;

pub struct QuotaService {
    quota_repo: Arc<dyn QuotaRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
}

impl QuotaService {
    pub fn new(
        quota_repo: Arc<dyn QuotaRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
    ) -> Self {
        Self {
            quota_repo,
            account_repo,
        }
    }

    /// 手动调整额度，结果为负时返回 `InsufficientQuota`
    #[instrument(skip(self, reason), fields(gym_id = actor.gym_id))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        account_id: i64,
        delta: i32,
        reason: Option<String>,
    ) -> Result<QuotaLedgerEntry> {
        if !actor.is_admin() {
            return Err(GymError::Forbidden("只有管理员可以调整额度".to_string()));
        }
        policy::validate_adjust_delta(delta)?;

        let entry = self
            .quota_repo
            .apply(&QuotaChange {
                gym_id: actor.gym_id,
                account_id,
                change_type: ChangeType::ManualAdjust,
                delta,
                ref_type: Some(RefType::Manual),
                ref_id: None,
                remark: reason,
                operator_id: Some(actor.account_id),
            })
            .await?;

        metrics::record_quota_change(ChangeType::ManualAdjust.as_str());
        info!(
            account_id,
            delta,
            balance_after = entry.balance_after,
            operator_id = actor.account_id,
            "额度已调整"
        );
        Ok(entry)
    }

    /// 账本查询：本人或员工
    pub async fn list_ledger(
        &self,
        actor: &Actor,
        account_id: i64,
        page: Pagination,
    ) -> Result<Page<QuotaLedgerEntry>> {
        if !actor.is_self_or_staff(account_id) {
            return Err(GymError::Forbidden("无权查看该账号的额度流水".to_string()));
        }
        self.account_repo
            .get(actor.gym_id, account_id)
            .await?
            .ok_or(GymError::AccountNotFound(account_id))?;

        self.quota_repo
            .list_ledger(actor.gym_id, account_id, page)
            .await
    }
}
