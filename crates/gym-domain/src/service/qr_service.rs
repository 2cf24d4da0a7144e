//! 二维码服务
//!
//! 二维码的维护与扫码。
//!
//! ## 扫码流程
//!
//! 1. 幂等检查 -> 2. 二维码存在 -> 3. 会员资格 -> 4. 二维码限制
//!    -> 5. 额度预检 -> 6. 事务写入（行锁内复核限制）
//!
//! 并发下第 4、5 步的结果以仓储事务内的复核为准，这里的预检只用于尽早返回。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use gym_shared::observability::metrics;

use crate::error::{GymError, Result};
use crate::models::{
    Actor, ChangeType, Page, Pagination, QrCode, QrCodeKind, QrScan, ScanOutcome,
};
use crate::repository::{
    AccountRepositoryTrait, GymRepositoryTrait, NewQrCode, QrCodeFilter, QrCodeRepositoryTrait,
    ScanCommand,
};
use crate::service::dto::{CreateQrCodeInput, ScanInput};
use crate::service::policy;

const MAX_QUOTA_AMOUNT: i32 = 1000;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

pub struct QrCodeService {
    qr_repo: Arc<dyn QrCodeRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
    gym_repo: Arc<dyn GymRepositoryTrait>,
}

impl QrCodeService {
    pub fn new(
        qr_repo: Arc<dyn QrCodeRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
        gym_repo: Arc<dyn GymRepositoryTrait>,
    ) -> Self {
        Self {
            qr_repo,
            account_repo,
            gym_repo,
        }
    }

    #[instrument(skip(self, input), fields(gym_id = actor.gym_id, kind = input.kind.as_str()))]
    pub async fn create(&self, actor: &Actor, input: CreateQrCodeInput) -> Result<QrCode> {
        self.require_admin(actor)?;

        let label = policy::required_text("二维码名称", &input.label, 100)?;
        if !(1..=MAX_QUOTA_AMOUNT).contains(&input.quota_amount) {
            return Err(GymError::Validation(format!(
                "额度数量必须在 1-{} 之间",
                MAX_QUOTA_AMOUNT
            )));
        }
        match (input.kind, input.price_cents) {
            (QrCodeKind::Purchase, Some(_)) => {
                return Err(GymError::Validation("只有充值码可以设置售价".to_string()));
            }
            (QrCodeKind::TopUp, Some(price)) if price <= 0 => {
                return Err(GymError::Validation("售价必须大于 0".to_string()));
            }
            _ => {}
        }
        if input.max_uses.is_some_and(|n| n < 1) {
            return Err(GymError::Validation("最大使用次数至少为 1".to_string()));
        }
        if input.per_member_limit.is_some_and(|n| n < 1) {
            return Err(GymError::Validation("个人使用上限至少为 1".to_string()));
        }
        if input.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(GymError::Validation("过期时间必须晚于当前时间".to_string()));
        }

        let qr_code = self
            .qr_repo
            .create(&NewQrCode {
                gym_id: actor.gym_id,
                code: policy::generate_qr_code(),
                label,
                kind: input.kind,
                quota_amount: input.quota_amount,
                price_cents: input.price_cents,
                max_uses: input.max_uses,
                per_member_limit: input.per_member_limit,
                expires_at: input.expires_at,
                created_by: actor.account_id,
            })
            .await?;

        info!(qr_code_id = qr_code.id, operator_id = actor.account_id, "二维码已创建");
        Ok(qr_code)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: QrCodeFilter,
        page: Pagination,
    ) -> Result<Page<QrCode>> {
        self.require_staff(actor)?;
        self.qr_repo.list(actor.gym_id, &filter, page).await
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<QrCode> {
        self.require_staff(actor)?;
        self.load(actor.gym_id, id).await
    }

    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn set_active(&self, actor: &Actor, id: i64, active: bool) -> Result<QrCode> {
        self.require_admin(actor)?;
        let qr_code = self
            .qr_repo
            .set_active(actor.gym_id, id, active)
            .await?
            .ok_or_else(|| GymError::QrCodeNotFound(id.to_string()))?;

        info!(qr_code_id = id, active, operator_id = actor.account_id, "二维码状态已变更");
        Ok(qr_code)
    }

    /// 删除从未被扫描过的二维码
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        self.require_admin(actor)?;
        self.qr_repo.delete(actor.gym_id, id).await?;

        info!(qr_code_id = id, operator_id = actor.account_id, "二维码已删除");
        Ok(())
    }

    /// 扫码
    ///
    /// 相同幂等键的重复请求返回首次扫码结果，`replayed = true`
    #[instrument(skip(self, input), fields(gym_id = actor.gym_id))]
    pub async fn scan(&self, actor: &Actor, input: ScanInput) -> Result<ScanOutcome> {
        let result = self.do_scan(actor, &input).await;
        match &result {
            Ok(outcome) => {
                let status = if outcome.replayed { "replayed" } else { "success" };
                metrics::record_qr_scan(outcome.kind.as_str(), status);
                if !outcome.replayed {
                    let change_type = match outcome.kind {
                        QrCodeKind::Purchase => ChangeType::QrPurchase,
                        QrCodeKind::TopUp => ChangeType::QrTopUp,
                    };
                    metrics::record_quota_change(change_type.as_str());
                }
                info!(
                    scan_id = outcome.scan.id,
                    qr_code_id = outcome.scan.qr_code_id,
                    member_id = outcome.scan.member_id,
                    quota_delta = outcome.scan.quota_delta,
                    replayed = outcome.replayed,
                    "扫码成功"
                );
            }
            Err(e) => {
                metrics::record_qr_scan("unknown", &e.error_code().to_lowercase());
                if !e.is_business_error() {
                    warn!(error = %e, "扫码失败");
                }
            }
        }
        result
    }

    async fn do_scan(&self, actor: &Actor, input: &ScanInput) -> Result<ScanOutcome> {
        let member_id = policy::resolve_member_target(actor, input.member_id)?;
        let idempotency_key = input
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if idempotency_key.is_some_and(|k| k.len() > MAX_IDEMPOTENCY_KEY_LEN) {
            return Err(GymError::Validation(format!(
                "幂等键长度不能超过 {}",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }

        if let Some(key) = idempotency_key {
            if let Some(outcome) = self.replay(actor.gym_id, key, member_id).await? {
                return Ok(outcome);
            }
        }

        let code = input.code.trim();
        let qr_code = self
            .qr_repo
            .get_by_code(actor.gym_id, code)
            .await?
            .ok_or_else(|| GymError::QrCodeNotFound(code.to_string()))?;

        let member = self
            .account_repo
            .get(actor.gym_id, member_id)
            .await?
            .ok_or(GymError::AccountNotFound(member_id))?;
        if !member.is_bookable_member() {
            return Err(GymError::MemberNotEligible(member_id));
        }

        let member_scans = match qr_code.per_member_limit {
            Some(_) => {
                self.qr_repo
                    .count_member_scans(actor.gym_id, qr_code.id, member_id)
                    .await?
            }
            None => 0,
        };
        qr_code.check_scannable(member_scans, Utc::now())?;
        policy::next_balance(member.quota, qr_code.quota_delta())?;

        let gym = self
            .gym_repo
            .get(actor.gym_id)
            .await?
            .ok_or_else(|| GymError::GymNotFound(actor.gym_id.to_string()))?;

        let command = ScanCommand {
            gym_id: actor.gym_id,
            qr_code_id: qr_code.id,
            member_id,
            operator_id: actor.account_id,
            idempotency_key: idempotency_key.map(str::to_string),
            currency: gym.currency,
        };

        match self.qr_repo.apply_scan(&command).await {
            Ok(scan) => Ok(ScanOutcome {
                scan,
                kind: qr_code.kind,
                label: qr_code.label,
                replayed: false,
            }),
            // 并发的同键请求先提交，返回那一次的结果
            Err(GymError::DuplicateScan(key)) => self
                .replay(actor.gym_id, &key, member_id)
                .await?
                .ok_or(GymError::DuplicateScan(key)),
            Err(e) => Err(e),
        }
    }

    /// 按幂等键查找已完成的扫码；键被其他会员使用过时视为冲突
    async fn replay(&self, gym_id: i64, key: &str, member_id: i64) -> Result<Option<ScanOutcome>> {
        let Some(scan) = self.qr_repo.find_scan_by_idempotency_key(gym_id, key).await? else {
            return Ok(None);
        };
        if scan.member_id != member_id {
            return Err(GymError::DuplicateScan(key.to_string()));
        }

        let qr_code = self.load(gym_id, scan.qr_code_id).await?;
        Ok(Some(ScanOutcome {
            scan,
            kind: qr_code.kind,
            label: qr_code.label,
            replayed: true,
        }))
    }

    pub async fn list_scans(
        &self,
        actor: &Actor,
        qr_code_id: i64,
        page: Pagination,
    ) -> Result<Page<QrScan>> {
        self.require_staff(actor)?;
        self.load(actor.gym_id, qr_code_id).await?;
        self.qr_repo.list_scans(actor.gym_id, qr_code_id, page).await
    }

    async fn load(&self, gym_id: i64, id: i64) -> Result<QrCode> {
        self.qr_repo
            .get(gym_id, id)
            .await?
            .ok_or_else(|| GymError::QrCodeNotFound(id.to_string()))
    }

    fn require_admin(&self, actor: &Actor) -> Result<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(GymError::Forbidden("需要管理员权限".to_string()))
        }
    }

    fn require_staff(&self, actor: &Actor) -> Result<()> {
        if actor.is_staff() {
            Ok(())
        } else {
            Err(GymError::Forbidden("无权查看二维码".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::fixtures::account;
    use crate::models::qr_code::fixtures::qr_code;
    use crate::models::{Gym, Role};
    use crate::repository::{
        MockAccountRepositoryTrait, MockGymRepositoryTrait, MockQrCodeRepositoryTrait,
    };
    use chrono::Duration;

    const CODE: &str = "ABCDEFGHIJKLMNOPQRSTUVWX";

    fn scan_row(id: i64, member_id: i64, delta: i32, key: Option<&str>) -> QrScan {
        QrScan {
            id,
            gym_id: 1,
            qr_code_id: 4,
            member_id,
            quota_delta: delta,
            balance_after: 10 + delta,
            idempotency_key: key.map(str::to_string),
            scanned_at: Utc::now(),
        }
    }

    fn gyms() -> MockGymRepositoryTrait {
        let mut repo = MockGymRepositoryTrait::new();
        repo.expect_get().returning(|id| {
            let now = Utc::now();
            Ok(Some(Gym {
                id,
                name: "Iron Temple".to_string(),
                slug: "iron-temple".to_string(),
                currency: "CHF".to_string(),
                created_at: now,
                updated_at: now,
            }))
        });
        repo
    }

    fn members() -> MockAccountRepositoryTrait {
        let mut accounts = MockAccountRepositoryTrait::new();
        accounts
            .expect_get()
            .returning(|_, id| Ok(Some(account(id, Role::Member))));
        accounts
    }

    fn service(qr: MockQrCodeRepositoryTrait, accounts: MockAccountRepositoryTrait) -> QrCodeService {
        QrCodeService::new(Arc::new(qr), Arc::new(accounts), Arc::new(gyms()))
    }

    fn scan_input(key: Option<&str>) -> ScanInput {
        ScanInput {
            code: CODE.to_string(),
            member_id: None,
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_purchase_scan_applies_with_gym_currency() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_find_scan_by_idempotency_key()
            .returning(|_, _| Ok(None));
        qr.expect_get_by_code()
            .returning(|_, _| Ok(Some(qr_code(4, QrCodeKind::Purchase))));
        qr.expect_count_member_scans().never();
        qr.expect_apply_scan()
            .withf(|c: &ScanCommand| {
                c.qr_code_id == 4
                    && c.member_id == 5
                    && c.currency == "CHF"
                    && c.idempotency_key.as_deref() == Some("k-1")
            })
            .times(1)
            .returning(|c| Ok(scan_row(20, c.member_id, -2, Some("k-1"))));

        let member = Actor::new(5, 1, Role::Member);
        let outcome = service(qr, members())
            .scan(&member, scan_input(Some("k-1")))
            .await
            .unwrap();
        assert!(!outcome.replayed);
        assert_eq!(outcome.scan.quota_delta, -2);
        assert_eq!(outcome.kind, QrCodeKind::Purchase);
    }

    #[tokio::test]
    async fn test_repeated_idempotency_key_replays() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_find_scan_by_idempotency_key()
            .returning(|_, key| Ok(Some(scan_row(20, 5, -2, Some(key)))));
        qr.expect_get()
            .returning(|_, id| Ok(Some(qr_code(id, QrCodeKind::Purchase))));
        qr.expect_get_by_code().never();
        qr.expect_apply_scan().never();

        let member = Actor::new(5, 1, Role::Member);
        let outcome = service(qr, MockAccountRepositoryTrait::new())
            .scan(&member, scan_input(Some("k-1")))
            .await
            .unwrap();
        assert!(outcome.replayed);
        assert_eq!(outcome.scan.id, 20);
    }

    #[tokio::test]
    async fn test_idempotency_key_of_other_member_conflicts() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_find_scan_by_idempotency_key()
            .returning(|_, key| Ok(Some(scan_row(20, 6, -2, Some(key)))));
        qr.expect_apply_scan().never();

        let member = Actor::new(5, 1, Role::Member);
        let err = service(qr, MockAccountRepositoryTrait::new())
            .scan(&member, scan_input(Some("k-1")))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_SCAN");
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_falls_back_to_replay() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        let mut lookups = 0;
        qr.expect_find_scan_by_idempotency_key()
            .times(2)
            .returning(move |_, key| {
                lookups += 1;
                if lookups == 1 {
                    Ok(None)
                } else {
                    Ok(Some(scan_row(21, 5, -2, Some(key))))
                }
            });
        qr.expect_get_by_code()
            .returning(|_, _| Ok(Some(qr_code(4, QrCodeKind::Purchase))));
        qr.expect_get()
            .returning(|_, id| Ok(Some(qr_code(id, QrCodeKind::Purchase))));
        qr.expect_apply_scan()
            .returning(|c| Err(GymError::DuplicateScan(c.idempotency_key.clone().unwrap_or_default())));

        let member = Actor::new(5, 1, Role::Member);
        let outcome = service(qr, members())
            .scan(&member, scan_input(Some("k-2")))
            .await
            .unwrap();
        assert!(outcome.replayed);
        assert_eq!(outcome.scan.id, 21);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_get_by_code().returning(|_, _| Ok(None));

        let member = Actor::new(5, 1, Role::Member);
        let err = service(qr, members())
            .scan(&member, scan_input(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::QrCodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_per_member_limit_is_checked() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_get_by_code().returning(|_, _| {
            let mut limited = qr_code(4, QrCodeKind::TopUp);
            limited.per_member_limit = Some(1);
            Ok(Some(limited))
        });
        qr.expect_count_member_scans()
            .withf(|_, qr_id, member_id| *qr_id == 4 && *member_id == 5)
            .returning(|_, _, _| Ok(1));
        qr.expect_apply_scan().never();

        let member = Actor::new(5, 1, Role::Member);
        let err = service(qr, members())
            .scan(&member, scan_input(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::QrCodeLimitReached));
    }

    #[tokio::test]
    async fn test_purchase_with_insufficient_quota() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_get_by_code().returning(|_, _| {
            let mut pricey = qr_code(4, QrCodeKind::Purchase);
            pricey.quota_amount = 50;
            Ok(Some(pricey))
        });
        qr.expect_apply_scan().never();

        let member = Actor::new(5, 1, Role::Member);
        let err = service(qr, members())
            .scan(&member, scan_input(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GymError::InsufficientQuota {
                required: 50,
                available: 10
            }
        ));
    }

    #[tokio::test]
    async fn test_expired_code() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_get_by_code().returning(|_, _| {
            let mut expired = qr_code(4, QrCodeKind::TopUp);
            expired.expires_at = Some(Utc::now() - Duration::hours(1));
            Ok(Some(expired))
        });
        qr.expect_apply_scan().never();

        let member = Actor::new(5, 1, Role::Member);
        let err = service(qr, members())
            .scan(&member, scan_input(None))
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::QrCodeExpired));
    }

    #[tokio::test]
    async fn test_create_rejects_price_on_purchase_code() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_create().never();

        let admin = Actor::new(1, 1, Role::Admin);
        let err = service(qr, MockAccountRepositoryTrait::new())
            .create(
                &admin,
                CreateQrCodeInput {
                    label: "Shake".to_string(),
                    kind: QrCodeKind::Purchase,
                    quota_amount: 1,
                    price_cents: Some(500),
                    max_uses: None,
                    per_member_limit: None,
                    expires_at: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_generates_code() {
        let mut qr = MockQrCodeRepositoryTrait::new();
        qr.expect_create()
            .withf(|q: &NewQrCode| q.code.len() == 24 && q.kind == QrCodeKind::TopUp)
            .returning(|q| {
                let mut created = qr_code(8, q.kind);
                created.code = q.code.clone();
                created.price_cents = q.price_cents;
                Ok(created)
            });

        let admin = Actor::new(1, 1, Role::Admin);
        let created = service(qr, MockAccountRepositoryTrait::new())
            .create(
                &admin,
                CreateQrCodeInput {
                    label: "10 class pack".to_string(),
                    kind: QrCodeKind::TopUp,
                    quota_amount: 10,
                    price_cents: Some(12_000),
                    max_uses: Some(1),
                    per_member_limit: None,
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.price_cents, Some(12_000));
    }

    #[tokio::test]
    async fn test_member_cannot_list_codes() {
        let member = Actor::new(5, 1, Role::Member);
        let err = service(MockQrCodeRepositoryTrait::new(), MockAccountRepositoryTrait::new())
            .list(&member, QrCodeFilter::default(), Pagination::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::Forbidden(_)));
    }
}
