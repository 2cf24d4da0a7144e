//! 签到服务
//!
//! 预约、取消、签到与缺席标记。
//!
//! ## 状态迁移
//!
//! ```text
//! registered -> attended   签到（开始前 N 分钟至结束）
//! registered -> absent     缺席（活动开始后）
//! registered -> cancelled  取消（按角色和时间决定是否退款）
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use gym_shared::observability::metrics;

use crate::error::{GymError, Result};
use crate::models::{
    Actor, Attendance, AttendanceStatus, AttendanceView, ChangeType, Page, Pagination,
};
use crate::repository::{
    AccountRepositoryTrait, ActivityRepositoryTrait, AttendanceFilter, AttendanceRepositoryTrait,
    NewBooking,
};
use crate::service::policy;

pub struct AttendanceService {
    attendance_repo: Arc<dyn AttendanceRepositoryTrait>,
    activity_repo: Arc<dyn ActivityRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
    check_in_open_minutes: i64,
}

impl AttendanceService {
    pub fn new(
        attendance_repo: Arc<dyn AttendanceRepositoryTrait>,
        activity_repo: Arc<dyn ActivityRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
        check_in_open_minutes: i64,
    ) -> Self {
        Self {
            attendance_repo,
            activity_repo,
            account_repo,
            check_in_open_minutes,
        }
    }

    /// 预约活动
    ///
    /// 会员为自己预约；员工可以指定 `member_id` 代为预约。
    /// 活动状态、重复预约、容量和额度在仓储事务内校验
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn book(
        &self,
        actor: &Actor,
        activity_id: i64,
        member_id: Option<i64>,
    ) -> Result<Attendance> {
        let result = self.do_book(actor, activity_id, member_id).await;
        match &result {
            Ok(attendance) => {
                metrics::record_attendance_booking("success");
                if attendance.quota_charged > 0 {
                    metrics::record_quota_change(ChangeType::AttendanceCharge.as_str());
                }
                info!(
                    attendance_id = attendance.id,
                    activity_id,
                    member_id = attendance.member_id,
                    quota_charged = attendance.quota_charged,
                    "预约成功"
                );
            }
            Err(e) => {
                metrics::record_attendance_booking(&e.error_code().to_lowercase());
                if !e.is_business_error() {
                    warn!(activity_id, error = %e, "预约失败");
                }
            }
        }
        result
    }

    async fn do_book(
        &self,
        actor: &Actor,
        activity_id: i64,
        member_id: Option<i64>,
    ) -> Result<Attendance> {
        let member_id = policy::resolve_member_target(actor, member_id)?;
        let member = self
            .account_repo
            .get(actor.gym_id, member_id)
            .await?
            .ok_or(GymError::AccountNotFound(member_id))?;
        if !member.is_bookable_member() {
            return Err(GymError::MemberNotEligible(member_id));
        }

        self.attendance_repo
            .book(&NewBooking {
                gym_id: actor.gym_id,
                activity_id,
                member_id,
                booked_by: actor.account_id,
            })
            .await
    }

    /// 取消预约
    ///
    /// 开始前取消或管理员取消时全额退款；会员在开始后不能自行取消
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn cancel(&self, actor: &Actor, id: i64) -> Result<Attendance> {
        let view = self.load(actor, id).await?;
        if !actor.is_self_or_staff(view.attendance.member_id) {
            return Err(GymError::Forbidden("只能取消自己的预约".to_string()));
        }
        if view.attendance.status != AttendanceStatus::Registered {
            return Err(GymError::InvalidAttendanceState {
                attendance_id: id,
                current_status: view.attendance.status.as_str().to_string(),
            });
        }

        let refund = policy::cancellation_refund(actor.role, view.starts_at, Utc::now())?;
        let cancelled = self
            .attendance_repo
            .cancel(actor.gym_id, id, refund, actor.account_id)
            .await?;

        metrics::record_attendance_cancellation(refund);
        if refund && cancelled.quota_charged > 0 {
            metrics::record_quota_change(ChangeType::AttendanceRefund.as_str());
        }
        info!(
            attendance_id = id,
            refund,
            operator_id = actor.account_id,
            "预约已取消"
        );
        Ok(cancelled)
    }

    /// 签到：registered -> attended
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn check_in(&self, actor: &Actor, id: i64) -> Result<Attendance> {
        let view = self.load(actor, id).await?;
        Self::ensure_can_manage(actor, &view)?;
        policy::check_in_window(
            view.starts_at,
            view.ends_at,
            Utc::now(),
            self.check_in_open_minutes,
        )?;

        let attendance = self
            .attendance_repo
            .transition(
                actor.gym_id,
                id,
                AttendanceStatus::Registered,
                AttendanceStatus::Attended,
            )
            .await?;

        info!(attendance_id = id, operator_id = actor.account_id, "签到成功");
        Ok(attendance)
    }

    /// 缺席：registered -> absent，仅在活动开始后，不退款
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn mark_absent(&self, actor: &Actor, id: i64) -> Result<Attendance> {
        let view = self.load(actor, id).await?;
        Self::ensure_can_manage(actor, &view)?;
        if Utc::now() < view.starts_at {
            return Err(GymError::ActivityNotStarted(view.attendance.activity_id));
        }

        let attendance = self
            .attendance_repo
            .transition(
                actor.gym_id,
                id,
                AttendanceStatus::Registered,
                AttendanceStatus::Absent,
            )
            .await?;

        info!(attendance_id = id, operator_id = actor.account_id, "已标记缺席");
        Ok(attendance)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: AttendanceFilter,
        page: Pagination,
    ) -> Result<Page<AttendanceView>> {
        if !actor.is_staff() {
            return Err(GymError::Forbidden("无权查看签到记录".to_string()));
        }
        self.attendance_repo.list(actor.gym_id, &filter, page).await
    }

    /// 某个活动的签到名单
    pub async fn list_for_activity(
        &self,
        actor: &Actor,
        activity_id: i64,
        status: Option<AttendanceStatus>,
        page: Pagination,
    ) -> Result<Page<AttendanceView>> {
        if !actor.is_staff() {
            return Err(GymError::Forbidden("无权查看签到记录".to_string()));
        }
        self.activity_repo
            .get(actor.gym_id, activity_id)
            .await?
            .ok_or(GymError::ActivityNotFound(activity_id))?;

        let filter = AttendanceFilter {
            activity_id: Some(activity_id),
            status,
            ..Default::default()
        };
        self.attendance_repo.list(actor.gym_id, &filter, page).await
    }

    /// 当前账号自己的签到记录
    pub async fn my_attendance(
        &self,
        actor: &Actor,
        status: Option<AttendanceStatus>,
        page: Pagination,
    ) -> Result<Page<AttendanceView>> {
        let filter = AttendanceFilter {
            member_id: Some(actor.account_id),
            status,
            ..Default::default()
        };
        self.attendance_repo.list(actor.gym_id, &filter, page).await
    }

    async fn load(&self, actor: &Actor, id: i64) -> Result<AttendanceView> {
        self.attendance_repo
            .get(actor.gym_id, id)
            .await?
            .ok_or(GymError::AttendanceNotFound(id))
    }

    /// 管理员，或负责该活动的教练
    fn ensure_can_manage(actor: &Actor, view: &AttendanceView) -> Result<()> {
        if actor.is_admin() || (actor.is_staff() && view.trainer_id == Some(actor.account_id)) {
            Ok(())
        } else {
            Err(GymError::Forbidden("只能管理自己负责的活动".to_string()))
        }
    }
}
