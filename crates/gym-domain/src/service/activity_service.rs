//! 活动服务
//!
//! 活动排期、修改、取消与删除。容量与状态的并发校验由仓储在行锁内完成，
//! 这里负责参数校验和操作者权限。

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{GymError, Result};
use crate::models::{Activity, ActivityView, Actor, Page, Pagination};
use crate::repository::{
    AccountRepositoryTrait, ActivityCancellation, ActivityChanges, ActivityFilter,
    ActivityRepositoryTrait, NewActivity,
};
use crate::service::dto::{CreateActivityInput, UpdateActivityInput};
use crate::service::policy;

const DEFAULT_QUOTA_COST: i32 = 1;

pub struct ActivityService {
    activity_repo: Arc<dyn ActivityRepositoryTrait>,
    account_repo: Arc<dyn AccountRepositoryTrait>,
}

impl ActivityService {
    pub fn new(
        activity_repo: Arc<dyn ActivityRepositoryTrait>,
        account_repo: Arc<dyn AccountRepositoryTrait>,
    ) -> Self {
        Self {
            activity_repo,
            account_repo,
        }
    }

    /// 创建活动
    ///
    /// 教练创建的活动固定由本人负责；`repeat_weeks` 大于 1 时
    /// 按周展开并共享同一个 `series_id`
    #[instrument(skip(self, input), fields(gym_id = actor.gym_id))]
    pub async fn create(&self, actor: &Actor, input: CreateActivityInput) -> Result<Vec<Activity>> {
        if !actor.is_staff() {
            return Err(GymError::Forbidden("无权创建活动".to_string()));
        }

        let name = policy::required_text("活动名称", &input.name, 100)?;
        policy::validate_schedule(input.starts_at, input.ends_at)?;
        policy::validate_capacity(input.capacity)?;
        let quota_cost = input.quota_cost.unwrap_or(DEFAULT_QUOTA_COST);
        policy::validate_quota_cost(quota_cost)?;

        let trainer_id = if actor.is_admin() {
            if let Some(trainer_id) = input.trainer_id {
                self.validate_trainer(actor.gym_id, trainer_id).await?;
            }
            input.trainer_id
        } else {
            Some(actor.account_id)
        };

        let repeat_weeks = input.repeat_weeks.unwrap_or(1);
        let occurrences = policy::weekly_occurrences(input.starts_at, input.ends_at, repeat_weeks)?;
        let series_id = (repeat_weeks > 1).then(Uuid::new_v4);

        let activities: Vec<NewActivity> = occurrences
            .into_iter()
            .map(|(starts_at, ends_at)| NewActivity {
                gym_id: actor.gym_id,
                name: name.clone(),
                description: input.description.clone(),
                trainer_id,
                location: input.location.clone(),
                starts_at,
                ends_at,
                capacity: input.capacity,
                quota_cost,
                series_id,
                created_by: actor.account_id,
            })
            .collect();

        let created = self.activity_repo.create_many(&activities).await?;

        info!(
            count = created.len(),
            series_id = ?series_id,
            operator_id = actor.account_id,
            "活动已创建"
        );
        Ok(created)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: ActivityFilter,
        page: Pagination,
    ) -> Result<Page<ActivityView>> {
        self.activity_repo.list(actor.gym_id, &filter, page).await
    }

    pub async fn get(&self, actor: &Actor, id: i64) -> Result<ActivityView> {
        self.activity_repo
            .get(actor.gym_id, id)
            .await?
            .ok_or(GymError::ActivityNotFound(id))
    }

    /// 修改活动，未提供的字段保持不变
    ///
    /// 仅管理员可以更换负责教练；已改动的额度消耗只影响之后的预约
    #[instrument(skip(self, input), fields(gym_id = actor.gym_id))]
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateActivityInput,
    ) -> Result<ActivityView> {
        let current = self.get(actor, id).await?.activity;
        Self::ensure_can_manage(actor, &current)?;
        if current.is_cancelled() {
            return Err(GymError::ActivityCancelled(id));
        }

        let trainer_id = match input.trainer_id {
            Some(trainer_id) if current.trainer_id != Some(trainer_id) => {
                if !actor.is_admin() {
                    return Err(GymError::Forbidden("只有管理员可以更换负责教练".to_string()));
                }
                self.validate_trainer(actor.gym_id, trainer_id).await?;
                Some(trainer_id)
            }
            _ => current.trainer_id,
        };

        let changes = ActivityChanges {
            name: match input.name {
                Some(name) => policy::required_text("活动名称", &name, 100)?,
                None => current.name,
            },
            description: match input.description {
                Some(description) => policy::optional_text("活动描述", description, 2000)?,
                None => current.description,
            },
            trainer_id,
            location: match input.location {
                Some(location) => policy::optional_text("地点", location, 200)?,
                None => current.location,
            },
            starts_at: input.starts_at.unwrap_or(current.starts_at),
            ends_at: input.ends_at.unwrap_or(current.ends_at),
            capacity: input.capacity.unwrap_or(current.capacity),
            quota_cost: input.quota_cost.unwrap_or(current.quota_cost),
        };
        policy::validate_schedule(changes.starts_at, changes.ends_at)?;
        policy::validate_capacity(changes.capacity)?;
        policy::validate_quota_cost(changes.quota_cost)?;

        let view = self.activity_repo.update(actor.gym_id, id, &changes).await?;

        info!(activity_id = id, operator_id = actor.account_id, "活动已更新");
        Ok(view)
    }

    /// 取消活动，所有 registered 预约全额退款
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn cancel(&self, actor: &Actor, id: i64) -> Result<ActivityCancellation> {
        let current = self.get(actor, id).await?.activity;
        Self::ensure_can_manage(actor, &current)?;

        let result = self
            .activity_repo
            .cancel(actor.gym_id, id, actor.account_id)
            .await?;

        info!(
            activity_id = id,
            cancelled_bookings = result.cancelled_bookings,
            refunded_quota = result.refunded_quota,
            operator_id = actor.account_id,
            "活动已取消"
        );
        Ok(result)
    }

    /// 删除活动，存在任何签到记录时拒绝
    #[instrument(skip(self), fields(gym_id = actor.gym_id))]
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        if !actor.is_admin() {
            return Err(GymError::Forbidden("只有管理员可以删除活动".to_string()));
        }
        self.activity_repo.delete(actor.gym_id, id).await?;

        info!(activity_id = id, operator_id = actor.account_id, "活动已删除");
        Ok(())
    }

    /// 管理员或该活动的负责教练
    pub(crate) fn ensure_can_manage(actor: &Actor, activity: &Activity) -> Result<()> {
        if actor.is_admin() || (actor.is_staff() && activity.is_trained_by(actor.account_id)) {
            Ok(())
        } else {
            Err(GymError::Forbidden("只能管理自己负责的活动".to_string()))
        }
    }

    /// 负责教练必须是本健身房有效的教练或管理员
    async fn validate_trainer(&self, gym_id: i64, trainer_id: i64) -> Result<()> {
        let trainer = self
            .account_repo
            .get(gym_id, trainer_id)
            .await?
            .ok_or_else(|| GymError::Validation(format!("教练不存在: {}", trainer_id)))?;

        if !trainer.is_active() || !trainer.role.is_staff() {
            return Err(GymError::Validation(format!(
                "账号不是有效的教练或管理员: {}",
                trainer_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::fixtures::account;
    use crate::models::activity::fixtures::{activity, view};
    use crate::models::{ActivityStatus, Role};
    use crate::repository::{MockAccountRepositoryTrait, MockActivityRepositoryTrait};
    use chrono::{Duration, Utc};

    fn create_input() -> CreateActivityInput {
        let starts_at = Utc::now() + Duration::days(1);
        CreateActivityInput {
            name: "Morning Spin".to_string(),
            description: None,
            trainer_id: Some(7),
            location: Some("Studio A".to_string()),
            starts_at,
            ends_at: starts_at + Duration::hours(1),
            capacity: Some(12),
            quota_cost: None,
            repeat_weeks: None,
        }
    }

    fn echo_created(activities: &[NewActivity]) -> Result<Vec<Activity>> {
        Ok(activities
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let mut created = activity(i as i64 + 1);
                created.trainer_id = a.trainer_id;
                created.starts_at = a.starts_at;
                created.ends_at = a.ends_at;
                created.quota_cost = a.quota_cost;
                created.series_id = a.series_id;
                created
            })
            .collect())
    }

    #[tokio::test]
    async fn test_trainer_creating_activity_becomes_its_trainer() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_create_many()
            .withf(|list: &[NewActivity]| {
                list.len() == 1 && list[0].trainer_id == Some(8) && list[0].quota_cost == 1
            })
            .returning(|list| echo_created(list));
        let mut accounts = MockAccountRepositoryTrait::new();
        accounts.expect_get().never();

        let service = ActivityService::new(Arc::new(activities), Arc::new(accounts));
        let trainer = Actor::new(8, 1, Role::Trainer);
        let created = service.create(&trainer, create_input()).await.unwrap();
        assert_eq!(created[0].trainer_id, Some(8));
        assert!(created[0].series_id.is_none());
    }

    #[tokio::test]
    async fn test_repeat_weeks_share_series() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_create_many()
            .withf(|list: &[NewActivity]| {
                list.len() == 4
                    && list.iter().all(|a| a.series_id.is_some() && a.series_id == list[0].series_id)
                    && list[3].starts_at - list[0].starts_at == Duration::weeks(3)
            })
            .returning(|list| echo_created(list));
        let mut accounts = MockAccountRepositoryTrait::new();
        accounts
            .expect_get()
            .returning(|_, id| Ok(Some(account(id, Role::Trainer))));

        let service = ActivityService::new(Arc::new(activities), Arc::new(accounts));
        let admin = Actor::new(1, 1, Role::Admin);
        let mut input = create_input();
        input.repeat_weeks = Some(4);

        let created = service.create(&admin, input).await.unwrap();
        assert_eq!(created.len(), 4);
    }

    #[tokio::test]
    async fn test_admin_cannot_assign_member_as_trainer() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities.expect_create_many().never();
        let mut accounts = MockAccountRepositoryTrait::new();
        accounts
            .expect_get()
            .returning(|_, id| Ok(Some(account(id, Role::Member))));

        let service = ActivityService::new(Arc::new(activities), Arc::new(accounts));
        let admin = Actor::new(1, 1, Role::Admin);
        let err = service.create(&admin, create_input()).await.unwrap_err();
        assert!(matches!(err, GymError::Validation(_)));
    }

    #[tokio::test]
    async fn test_member_cannot_create() {
        let service = ActivityService::new(
            Arc::new(MockActivityRepositoryTrait::new()),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let member = Actor::new(5, 1, Role::Member);
        let err = service.create(&member, create_input()).await.unwrap_err();
        assert!(matches!(err, GymError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_other_trainer_cannot_update() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_get()
            .returning(|_, id| Ok(Some(view(activity(id), 0))));
        activities.expect_update().never();

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        // fixture 活动由 7 号教练负责
        let other = Actor::new(9, 1, Role::Trainer);
        let err = service
            .update(&other, 3, UpdateActivityInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_merges_fields_for_assigned_trainer() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_get()
            .returning(|_, id| Ok(Some(view(activity(id), 2))));
        activities
            .expect_update()
            .withf(|_, id, c: &ActivityChanges| {
                *id == 3 && c.capacity == Some(20) && c.quota_cost == 1 && c.trainer_id == Some(7)
            })
            .returning(|_, id, c| {
                let mut updated = activity(id);
                updated.capacity = c.capacity;
                Ok(view(updated, 2))
            });

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let trainer = Actor::new(7, 1, Role::Trainer);
        let updated = service
            .update(
                &trainer,
                3,
                UpdateActivityInput {
                    capacity: Some(Some(20)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.remaining(), Some(18));
    }

    #[tokio::test]
    async fn test_update_clears_optional_fields() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities.expect_get().returning(|_, id| {
            let mut current = activity(id);
            current.description = Some("Bring a towel".to_string());
            Ok(Some(view(current, 4)))
        });
        activities
            .expect_update()
            .withf(|_, _, c: &ActivityChanges| {
                c.capacity.is_none() && c.description.is_none() && c.location.is_none()
            })
            .returning(|_, id, c| {
                let mut updated = activity(id);
                updated.capacity = c.capacity;
                updated.description = c.description.clone();
                updated.location = c.location.clone();
                Ok(view(updated, 4))
            });

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let admin = Actor::new(1, 1, Role::Admin);
        let updated = service
            .update(
                &admin,
                3,
                UpdateActivityInput {
                    description: Some(None),
                    location: Some(None),
                    capacity: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.remaining(), None);
        assert!(updated.activity.location.is_none());
    }

    #[tokio::test]
    async fn test_update_sets_optional_fields_and_keeps_omitted_ones() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_get()
            .returning(|_, id| Ok(Some(view(activity(id), 0))));
        activities
            .expect_update()
            .withf(|_, _, c: &ActivityChanges| {
                c.description.as_deref() == Some("Low impact")
                    && c.location.as_deref() == Some("Studio A")
                    && c.capacity == Some(10)
            })
            .returning(|_, id, _| Ok(view(activity(id), 0)));

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let admin = Actor::new(1, 1, Role::Admin);
        service
            .update(
                &admin,
                3,
                UpdateActivityInput {
                    description: Some(Some("  Low impact ".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_cancelled_activity_is_refused() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities.expect_get().returning(|_, id| {
            let mut cancelled = activity(id);
            cancelled.status = ActivityStatus::Cancelled;
            Ok(Some(view(cancelled, 0)))
        });
        activities.expect_update().never();

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let admin = Actor::new(1, 1, Role::Admin);
        let err = service
            .update(&admin, 3, UpdateActivityInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GymError::ActivityCancelled(3)));
    }

    #[tokio::test]
    async fn test_cancel_returns_refund_summary() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities
            .expect_get()
            .returning(|_, id| Ok(Some(view(activity(id), 3))));
        activities
            .expect_cancel()
            .withf(|gym_id, id, operator| *gym_id == 1 && *id == 3 && *operator == 1)
            .returning(|_, id, _| {
                Ok(ActivityCancellation {
                    activity_id: id,
                    cancelled_bookings: 3,
                    refunded_quota: 3,
                })
            });

        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );
        let admin = Actor::new(1, 1, Role::Admin);
        let result = service.cancel(&admin, 3).await.unwrap();
        assert_eq!(result.refunded_quota, 3);
    }

    #[tokio::test]
    async fn test_only_admin_deletes() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities.expect_delete().never();
        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );

        let trainer = Actor::new(7, 1, Role::Trainer);
        assert!(matches!(
            service.delete(&trainer, 3).await,
            Err(GymError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_activity() {
        let mut activities = MockActivityRepositoryTrait::new();
        activities.expect_get().returning(|_, _| Ok(None));
        let service = ActivityService::new(
            Arc::new(activities),
            Arc::new(MockAccountRepositoryTrait::new()),
        );

        let member = Actor::new(5, 1, Role::Member);
        assert!(matches!(
            service.get(&member, 42).await,
            Err(GymError::ActivityNotFound(42))
        ));
    }
}
