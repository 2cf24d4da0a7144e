//! 活动管理 API 处理器
//!
//! 实现活动的创建（含按周重复）、查询、修改、取消和删除

use axum::{Extension, extract::State, http::StatusCode};
use validator::Validate;

use gym_domain::models::{Activity, ActivityView};
use gym_domain::repository::ActivityCancellation;
use gym_domain::service::{CreateActivityInput, UpdateActivityInput};

use crate::auth::Claims;
use crate::dto::{
    ActivityQuery, ApiResponse, CreateActivityRequest, DeletedResponse, PageResponse,
    PaginationParams, UpdateActivityRequest,
};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

/// 创建活动
///
/// 指定 `repeatWeeks` 时按周生成同一系列的多场活动
///
/// POST /api/activities
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<Activity>>>)> {
    req.validate()?;

    let actor = claims.actor()?;
    let activities = state
        .activity_service
        .create(&actor, CreateActivityInput::from(req))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(activities))))
}

/// 活动列表
///
/// GET /api/activities
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ApiResponse<PageResponse<ActivityView>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .activity_service
        .list(&actor, query.into(), page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 活动详情
///
/// GET /api/activities/{id}
pub async fn get_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ActivityView>>> {
    let actor = claims.actor()?;
    let activity = state.activity_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(activity)))
}

/// 修改活动
///
/// PUT /api/activities/{id}
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Json<ApiResponse<ActivityView>>> {
    req.validate()?;

    let actor = claims.actor()?;
    let activity = state
        .activity_service
        .update(&actor, id, UpdateActivityInput::from(req))
        .await?;
    Ok(Json(ApiResponse::success(activity)))
}

/// 取消活动，有效预约全部取消并退还额度
///
/// POST /api/activities/{id}/cancel
pub async fn cancel_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ActivityCancellation>>> {
    let actor = claims.actor()?;
    let result = state.activity_service.cancel(&actor, id).await?;
    Ok(Json(ApiResponse::success_with_message(result, "活动已取消")))
}

/// 删除没有签到记录的活动
///
/// DELETE /api/activities/{id}
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let actor = claims.actor()?;
    state.activity_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id })))
}
