//! 预约与签到 API 处理器

use axum::{Extension, extract::State, http::StatusCode};

use gym_domain::models::{Attendance, AttendanceView};

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, AttendanceQuery, AttendanceStatusQuery, BookRequest, PageResponse,
    PaginationParams,
};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

/// 预约活动并扣减额度
///
/// 会员为自己预约时可以不带请求体，员工代预约时必须指定 `memberId`
///
/// POST /api/activities/{id}/attendance
pub async fn book_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(activity_id): Path<i64>,
    body: Option<Json<BookRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<Attendance>>)> {
    let actor = claims.actor()?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let attendance = state
        .attendance_service
        .book(&actor, activity_id, req.member_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(attendance))))
}

/// 活动签到名单
///
/// GET /api/activities/{id}/attendance
pub async fn list_activity_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(activity_id): Path<i64>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<AttendanceStatusQuery>,
) -> Result<Json<ApiResponse<PageResponse<AttendanceView>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .attendance_service
        .list_for_activity(&actor, activity_id, query.status, page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 签到记录列表
///
/// GET /api/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<ApiResponse<PageResponse<AttendanceView>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .attendance_service
        .list(&actor, query.into(), page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// 取消预约，开始前取消退还额度
///
/// POST /api/attendance/{id}/cancel
pub async fn cancel_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Attendance>>> {
    let actor = claims.actor()?;
    let attendance = state.attendance_service.cancel(&actor, id).await?;
    Ok(Json(ApiResponse::success(attendance)))
}

/// 签到
///
/// POST /api/attendance/{id}/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Attendance>>> {
    let actor = claims.actor()?;
    let attendance = state.attendance_service.check_in(&actor, id).await?;
    Ok(Json(ApiResponse::success(attendance)))
}

/// 标记缺席，额度不退还
///
/// POST /api/attendance/{id}/absent
pub async fn mark_absent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Attendance>>> {
    let actor = claims.actor()?;
    let attendance = state.attendance_service.mark_absent(&actor, id).await?;
    Ok(Json(ApiResponse::success(attendance)))
}

/// 当前账号的预约记录
///
/// GET /api/me/attendance
pub async fn my_attendance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<AttendanceStatusQuery>,
) -> Result<Json<ApiResponse<PageResponse<AttendanceView>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .attendance_service
        .my_attendance(&actor, query.status, page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}
