//! 财务记录 API 处理器

use axum::{Extension, extract::State, http::StatusCode};
use validator::Validate;

use gym_domain::models::{FinanceSummary, FinancialRecord};
use gym_domain::service::{CreateRecordInput, UpdateRecordInput};

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, CreateRecordRequest, DeletedResponse, PageResponse, PaginationParams,
    RecordQuery, SummaryQuery, UpdateRecordRequest,
};
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::state::AppState;

/// 新增财务记录
///
/// POST /api/finance/records
pub async fn create_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FinancialRecord>>)> {
    req.validate()?;

    let actor = claims.actor()?;
    let record = state
        .finance_service
        .create(&actor, CreateRecordInput::from(req))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

/// 财务记录列表
///
/// GET /api/finance/records
pub async fn list_records(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<ApiResponse<PageResponse<FinancialRecord>>>> {
    let actor = claims.actor()?;
    let page = pagination.pagination();
    let result = state
        .finance_service
        .list(&actor, query.into(), page)
        .await?;
    Ok(Json(ApiResponse::success(PageResponse::from_page(result, page))))
}

/// GET /api/finance/records/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FinancialRecord>>> {
    let actor = claims.actor()?;
    let record = state.finance_service.get(&actor, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// 修改手工录入的财务记录，扫码生成的记录不可修改
///
/// PUT /api/finance/records/{id}
pub async fn update_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<ApiResponse<FinancialRecord>>> {
    req.validate()?;

    let actor = claims.actor()?;
    let record = state
        .finance_service
        .update(&actor, id, UpdateRecordInput::from(req))
        .await?;
    Ok(Json(ApiResponse::success(record)))
}

/// DELETE /api/finance/records/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let actor = claims.actor()?;
    state.finance_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id })))
}

/// 按类别汇总收支
///
/// GET /api/finance/summary?from=2025-01-01&to=2025-01-31
pub async fn summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<FinanceSummary>>> {
    let actor = claims.actor()?;
    let summary = state
        .finance_service
        .summary(&actor, query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}
